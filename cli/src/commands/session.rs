use goose_desktop_client::session_file::{
    export_session_to_file, import_session_from_file, suggested_file_name,
};
use goose_desktop_client::{DesktopConfig, GoosedClient};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::{cli::SessionCommands, error::CliError};

pub async fn handle_session_command(
    config: &DesktopConfig,
    action: &SessionCommands,
) -> Result<(), CliError> {
    match action {
        SessionCommands::List => list_sessions(config).await,
        SessionCommands::Export { id, file } => export_session(config, id, file.as_deref()).await,
        SessionCommands::Import { file } => import_session(file),
    }
}

async fn list_sessions(config: &DesktopConfig) -> Result<(), CliError> {
    let client = GoosedClient::from_config(&config.backend)?;
    let sessions = client.list_sessions().await?;
    if sessions.is_empty() {
        println!("No sessions");
        return Ok(());
    }

    for session in sessions {
        println!(
            "{:<24} {:>5} msgs  {:<28} {}",
            session.id,
            session.metadata.message_count,
            session.modified,
            session.metadata.description
        );
    }
    Ok(())
}

async fn export_session(
    config: &DesktopConfig,
    id: &str,
    file: Option<&Path>,
) -> Result<(), CliError> {
    let client = GoosedClient::from_config(&config.backend)?;
    let session = client.get_session(id).await?;
    let path = file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(suggested_file_name(&session)));

    export_session_to_file(&session, &path)?;
    println!("Exported {} to {}", id, path.display());
    Ok(())
}

fn import_session(file: &Path) -> Result<(), CliError> {
    let session = import_session_from_file(file)?;
    info!("Imported session {}", session.session_id);
    println!(
        "{}: {} ({} messages, {})",
        session.session_id,
        session.metadata.description,
        session.messages.len(),
        session.metadata.working_dir
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, r#"{"version": "1.0", "timestamp": 1}"#).unwrap();

        let err = import_session(&path).unwrap_err();
        assert_eq!(err.exit_code(), 6);
    }
}
