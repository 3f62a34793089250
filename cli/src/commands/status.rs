use goose_desktop_client::{DesktopConfig, GoosedClient};
use tracing::debug;

use crate::error::CliError;

pub async fn check_status(config: &DesktopConfig) -> Result<(), CliError> {
    let client = GoosedClient::from_config(&config.backend)?;
    debug!("Checking goosed at {}", client.base_url());
    let status = client.status().await?;
    println!("goosed at {}: {}", client.base_url(), status);
    Ok(())
}
