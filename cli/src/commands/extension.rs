use goose_desktop_client::deeplink::ExtensionInstaller;
use goose_desktop_client::extensions::ExtensionRegistry;
use goose_desktop_client::settings::TomlSettingsStore;
use goose_desktop_client::{DesktopConfig, EventBus, GoosedClient};
use goose_desktop_models::{ExtensionConfig, ExtensionEntry};
use std::sync::{Arc, Mutex};

use crate::{cli::ExtensionCommands, error::CliError};

pub async fn handle_extension_command(
    config: &DesktopConfig,
    action: &ExtensionCommands,
) -> Result<(), CliError> {
    let registry = ExtensionRegistry::load(config.registry_path())?;
    if let ExtensionCommands::List = action {
        if registry.is_empty() {
            println!("No extensions installed");
        }
        for (key, entry) in registry.iter() {
            println!("{}", describe(key, entry));
        }
        return Ok(());
    }

    let installer = ExtensionInstaller::new(
        Arc::new(GoosedClient::from_config(&config.backend)?),
        Arc::new(TomlSettingsStore::open(config.settings_path())?),
        Arc::new(Mutex::new(registry)),
        EventBus::default(),
    );

    match action {
        ExtensionCommands::Enable { key } => {
            let extension = installer.set_enabled(key, true).await?;
            println!("Enabled '{}'", extension.name());
        }
        ExtensionCommands::Disable { key } => {
            let extension = installer.set_enabled(key, false).await?;
            println!("Disabled '{}'", extension.name());
        }
        ExtensionCommands::Remove { key } => {
            let extension = installer.uninstall(key).await?;
            println!("Removed '{}'", extension.name());
        }
        ExtensionCommands::List => {}
    }
    Ok(())
}

fn describe(key: &str, entry: &ExtensionEntry) -> String {
    let state = if entry.enabled { "on " } else { "off" };
    let target = match &entry.config {
        ExtensionConfig::Stdio { cmd, args, .. } => format!("{} {}", cmd, args.join(" ")),
        ExtensionConfig::Sse { uri, .. } => uri.clone(),
        ExtensionConfig::Builtin { .. } => "builtin".to_string(),
    };
    format!("[{}] {:<20} {}", state, key, target.trim_end())
}
