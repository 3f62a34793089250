use goose_desktop_client::settings::{SettingsStore, TomlSettingsStore};
use goose_desktop_client::DesktopConfig;

use crate::{cli::SettingsCommands, error::CliError};

pub fn handle_settings_command(
    config: &DesktopConfig,
    action: &SettingsCommands,
) -> Result<(), CliError> {
    let store = TomlSettingsStore::open(config.settings_path())?;
    run_settings_command(&store, action)
}

fn run_settings_command(
    store: &dyn SettingsStore,
    action: &SettingsCommands,
) -> Result<(), CliError> {
    match action {
        SettingsCommands::Get { key } => match store.get(key) {
            Some(value) => println!("{}", value),
            None => return Err(CliError::Config(format!("'{}' is not set", key))),
        },
        SettingsCommands::Set { key, value } => {
            store.set(key, value)?;
            println!("{} updated", key);
        }
        SettingsCommands::Remove { key } => {
            store.remove(key)?;
            println!("{} removed", key);
        }
    }
    Ok(())
}
