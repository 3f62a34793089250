use goose_desktop_client::deeplink::{DeepLinkAction, DeepLinkHandler, ExtensionInstaller};
use goose_desktop_client::extensions::ExtensionRegistry;
use goose_desktop_client::settings::TomlSettingsStore;
use goose_desktop_client::{DesktopConfig, DesktopEvent, EventBus, GoosedClient};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::error::CliError;

pub async fn open_deep_link(config: &DesktopConfig, url: &str) -> Result<(), CliError> {
    let client = Arc::new(GoosedClient::from_config(&config.backend)?);
    let settings = Arc::new(TomlSettingsStore::open(config.settings_path())?);
    let registry = Arc::new(Mutex::new(ExtensionRegistry::load(config.registry_path())?));
    let events = EventBus::default();
    let mut subscription = events.subscribe();

    let installer = ExtensionInstaller::new(client.clone(), settings, registry, events.clone());
    let handler = DeepLinkHandler::new(installer, client, config.sharing.base_url.clone(), events);

    let result = handler.handle(url).await;

    while let Some(event) = subscription.try_recv() {
        if let DesktopEvent::ShowExtensionSettings { config, missing_env } = event {
            println!("Extension '{}' needs these values first:", config.name());
            for var in missing_env {
                println!("  goose-desktop settings set env.{} <value>", var);
            }
        }
    }

    match result? {
        DeepLinkAction::ExtensionInstalled(config) => {
            println!("Installed extension '{}'", config.name());
        }
        DeepLinkAction::SessionOpened(session) => {
            info!("Opened shared session {}", session.session_id);
            println!(
                "{} ({} messages)",
                session.metadata.description,
                session.messages.len()
            );
            for message in &session.messages {
                println!("{:?}: {}", message.role, message.as_concat_text());
            }
        }
        DeepLinkAction::RecipeOpened(recipe) => {
            println!("{}\n\n{}", recipe.title, recipe.description);
            println!("\nInstructions:\n{}", recipe.instructions);
            if let Some(prompt) = recipe.prompt {
                println!("\nPrompt:\n{}", prompt);
            }
        }
    }
    Ok(())
}
