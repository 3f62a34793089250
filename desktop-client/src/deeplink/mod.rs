//! `goose://` links: extension installs, shared sessions and recipes.

pub mod extension;
pub mod installer;

pub use extension::ExtensionLink;
pub use installer::ExtensionInstaller;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use goose_desktop_models::{ExtensionConfig, Recipe, SessionDetails};
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

use crate::error::{DeepLinkError, ExtensionInstallError};
use crate::events::{DesktopEvent, EventBus, Toast};
use crate::transport::SharedSessionSource;

#[derive(Debug, Clone, PartialEq)]
pub enum DeepLink {
    Extension(ExtensionLink),
    Session { token: String },
    Recipe { recipe: Recipe },
}

impl DeepLink {
    pub fn parse(link: &str) -> Result<Self, DeepLinkError> {
        let invalid = || -> DeepLinkError {
            ExtensionInstallError::InvalidScheme {
                url: link.to_string(),
            }
            .into()
        };

        let url = Url::parse(link).map_err(|_| invalid())?;
        if url.scheme() != "goose" {
            return Err(invalid());
        }

        match url.host_str() {
            Some("extension") => Ok(DeepLink::Extension(ExtensionLink::parse(link)?)),
            Some("session") => {
                let token = url.path().trim_matches('/');
                if token.is_empty() {
                    return Err(DeepLinkError::MissingSessionToken);
                }
                Ok(DeepLink::Session {
                    token: token.to_string(),
                })
            }
            Some("recipe") => {
                let config = url
                    .query_pairs()
                    .find(|(key, _)| key == "config")
                    .map(|(_, value)| value.into_owned())
                    .ok_or_else(|| DeepLinkError::InvalidRecipe {
                        message: "missing 'config' parameter".to_string(),
                    })?;
                Ok(DeepLink::Recipe {
                    recipe: decode_recipe(&config)?,
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// Decode a base64 recipe, accepting both standard and URL-safe alphabets.
pub fn decode_recipe(encoded: &str) -> Result<Recipe, DeepLinkError> {
    // an unencoded '+' arrives as a space after query decoding
    let encoded = encoded.trim().replace(' ', "+");
    let bytes = [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(&encoded).ok())
        .ok_or_else(|| DeepLinkError::InvalidRecipe {
            message: "config is not valid base64".to_string(),
        })?;

    serde_json::from_slice(&bytes).map_err(|e| DeepLinkError::InvalidRecipe {
        message: e.to_string(),
    })
}

pub fn encode_recipe(recipe: &Recipe) -> Result<String, serde_json::Error> {
    Ok(STANDARD.encode(serde_json::to_vec(recipe)?))
}

/// What handling a link produced.
#[derive(Debug, Clone)]
pub enum DeepLinkAction {
    ExtensionInstalled(ExtensionConfig),
    SessionOpened(SessionDetails),
    RecipeOpened(Recipe),
}

/// Routes links to the installer, the sharing service or the recipe view.
pub struct DeepLinkHandler {
    installer: ExtensionInstaller,
    sessions: Arc<dyn SharedSessionSource>,
    sharing_base_url: Option<String>,
    events: EventBus<DesktopEvent>,
}

impl DeepLinkHandler {
    pub fn new(
        installer: ExtensionInstaller,
        sessions: Arc<dyn SharedSessionSource>,
        sharing_base_url: Option<String>,
        events: EventBus<DesktopEvent>,
    ) -> Self {
        Self {
            installer,
            sessions,
            sharing_base_url,
            events,
        }
    }

    pub async fn handle(&self, link: &str) -> Result<DeepLinkAction, DeepLinkError> {
        info!("Opening link {}", link);
        if link.starts_with(extension::EXTENSION_PREFIX) {
            // the installer reports its own failures
            let config = self.installer.install(link).await?;
            return Ok(DeepLinkAction::ExtensionInstalled(config));
        }

        match DeepLink::parse(link).map_err(|e| self.report(e))? {
            DeepLink::Extension(_) => {
                let config = self.installer.install(link).await?;
                Ok(DeepLinkAction::ExtensionInstalled(config))
            }
            DeepLink::Session { token } => {
                let base_url = self
                    .sharing_base_url
                    .as_deref()
                    .ok_or(DeepLinkError::SharingDisabled)
                    .map_err(|e| self.report(e))?;
                let session = self
                    .sessions
                    .fetch_shared_session(base_url, &token)
                    .await
                    .map_err(|e| self.report(e.into()))?;
                self.events.publish(DesktopEvent::OpenSharedSession {
                    session: session.clone(),
                });
                Ok(DeepLinkAction::SessionOpened(session))
            }
            DeepLink::Recipe { recipe } => {
                info!("Opening recipe '{}'", recipe.title);
                self.events.publish(DesktopEvent::OpenRecipe {
                    recipe: recipe.clone(),
                });
                Ok(DeepLinkAction::RecipeOpened(recipe))
            }
        }
    }

    fn report(&self, err: DeepLinkError) -> DeepLinkError {
        error!("Failed to open link: {}", err);
        self.events.publish(DesktopEvent::Toast(Toast::error(
            "Failed to open link",
            err.to_string(),
        )));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::extensions::ExtensionRegistry;
    use crate::settings::MemorySettingsStore;
    use crate::transport::ExtensionBackend;
    use async_trait::async_trait;
    use goose_desktop_models::SessionMetadata;
    use std::sync::Mutex;

    fn recipe() -> Recipe {
        Recipe {
            version: "1.0.0".to_string(),
            title: "Release notes".to_string(),
            description: "Draft release notes".to_string(),
            instructions: "Summarize merged PRs".to_string(),
            prompt: Some("Write notes for v1.2".to_string()),
            extensions: None,
            activities: Some(vec!["Summarize this week".to_string()]),
            author: None,
        }
    }

    #[test]
    fn test_parse_session_link() {
        assert_eq!(
            DeepLink::parse("goose://session/abc-123").unwrap(),
            DeepLink::Session {
                token: "abc-123".to_string()
            }
        );
        assert!(matches!(
            DeepLink::parse("goose://session/"),
            Err(DeepLinkError::MissingSessionToken)
        ));
    }

    #[test]
    fn test_parse_recipe_link_any_alphabet() {
        let encoded = encode_recipe(&recipe()).unwrap();
        let link = format!("goose://recipe?config={}", encoded);
        assert_eq!(
            DeepLink::parse(&link).unwrap(),
            DeepLink::Recipe { recipe: recipe() }
        );

        let url_safe = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&recipe()).unwrap());
        assert_eq!(decode_recipe(&url_safe).unwrap(), recipe());
    }

    #[test]
    fn test_parse_rejects_bad_links() {
        assert!(matches!(
            DeepLink::parse("goose://recipe?config=%%%"),
            Err(DeepLinkError::InvalidRecipe { .. })
        ));
        assert!(matches!(
            DeepLink::parse("goose://recipe"),
            Err(DeepLinkError::InvalidRecipe { .. })
        ));
        assert!(matches!(
            DeepLink::parse("https://goose.example/session/abc"),
            Err(DeepLinkError::Extension(ExtensionInstallError::InvalidScheme { .. }))
        ));
        assert!(matches!(
            DeepLink::parse("goose://settings"),
            Err(DeepLinkError::Extension(ExtensionInstallError::InvalidScheme { .. }))
        ));
    }

    struct NoBackend;

    #[async_trait]
    impl ExtensionBackend for NoBackend {
        async fn add_extension(&self, _config: &ExtensionConfig) -> Result<(), TransportError> {
            Ok(())
        }

        async fn remove_extension(&self, _name: &str) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct FakeSharing;

    #[async_trait]
    impl SharedSessionSource for FakeSharing {
        async fn fetch_shared_session(
            &self,
            share_base_url: &str,
            token: &str,
        ) -> Result<SessionDetails, TransportError> {
            if token == "missing" {
                return Err(TransportError::http_status(404, "not found"));
            }
            Ok(SessionDetails {
                session_id: token.to_string(),
                metadata: SessionMetadata {
                    description: share_base_url.to_string(),
                    ..SessionMetadata::default()
                },
                messages: vec![],
            })
        }
    }

    fn handler(sharing: Option<&str>, dir: &tempfile::TempDir) -> (DeepLinkHandler, EventBus<DesktopEvent>) {
        let events = EventBus::default();
        let registry = ExtensionRegistry::load(dir.path().join("extensions.toml")).unwrap();
        let installer = ExtensionInstaller::new(
            Arc::new(NoBackend),
            Arc::new(MemorySettingsStore::new()),
            Arc::new(Mutex::new(registry)),
            events.clone(),
        );
        (
            DeepLinkHandler::new(
                installer,
                Arc::new(FakeSharing),
                sharing.map(str::to_string),
                events.clone(),
            ),
            events,
        )
    }

    #[tokio::test]
    async fn test_session_link_publishes_open_event() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, events) = handler(Some("https://share.example"), &dir);
        let mut subscription = events.subscribe();

        let action = handler.handle("goose://session/tok").await.unwrap();
        assert!(matches!(action, DeepLinkAction::SessionOpened(ref s) if s.session_id == "tok"));
        match subscription.try_recv() {
            Some(DesktopEvent::OpenSharedSession { session }) => {
                assert_eq!(session.metadata.description, "https://share.example")
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_session_link_failures_are_toasted() {
        let dir = tempfile::tempdir().unwrap();
        let (disabled, events) = handler(None, &dir);
        let mut subscription = events.subscribe();
        assert!(matches!(
            disabled.handle("goose://session/tok").await,
            Err(DeepLinkError::SharingDisabled)
        ));
        assert!(matches!(subscription.try_recv(), Some(DesktopEvent::Toast(_))));

        let (enabled, _) = handler(Some("https://share.example"), &dir);
        assert!(matches!(
            enabled.handle("goose://session/missing").await,
            Err(DeepLinkError::SharedSession { .. })
        ));
    }

    #[tokio::test]
    async fn test_extension_link_goes_through_installer() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, _) = handler(None, &dir);
        let action = handler
            .handle("goose://extension?cmd=goosed&arg=mcp&arg=memory&name=Memory&description=notes")
            .await
            .unwrap();
        assert!(matches!(action, DeepLinkAction::ExtensionInstalled(ref c) if c.name() == "Memory"));
    }
}
