use goose_desktop_models::{ExtensionConfig, ExtensionEntry};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

use super::extension::ExtensionLink;
use crate::error::ExtensionInstallError;
use crate::events::{DesktopEvent, EventBus, Toast};
use crate::extensions::ExtensionRegistry;
use crate::retry::RetryPolicy;
use crate::settings::SettingsStore;
use crate::transport::ExtensionBackend;

const INSTALL_FAILED: &str = "Failed to install extension";
const UPDATE_FAILED: &str = "Failed to update extension";

/// Installs extensions from `goose://extension` links.
pub struct ExtensionInstaller {
    backend: Arc<dyn ExtensionBackend>,
    settings: Arc<dyn SettingsStore>,
    registry: Arc<Mutex<ExtensionRegistry>>,
    events: EventBus<DesktopEvent>,
    retry: RetryPolicy,
}

impl ExtensionInstaller {
    pub fn new(
        backend: Arc<dyn ExtensionBackend>,
        settings: Arc<dyn SettingsStore>,
        registry: Arc<Mutex<ExtensionRegistry>>,
        events: EventBus<DesktopEvent>,
    ) -> Self {
        Self {
            backend,
            settings,
            registry,
            events,
            retry: RetryPolicy::server_not_ready(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Validate `link`, register the extension with goosed and save it.
    ///
    /// Every failure is logged and shown as a sticky error toast. Missing env
    /// values also open the extension settings.
    pub async fn install(&self, link: &str) -> Result<ExtensionConfig, ExtensionInstallError> {
        let parsed = ExtensionLink::parse(link).map_err(|e| self.report(INSTALL_FAILED, e))?;
        info!("Installing extension '{}'", parsed.name);

        let mut config = parsed.to_config();
        let missing = self.fill_env_from_settings(&parsed, &mut config);
        if !missing.is_empty() {
            warn!(
                "Extension '{}' needs env values before install: {:?}",
                parsed.name, missing
            );
            self.events.publish(DesktopEvent::ShowExtensionSettings {
                config,
                missing_env: missing.clone(),
            });
            return Err(self.report(
                INSTALL_FAILED,
                ExtensionInstallError::EnvVarsRequired {
                    extension: parsed.name,
                    missing,
                },
            ));
        }

        self.retry
            .run(|_| self.backend.add_extension(&config))
            .await
            .map_err(|e| self.report(INSTALL_FAILED, e.into()))?;

        {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.upsert(config.clone(), true).map_err(|e| {
                self.report(
                    INSTALL_FAILED,
                    ExtensionInstallError::Persistence {
                        message: e.to_string(),
                    },
                )
            })?;
        }

        info!("Installed extension '{}'", parsed.name);
        self.events.publish(DesktopEvent::Toast(Toast::success(
            "Extension installed",
            format!("{} extension added", parsed.name),
        )));
        Ok(config)
    }

    /// Turn an installed extension on or off, in goosed and in the registry.
    pub async fn set_enabled(
        &self,
        key: &str,
        enabled: bool,
    ) -> Result<ExtensionConfig, ExtensionInstallError> {
        let config = self
            .installed(key)
            .map_err(|e| self.report(UPDATE_FAILED, e))?
            .config;

        let registered = if enabled {
            self.retry.run(|_| self.backend.add_extension(&config)).await
        } else {
            self.backend.remove_extension(config.name()).await
        };
        registered.map_err(|e| self.report(UPDATE_FAILED, e.into()))?;

        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_enabled(key, enabled)
            .map_err(|e| {
                self.report(
                    UPDATE_FAILED,
                    ExtensionInstallError::Persistence {
                        message: e.to_string(),
                    },
                )
            })?;

        info!(
            "Extension '{}' {}",
            config.name(),
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(config)
    }

    /// Remove an installed extension from goosed (when enabled) and forget it.
    pub async fn uninstall(&self, key: &str) -> Result<ExtensionConfig, ExtensionInstallError> {
        let ExtensionEntry { enabled, config } = self
            .installed(key)
            .map_err(|e| self.report(UPDATE_FAILED, e))?;

        if enabled {
            self.backend
                .remove_extension(config.name())
                .await
                .map_err(|e| self.report(UPDATE_FAILED, e.into()))?;
        }

        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .map_err(|e| {
                self.report(
                    UPDATE_FAILED,
                    ExtensionInstallError::Persistence {
                        message: e.to_string(),
                    },
                )
            })?;

        info!("Uninstalled extension '{}'", config.name());
        self.events.publish(DesktopEvent::Toast(Toast::success(
            "Extension removed",
            format!("{} extension removed", config.name()),
        )));
        Ok(config)
    }

    fn installed(&self, key: &str) -> Result<ExtensionEntry, ExtensionInstallError> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| ExtensionInstallError::NotInstalled {
                key: key.to_string(),
            })
    }

    /// Copy required env values from settings; returns the ones still unset.
    fn fill_env_from_settings(
        &self,
        link: &ExtensionLink,
        config: &mut ExtensionConfig,
    ) -> Vec<String> {
        let mut missing = Vec::new();
        for var in &link.required_env {
            match (self.settings.env_value(var), config.envs_mut()) {
                (Some(value), Some(envs)) => envs.insert(var.clone(), value),
                _ => missing.push(var.clone()),
            }
        }
        missing
    }

    fn report(&self, title: &str, err: ExtensionInstallError) -> ExtensionInstallError {
        error!("{}: {}", title, err);
        self.events
            .publish(DesktopEvent::Toast(Toast::error(title, err.to_string())));
        err
    }
}
