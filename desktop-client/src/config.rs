use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use config::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    pub backend: BackendConfig,
    pub chat: ChatConfig,
    pub sharing: SharingConfig,
    pub extensions: ExtensionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Where goosed listens
    pub base_url: String,
    /// Sent as `X-Secret-Key` on every request
    pub secret_key: Option<String>,
    pub working_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Give up on a reply stream that stays silent this long
    pub stream_idle_timeout_secs: u64,
    /// Notify on finish if the user was inactive for longer than this
    pub inactivity_notification_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionsConfig {
    pub registry_path: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            chat: ChatConfig::default(),
            sharing: SharingConfig::default(),
            extensions: ExtensionsConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            secret_key: None,
            working_dir: None,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            stream_idle_timeout_secs: 300,
            inactivity_notification_secs: 60,
        }
    }
}

impl ChatConfig {
    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_notification_secs)
    }
}

impl DesktopConfig {
    /// Load `~/.config/goose/desktop.toml` (if present) plus
    /// `GOOSE_DESKTOP__SECTION__KEY` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("GOOSE_DESKTOP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: DesktopConfig = builder.try_deserialize()?;
        config.extensions.registry_path = config.extensions.registry_path.map(expand_tilde);
        config.extensions.settings_path = config.extensions.settings_path.map(expand_tilde);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn registry_path(&self) -> PathBuf {
        self.extensions
            .registry_path
            .clone()
            .unwrap_or_else(|| config_dir().join("extensions.toml"))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.extensions
            .settings_path
            .clone()
            .unwrap_or_else(|| config_dir().join("desktop-settings.toml"))
    }
}

pub fn config_path() -> PathBuf {
    config_dir().join("desktop.toml")
}

fn config_dir() -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        home.join(".config").join("goose")
    } else {
        PathBuf::from(".")
    }
}

fn expand_tilde(path: PathBuf) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = dirs::home_dir() {
            let path_str = path.to_string_lossy();
            return PathBuf::from(path_str.replacen('~', &home.to_string_lossy(), 1));
        }
    }
    path
}
