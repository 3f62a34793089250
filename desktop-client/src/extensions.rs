use goose_desktop_models::{ExtensionConfig, ExtensionEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::SettingsError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    extensions: BTreeMap<String, ExtensionEntry>,
}

/// Extensions installed on this machine, keyed by [`ExtensionConfig::key`].
#[derive(Debug)]
pub struct ExtensionRegistry {
    path: PathBuf,
    entries: BTreeMap<String, ExtensionEntry>,
}

impl ExtensionRegistry {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let file = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str::<RegistryFile>(&content)?
        } else {
            debug!("No extension registry at {}", path.display());
            RegistryFile::default()
        };

        Ok(Self {
            path,
            entries: file.extensions,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&ExtensionEntry> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExtensionEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add or replace an extension and write the registry to disk. The
    /// in-memory registry only changes once the write succeeded.
    pub fn upsert(&mut self, config: ExtensionConfig, enabled: bool) -> Result<(), SettingsError> {
        let key = config.key();
        info!("Saving extension '{}' as {}", config.name(), key);
        let mut entries = self.entries.clone();
        entries.insert(key, ExtensionEntry { enabled, config });
        self.commit(entries)
    }

    pub fn set_enabled(&mut self, key: &str, enabled: bool) -> Result<bool, SettingsError> {
        let mut entries = self.entries.clone();
        match entries.get_mut(key) {
            Some(entry) => {
                entry.enabled = enabled;
                self.commit(entries)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<ExtensionEntry>, SettingsError> {
        let mut entries = self.entries.clone();
        let removed = entries.remove(key);
        if removed.is_some() {
            self.commit(entries)?;
        }
        Ok(removed)
    }

    fn commit(&mut self, entries: BTreeMap<String, ExtensionEntry>) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = RegistryFile { extensions: entries };
        std::fs::write(&self.path, toml::to_string_pretty(&file)?)?;
        self.entries = file.extensions;
        Ok(())
    }
}
