use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default time, in seconds, the backend waits for an extension to start.
pub const DEFAULT_EXTENSION_TIMEOUT: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Envs {
    /// A map of environment variables to set, e.g. API_KEY -> some_secret, HOST -> host
    #[serde(default, flatten)]
    map: BTreeMap<String, String>,
}

impl Envs {
    pub fn new(map: BTreeMap<String, String>) -> Self {
        Self { map }
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// How the backend launches an MCP extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExtensionConfig {
    /// Server-sent events client with a URI endpoint
    Sse {
        name: String,
        uri: String,
        #[serde(default)]
        envs: Envs,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    /// Standard I/O client with command and arguments
    Stdio {
        name: String,
        cmd: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        envs: Envs,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    /// Built-in extension that is part of the goose binary
    Builtin {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
}

impl ExtensionConfig {
    pub fn name(&self) -> &str {
        match self {
            ExtensionConfig::Sse { name, .. }
            | ExtensionConfig::Stdio { name, .. }
            | ExtensionConfig::Builtin { name, .. } => name,
        }
    }

    /// Stable registry key derived from the display name.
    pub fn key(&self) -> String {
        extension_key(self.name())
    }

    pub fn envs(&self) -> Option<&Envs> {
        match self {
            ExtensionConfig::Sse { envs, .. } | ExtensionConfig::Stdio { envs, .. } => Some(envs),
            ExtensionConfig::Builtin { .. } => None,
        }
    }

    pub fn envs_mut(&mut self) -> Option<&mut Envs> {
        match self {
            ExtensionConfig::Sse { envs, .. } | ExtensionConfig::Stdio { envs, .. } => Some(envs),
            ExtensionConfig::Builtin { .. } => None,
        }
    }
}

pub fn extension_key(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// A locally persisted extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionEntry {
    pub enabled: bool,
    pub config: ExtensionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionResponse {
    pub error: bool,
    #[serde(default)]
    pub message: Option<String>,
}
