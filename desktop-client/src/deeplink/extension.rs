use goose_desktop_models::{Envs, ExtensionConfig, DEFAULT_EXTENSION_TIMEOUT};
use tracing::{debug, warn};
use url::Url;

use crate::error::ExtensionInstallError;

pub const EXTENSION_PREFIX: &str = "goose://extension";

/// Launchers an extension link may use.
pub const ALLOWED_COMMANDS: &[&str] = &["npx", "uvx", "goosed"];

/// A validated `goose://extension?...` link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionLink {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub cmd: String,
    pub args: Vec<String>,
    /// Variables the link provides values for
    pub envs: Envs,
    /// Variables the link declares without a value
    pub required_env: Vec<String>,
    pub timeout: u64,
}

impl ExtensionLink {
    /// Parse and validate a link. Performs no I/O.
    pub fn parse(link: &str) -> Result<Self, ExtensionInstallError> {
        debug!("Parsing extension link: {}", link);
        let invalid_scheme = || ExtensionInstallError::InvalidScheme {
            url: link.to_string(),
        };

        if !link.starts_with(EXTENSION_PREFIX) {
            return Err(invalid_scheme());
        }
        let url = Url::parse(link).map_err(|_| invalid_scheme())?;
        if url.scheme() != "goose" || url.host_str() != Some("extension") {
            return Err(invalid_scheme());
        }

        let mut id = None;
        let mut name = None;
        let mut description = None;
        let mut cmd = None;
        let mut args = Vec::new();
        let mut env = Vec::new();
        let mut timeout = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "id" => id = Some(value.into_owned()),
                "name" => name = Some(value.into_owned()),
                "description" => description = Some(value.into_owned()),
                "cmd" => cmd = Some(value.into_owned()),
                "arg" => args.push(value.into_owned()),
                "env" => env.push(value.into_owned()),
                "timeout" => timeout = Some(value.into_owned()),
                other => debug!("Ignoring unknown extension link parameter '{}'", other),
            }
        }

        // npx -c runs an arbitrary shell string
        if cmd.as_deref() == Some("npx") && args.iter().any(|arg| arg == "-c") {
            warn!("Rejected extension link using 'npx -c'");
            return Err(ExtensionInstallError::InjectionRisk {
                cmd: "npx".to_string(),
                arg: "-c".to_string(),
            });
        }

        let name = required(name, "name")?;
        let description = required(description, "description")?;
        let cmd = required(cmd, "cmd")?;

        if !ALLOWED_COMMANDS.contains(&cmd.as_str()) {
            warn!("Rejected extension link with command '{}'", cmd);
            return Err(ExtensionInstallError::DisallowedCommand { cmd });
        }

        let mut envs = Envs::default();
        let mut required_env = Vec::new();
        for entry in env {
            match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                    envs.insert(key, value);
                }
                Some((key, _)) if !key.is_empty() => required_env.push(key.to_string()),
                None if !entry.is_empty() => required_env.push(entry),
                _ => {
                    return Err(ExtensionInstallError::InvalidField {
                        field: "env".to_string(),
                        value: entry,
                    })
                }
            }
        }

        let timeout = match timeout {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ExtensionInstallError::InvalidField {
                    field: "timeout".to_string(),
                    value,
                })?,
            None => DEFAULT_EXTENSION_TIMEOUT,
        };

        Ok(Self {
            id: id.filter(|id| !id.is_empty()),
            name,
            description,
            cmd,
            args,
            envs,
            required_env,
            timeout,
        })
    }

    pub fn to_config(&self) -> ExtensionConfig {
        ExtensionConfig::Stdio {
            name: self.name.clone(),
            cmd: self.cmd.clone(),
            args: self.args.clone(),
            envs: self.envs.clone(),
            description: Some(self.description.clone()),
            timeout: Some(self.timeout),
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ExtensionInstallError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ExtensionInstallError::missing_field(field)),
    }
}
