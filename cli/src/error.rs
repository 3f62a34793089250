use goose_desktop_client::config::ConfigError;
use goose_desktop_client::{
    ChatError, DeepLinkError, ExtensionInstallError, ImportFormatError, SettingsError,
    TransportError,
};
use std::fmt;

/// Main error type for the goose-desktop CLI
#[derive(Debug)]
pub enum CliError {
    /// Configuration or settings problems
    Config(String),
    Io(std::io::Error),
    /// goosed unreachable or answering with an error
    Communication(TransportError),
    /// A chat turn failed
    Chat(ChatError),
    /// A goose:// link was rejected
    Link(DeepLinkError),
    /// A session file could not be read or written
    SessionFile(ImportFormatError),
    Other(anyhow::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Communication(err) => write!(f, "Communication error: {err}"),
            CliError::Chat(err) => write!(f, "Chat error: {err}"),
            CliError::Link(err) => write!(f, "Link error: {err}"),
            CliError::SessionFile(err) => write!(f, "Session file error: {err}"),
            CliError::Other(err) => write!(f, "Error: {err}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(err) => Some(err),
            CliError::Communication(err) => Some(err),
            CliError::Chat(err) => Some(err),
            CliError::Link(err) => Some(err),
            CliError::SessionFile(err) => Some(err),
            CliError::Other(err) => Some(err.as_ref()),
            CliError::Config(_) => None,
        }
    }
}

impl CliError {
    /// Get the exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Io(_) => 3,
            CliError::Link(_) => 4,
            CliError::Chat(_) => 5,
            CliError::SessionFile(_) => 6,
            CliError::Communication(_) => 7,
            CliError::Other(_) => 1,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Other(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Other(err.into())
    }
}

impl From<TransportError> for CliError {
    fn from(err: TransportError) -> Self {
        CliError::Communication(err)
    }
}

impl From<ChatError> for CliError {
    fn from(err: ChatError) -> Self {
        CliError::Chat(err)
    }
}

impl From<DeepLinkError> for CliError {
    fn from(err: DeepLinkError) -> Self {
        CliError::Link(err)
    }
}

impl From<ExtensionInstallError> for CliError {
    fn from(err: ExtensionInstallError) -> Self {
        CliError::Link(err.into())
    }
}

impl From<ImportFormatError> for CliError {
    fn from(err: ImportFormatError) -> Self {
        CliError::SessionFile(err)
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}
