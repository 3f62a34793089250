use thiserror::Error;

/// Failures talking to goosed over HTTP.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Network or connection error
    #[error("Request failed: {source}")]
    Request {
        #[from]
        source: reqwest::Error,
    },

    /// Non-2xx response
    #[error("HTTP error (status {status}): {body}")]
    HttpStatus { status: u16, body: String },

    /// 2xx response whose body reports a failure
    #[error("goosed rejected the request: {message}")]
    Rejected { message: String },

    /// The reply stream stopped producing frames
    #[error("No data received from goosed for {seconds} seconds")]
    IdleTimeout { seconds: u64 },

    /// The reply stream broke while reading
    #[error("Stream closed: {message}")]
    StreamClosed { message: String },
}

impl TransportError {
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    pub fn stream_closed(message: impl Into<String>) -> Self {
        Self::StreamClosed {
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::HttpStatus { status, .. } => Some(*status),
            TransportError::Request { source } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Malformed data inside the reply stream.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Frame is not valid UTF-8: {source}")]
    InvalidUtf8 {
        #[from]
        source: std::str::Utf8Error,
    },

    #[error("Frame is not a valid event ({source}): {payload}")]
    InvalidJson {
        payload: String,
        source: serde_json::Error,
    },

    #[error("Tool response {id} does not match any tool request")]
    UnmatchedToolResponse { id: String },
}

/// Errors surfaced at the chat boundary.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Error frame sent by the agent
    #[error("Agent error: {message}")]
    Agent { message: String },

    #[error("A reply is already in progress for this chat")]
    TurnInProgress,

    #[error("There is no user message to retry")]
    NothingToRetry,

    #[error("Failed to submit result for tool {id}: {source}")]
    ToolResultSubmission {
        id: String,
        source: TransportError,
    },
}

impl ChatError {
    pub fn agent<S: Into<String>>(message: S) -> Self {
        Self::Agent {
            message: message.into(),
        }
    }
}

/// Rejections from the `goose://extension` install flow.
#[derive(Error, Debug)]
pub enum ExtensionInstallError {
    #[error("Invalid extension link, expected goose://extension: {url}")]
    InvalidScheme { url: String },

    #[error("Extension link is missing required field '{field}'")]
    MissingField { field: String },

    #[error("Command '{cmd}' is not allowed, expected one of: npx, uvx, goosed")]
    DisallowedCommand { cmd: String },

    #[error("Refusing to install: '{cmd} {arg}' can run arbitrary shell commands")]
    InjectionRisk { cmd: String, arg: String },

    #[error("Invalid value for '{field}': {value}")]
    InvalidField { field: String, value: String },

    #[error("Extension '{extension}' needs values for: {}", .missing.join(", "))]
    EnvVarsRequired {
        extension: String,
        missing: Vec<String>,
    },

    #[error("Failed to register extension with goosed: {source}")]
    Registration {
        #[from]
        source: TransportError,
    },

    #[error("Failed to save extension: {message}")]
    Persistence { message: String },

    #[error("No installed extension '{key}'")]
    NotInstalled { key: String },
}

impl ExtensionInstallError {
    pub fn missing_field<S: Into<String>>(field: S) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

/// Errors from deep links other than extension installs.
#[derive(Error, Debug)]
pub enum DeepLinkError {
    #[error("Shared session link has no token")]
    MissingSessionToken,

    #[error("Invalid recipe link: {message}")]
    InvalidRecipe { message: String },

    #[error(transparent)]
    Extension(#[from] ExtensionInstallError),

    #[error("Failed to fetch shared session: {source}")]
    SharedSession {
        #[from]
        source: TransportError,
    },

    #[error("Session sharing is not configured")]
    SharingDisabled,
}

/// Session files that cannot be imported.
#[derive(Error, Debug)]
pub enum ImportFormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid session file format: {reason}")]
    InvalidFormat { reason: String },

    #[error("Invalid session data: {0}")]
    Json(#[from] serde_json::Error),
}

impl ImportFormatError {
    pub fn invalid<S: Into<String>>(reason: S) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;
