pub mod api_client;
pub mod chat;
pub mod config;
pub mod deeplink;
pub mod error;
pub mod events;
pub mod extensions;
pub mod retry;
pub mod session_file;
pub mod settings;
pub mod stream;
pub mod transport;

pub use api_client::GoosedClient;
pub use chat::{Chat, ChatOptions, ChatSession, TurnState};
pub use config::DesktopConfig;
pub use error::{
    ChatError, DeepLinkError, ExtensionInstallError, ImportFormatError, ProtocolError,
    SettingsError, TransportError,
};
pub use events::{DesktopEvent, EventBus, Subscription, Toast};
