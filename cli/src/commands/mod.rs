//! Command implementations for the goose-desktop CLI

pub mod chat;
pub mod deeplink;
pub mod extension;
pub mod session;
pub mod settings;
pub mod status;

pub use chat::*;
pub use deeplink::*;
pub use extension::*;
pub use session::*;
pub use settings::*;
pub use status::*;
