// Shared models for the goose desktop client and the goosed backend

pub mod api;
pub mod content;
pub mod event;
pub mod extension;
pub mod message;
pub mod recipe;
pub mod session;

pub use api::*;
pub use content::*;
pub use event::*;
pub use extension::*;
pub use message::*;
pub use recipe::*;
pub use session::*;
