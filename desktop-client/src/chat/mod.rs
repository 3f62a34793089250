//! Chat state: folding reply frames into messages and driving turns.

pub mod hooks;
pub mod interrupt;
pub mod reconciler;
pub mod session;

pub use hooks::{DesktopHooks, FrontendToolExecutor, NoFrontendTools, NoopHooks};
pub use reconciler::{FrameEffects, MessageReconciler, StopOutcome, TurnEnd, TurnId, TurnState};
pub use session::{ChatSession, ChatSessionBuilder};

use goose_desktop_models::Message;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::DesktopConfig;

/// A chat as the UI sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    /// Messages before this index came from a resumed session
    pub message_history_index: usize,
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Backend session id; the chat id is used when unset
    pub session_id: Option<String>,
    pub working_dir: Option<String>,
    pub idle_timeout: Duration,
    pub inactivity_threshold: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            session_id: None,
            working_dir: None,
            idle_timeout: Duration::from_secs(300),
            inactivity_threshold: Duration::from_secs(60),
        }
    }
}

impl ChatOptions {
    pub fn from_config(config: &DesktopConfig) -> Self {
        Self {
            session_id: None,
            working_dir: config.backend.working_dir.clone(),
            idle_timeout: config.chat.stream_idle_timeout(),
            inactivity_threshold: config.chat.inactivity_threshold(),
        }
    }
}
