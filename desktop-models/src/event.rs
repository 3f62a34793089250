use serde::{Deserialize, Serialize};

use crate::message::Message;

/// One frame of the `/reply` stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A chunk of the assistant turn: text delta or tool traffic.
    Message { message: Message },
    /// Progress or log output from a running tool.
    Notification {
        request_id: String,
        message: serde_json::Value,
    },
    Finish {
        #[serde(default)]
        reason: String,
    },
    Error { error: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Finish { .. } | StreamEvent::Error { .. })
    }
}
