use serde::{Deserialize, Serialize};

use crate::message::Message;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// A short description of the session, typically 3 words or less
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub working_dir: String,
    #[serde(default)]
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<i64>,
}

/// A backend-persisted chat, as returned by `/sessions/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetails {
    pub session_id: String,
    pub metadata: SessionMetadata,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub path: String,
    pub modified: String,
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
}

/// A session published through the sharing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedSessionDetails {
    pub share_token: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub working_dir: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<i64>,
}

impl From<SharedSessionDetails> for SessionDetails {
    fn from(shared: SharedSessionDetails) -> Self {
        let message_count = if shared.message_count > 0 {
            shared.message_count
        } else {
            shared.messages.len()
        };
        SessionDetails {
            session_id: shared.share_token,
            metadata: SessionMetadata {
                description: shared.description,
                working_dir: shared.working_dir,
                message_count,
                total_tokens: shared.total_tokens,
            },
            messages: shared.messages,
        }
    }
}
