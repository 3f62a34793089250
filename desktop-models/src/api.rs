use serde::{Deserialize, Serialize};

use crate::content::Content;
use crate::message::Message;

/// Body of `POST /reply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_working_dir: Option<String>,
}

/// Outcome of a tool executed by the desktop process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolResultPayload {
    Ok(Vec<Content>),
    Err(String),
}

impl From<Result<Vec<Content>, String>> for ToolResultPayload {
    fn from(result: Result<Vec<Content>, String>) -> Self {
        match result {
            Ok(content) => ToolResultPayload::Ok(content),
            Err(err) => ToolResultPayload::Err(err),
        }
    }
}

/// Body of `POST /tool_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultRequest {
    pub id: String,
    pub result: ToolResultPayload,
}

/// Body of `POST /confirm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfirmationResponse {
    pub id: String,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveExtensionRequest {
    pub name: String,
}
