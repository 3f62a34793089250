use serde::{Deserialize, Serialize};
use std::fmt;

/// Who a message (or a piece of tool output) is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Rendering hints attached to content blocks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<Role>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f32>,
}

impl Annotations {
    pub fn for_audience(role: Role) -> Self {
        Self {
            audience: Some(vec![role]),
            priority: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    pub data: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedResource {
    pub resource: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// Output produced by a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text(TextContent),
    Image(ImageContent),
    Resource(EmbeddedResource),
}

impl Content {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Content::Text(TextContent {
            text: text.into(),
            annotations: None,
        })
    }

    pub fn with_audience(self, role: Role) -> Self {
        match self {
            Content::Text(mut text) => {
                text.annotations = Some(Annotations::for_audience(role));
                Content::Text(text)
            }
            Content::Image(mut image) => {
                image.annotations = Some(Annotations::for_audience(role));
                Content::Image(image)
            }
            Content::Resource(mut resource) => {
                resource.annotations = Some(Annotations::for_audience(role));
                Content::Resource(resource)
            }
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn audience(&self) -> Option<&[Role]> {
        let annotations = match self {
            Content::Text(c) => c.annotations.as_ref(),
            Content::Image(c) => c.annotations.as_ref(),
            Content::Resource(c) => c.annotations.as_ref(),
        };
        annotations.and_then(|a| a.audience.as_deref())
    }
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new<S: Into<String>>(name: S, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Failure reported for a tool call or a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolError(pub String);

impl ToolError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ToolError {}

pub type ToolResult<T> = Result<T, ToolError>;

/// Serde adapter for `ToolResult<T>`.
///
/// On the wire a result is `{"status":"success","value":...}` or
/// `{"status":"error","error":"..."}`.
pub mod tool_result_format {
    use super::{ToolError, ToolResult};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    #[serde(tag = "status", rename_all = "lowercase")]
    enum Borrowed<'a, T> {
        Success { value: &'a T },
        Error { error: &'a str },
    }

    #[derive(Deserialize)]
    #[serde(tag = "status", rename_all = "lowercase")]
    enum Owned<T> {
        Success { value: T },
        Error { error: String },
    }

    pub fn serialize<T, S>(result: &ToolResult<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match result {
            Ok(value) => Borrowed::Success { value }.serialize(serializer),
            Err(err) => Borrowed::<T>::serialize(&Borrowed::Error { error: &err.0 }, serializer),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<ToolResult<T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Ok(match Owned::<T>::deserialize(deserializer)? {
            Owned::Success { value } => Ok(value),
            Owned::Error { error } => Err(ToolError(error)),
        })
    }
}
