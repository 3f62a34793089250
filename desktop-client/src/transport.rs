use async_trait::async_trait;
use futures_util::stream::BoxStream;
use goose_desktop_models::{
    ExtensionConfig, ReplyRequest, SessionDetails, ToolConfirmationResponse, ToolResultRequest,
};

use crate::error::TransportError;

/// Raw body of a `/reply` response, chunk by chunk.
pub type ReplyBody = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// The parts of goosed a chat session talks to.
#[async_trait]
pub trait ReplyTransport: Send + Sync {
    async fn reply(&self, request: ReplyRequest) -> Result<ReplyBody, TransportError>;

    async fn submit_tool_result(&self, request: ToolResultRequest) -> Result<(), TransportError>;

    async fn confirm_tool(&self, response: ToolConfirmationResponse)
        -> Result<(), TransportError>;
}

/// Extension registration on the running agent.
#[async_trait]
pub trait ExtensionBackend: Send + Sync {
    async fn add_extension(&self, config: &ExtensionConfig) -> Result<(), TransportError>;

    async fn remove_extension(&self, name: &str) -> Result<(), TransportError>;
}

/// Read access to the session sharing service.
#[async_trait]
pub trait SharedSessionSource: Send + Sync {
    async fn fetch_shared_session(
        &self,
        share_base_url: &str,
        token: &str,
    ) -> Result<SessionDetails, TransportError>;
}
