use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use goose_desktop_client::chat::{DesktopHooks, FrontendToolExecutor};
use goose_desktop_client::error::TransportError;
use goose_desktop_client::transport::{ReplyBody, ReplyTransport};
use goose_desktop_models::{
    Content, ReplyRequest, StreamEvent, ToolCall, ToolConfirmationResponse, ToolResultRequest,
};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Encode an event the way goosed writes it on the wire.
pub fn sse(event: &StreamEvent) -> String {
    format!("data: {}\n\n", serde_json::to_string(event).unwrap())
}

pub enum ScriptedReply {
    /// Chunks followed by end of body
    Complete(Vec<String>),
    /// Chunks, then the body stays open without sending anything
    Stall(Vec<String>),
    Fail(TransportError),
}

#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    pub requests: Mutex<Vec<ReplyRequest>>,
    pub tool_results: Mutex<Vec<ToolResultRequest>>,
    pub confirmations: Mutex<Vec<ToolConfirmationResponse>>,
}

impl FakeTransport {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

fn body(chunks: Vec<String>) -> impl futures_util::Stream<Item = Result<Vec<u8>, TransportError>> {
    stream::iter(chunks.into_iter().map(|c| Ok(c.into_bytes())))
}

#[async_trait]
impl ReplyTransport for FakeTransport {
    async fn reply(&self, request: ReplyRequest) -> Result<ReplyBody, TransportError> {
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted reply left");
        match reply {
            ScriptedReply::Complete(chunks) => Ok(body(chunks).boxed()),
            ScriptedReply::Stall(chunks) => Ok(body(chunks).chain(stream::pending()).boxed()),
            ScriptedReply::Fail(err) => Err(err),
        }
    }

    async fn submit_tool_result(&self, request: ToolResultRequest) -> Result<(), TransportError> {
        self.tool_results.lock().unwrap().push(request);
        Ok(())
    }

    async fn confirm_tool(&self, response: ToolConfirmationResponse) -> Result<(), TransportError> {
        self.confirmations.lock().unwrap().push(response);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingHooks {
    pub power_save: Mutex<Vec<bool>>,
    pub notifications: Mutex<Vec<String>>,
}

impl DesktopHooks for RecordingHooks {
    fn set_power_save_blocked(&self, blocked: bool) {
        self.power_save.lock().unwrap().push(blocked);
    }

    fn notify(&self, title: &str, body: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push(format!("{}: {}", title, body));
    }
}

/// Frontend tool that echoes the tool name back.
pub struct EchoTools;

#[async_trait]
impl FrontendToolExecutor for EchoTools {
    async fn execute(&self, call: &ToolCall) -> Result<Vec<Content>, String> {
        Ok(vec![Content::text(format!("ran {}", call.name))])
    }
}
