use async_trait::async_trait;
use goose_desktop_models::{Content, ToolCall};
use tracing::debug;

/// OS integration points the chat needs from the desktop shell.
pub trait DesktopHooks: Send + Sync {
    /// Keep the display awake while a reply is streaming.
    fn set_power_save_blocked(&self, blocked: bool);

    fn notify(&self, title: &str, body: &str);
}

#[derive(Debug, Default)]
pub struct NoopHooks;

impl DesktopHooks for NoopHooks {
    fn set_power_save_blocked(&self, blocked: bool) {
        debug!("Power save blocker: {}", blocked);
    }

    fn notify(&self, title: &str, body: &str) {
        debug!("Notification: {} - {}", title, body);
    }
}

/// Runs tools that only the desktop process can execute.
#[async_trait]
pub trait FrontendToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> Result<Vec<Content>, String>;
}

/// Executor for shells without any frontend tools.
#[derive(Debug, Default)]
pub struct NoFrontendTools;

#[async_trait]
impl FrontendToolExecutor for NoFrontendTools {
    async fn execute(&self, call: &ToolCall) -> Result<Vec<Content>, String> {
        Err(format!("Frontend tool '{}' is not available", call.name))
    }
}
