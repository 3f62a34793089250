use futures_util::StreamExt;
use goose_desktop_models::{
    FrontendToolRequest, Message, ReplyRequest, SessionDetails, ToolConfirmationResponse,
    ToolResultRequest,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::hooks::{DesktopHooks, FrontendToolExecutor, NoFrontendTools, NoopHooks};
use super::reconciler::{MessageReconciler, StopOutcome, TurnEnd, TurnId, TurnState};
use super::{Chat, ChatOptions};
use crate::error::{ChatError, ChatResult, TransportError};
use crate::events::{Banner, DesktopEvent, EventBus, Toast};
use crate::stream::frame_stream;
use crate::transport::ReplyTransport;

const FINISHED_NOTIFICATION_TITLE: &str = "Goose";
const FINISHED_NOTIFICATION_BODY: &str = "Goose has finished working on your request.";

/// Drives one chat: sends turns to goosed and folds the replies in.
pub struct ChatSession {
    shared: Arc<SessionShared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct SessionShared {
    chat_id: String,
    title: Mutex<String>,
    reconciler: Mutex<MessageReconciler>,
    history_index: Mutex<usize>,
    transport: Arc<dyn ReplyTransport>,
    hooks: Arc<dyn DesktopHooks>,
    tools: Arc<dyn FrontendToolExecutor>,
    events: EventBus<DesktopEvent>,
    options: ChatOptions,
    last_activity: Mutex<Instant>,
    state_tx: watch::Sender<TurnState>,
}

pub struct ChatSessionBuilder {
    chat_id: Option<String>,
    title: String,
    transport: Arc<dyn ReplyTransport>,
    hooks: Arc<dyn DesktopHooks>,
    tools: Arc<dyn FrontendToolExecutor>,
    events: EventBus<DesktopEvent>,
    options: ChatOptions,
    messages: Vec<Message>,
}

impl ChatSessionBuilder {
    pub fn chat_id<S: Into<String>>(mut self, chat_id: S) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = title.into();
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn DesktopHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn frontend_tools(mut self, tools: Arc<dyn FrontendToolExecutor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn events(mut self, events: EventBus<DesktopEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn build(self) -> ChatSession {
        let chat_id = self
            .chat_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let (state_tx, _) = watch::channel(TurnState::Idle);
        let history_index = self.messages.len();

        ChatSession {
            shared: Arc::new(SessionShared {
                chat_id,
                title: Mutex::new(self.title),
                reconciler: Mutex::new(MessageReconciler::with_messages(self.messages)),
                history_index: Mutex::new(history_index),
                transport: self.transport,
                hooks: self.hooks,
                tools: self.tools,
                events: self.events,
                options: self.options,
                last_activity: Mutex::new(Instant::now()),
                state_tx,
            }),
            task: Mutex::new(None),
        }
    }
}

impl ChatSession {
    pub fn builder(transport: Arc<dyn ReplyTransport>) -> ChatSessionBuilder {
        ChatSessionBuilder {
            chat_id: None,
            title: "New Chat".to_string(),
            transport,
            hooks: Arc::new(NoopHooks),
            tools: Arc::new(NoFrontendTools),
            events: EventBus::default(),
            options: ChatOptions::default(),
            messages: Vec::new(),
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.shared.chat_id
    }

    pub fn events(&self) -> &EventBus<DesktopEvent> {
        &self.shared.events
    }

    /// Append a user message and start streaming the reply.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// [`ChatError::TurnInProgress`] while another turn is in flight.
    pub fn append(&self, message: Message) -> ChatResult<TurnId> {
        self.record_user_activity();

        // held until the handle is stored so a concurrent stop() can abort it
        let mut task = self.task();
        let (turn, request) = {
            let mut reconciler = self.shared.reconciler();
            let turn = reconciler.begin_turn(message)?;
            (turn, self.shared.reply_request(reconciler.messages()))
        };

        info!(
            "Chat {}: sending {} messages",
            self.shared.chat_id,
            request.messages.len()
        );
        self.shared.sync_state();
        self.shared.hooks.set_power_save_blocked(true);
        self.shared.publish_changed();

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move { shared.run_turn(turn, request).await });
        if let Some(previous) = task.replace(handle) {
            // the previous turn already reached a terminal state
            previous.abort();
        }
        Ok(turn)
    }

    /// Cancel the in-flight turn, if any, and reconcile the message list.
    pub fn stop(&self) -> StopOutcome {
        let mut task = self.task();
        if let Some(handle) = task.take() {
            handle.abort();
        }

        let outcome = self.shared.reconciler().stop();
        self.shared.sync_state();
        self.shared.hooks.set_power_save_blocked(false);
        self.shared.publish_changed();
        outcome
    }

    /// Send the text of the most recent user message again.
    pub fn retry_last_message(&self) -> ChatResult<TurnId> {
        let text = self
            .shared
            .reconciler()
            .last_user_text()
            .ok_or(ChatError::NothingToRetry)?;
        debug!("Chat {}: retrying last message", self.shared.chat_id);
        self.append(Message::user().with_text(text))
    }

    /// Answer a tool confirmation prompt.
    pub async fn confirm_tool(&self, id: &str, confirmed: bool) -> ChatResult<()> {
        self.record_user_activity();
        info!(
            "Chat {}: tool {} {}",
            self.shared.chat_id,
            id,
            if confirmed { "approved" } else { "denied" }
        );
        self.shared
            .transport
            .confirm_tool(ToolConfirmationResponse {
                id: id.to_string(),
                confirmed,
            })
            .await?;
        Ok(())
    }

    pub fn record_user_activity(&self) {
        *lock(&self.shared.last_activity) = Instant::now();
    }

    pub fn messages(&self) -> Vec<Message> {
        self.shared.reconciler().messages().to_vec()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.reconciler().is_loading()
    }

    /// Display text of the last turn's error.
    pub fn error(&self) -> Option<String> {
        self.shared.reconciler().error().map(|e| e.to_string())
    }

    pub fn state(&self) -> TurnState {
        self.shared.reconciler().state()
    }

    pub fn set_messages(&self, messages: Vec<Message>) {
        self.shared.reconciler().set_messages(messages);
        self.shared.publish_changed();
    }

    /// Load a backend session into this chat. Messages up to the history
    /// index are treated as prior history.
    pub fn resume(&self, session: SessionDetails) {
        info!(
            "Chat {}: resuming session {} ({} messages)",
            self.shared.chat_id,
            session.session_id,
            session.messages.len()
        );
        *lock(&self.shared.history_index) = session.messages.len();
        if !session.metadata.description.is_empty() {
            *lock(&self.shared.title) = session.metadata.description.clone();
        }
        self.set_messages(session.messages);
    }

    pub fn snapshot(&self) -> Chat {
        Chat {
            id: self.shared.chat_id.clone(),
            title: lock(&self.shared.title).clone(),
            messages: self.messages(),
            message_history_index: *lock(&self.shared.history_index),
        }
    }

    /// Wait until no turn is in flight.
    pub async fn wait_idle(&self) -> TurnState {
        let mut state = self.shared.state_tx.subscribe();
        let result = match state.wait_for(|s| !s.is_active()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        result
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        lock(&self.task)
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(handle) = self.task().take() {
            handle.abort();
        }
    }
}

impl SessionShared {
    fn reconciler(&self) -> MutexGuard<'_, MessageReconciler> {
        lock(&self.reconciler)
    }

    fn reply_request(&self, messages: &[Message]) -> ReplyRequest {
        ReplyRequest {
            messages: messages.to_vec(),
            session_id: Some(
                self.options
                    .session_id
                    .clone()
                    .unwrap_or_else(|| self.chat_id.clone()),
            ),
            session_working_dir: self.options.working_dir.clone(),
        }
    }

    fn sync_state(&self) {
        let state = self.reconciler().state();
        self.state_tx.send_replace(state);
    }

    fn is_current(&self, turn: TurnId) -> bool {
        self.reconciler().current_turn() == Some(turn)
    }

    fn publish_changed(&self) {
        self.events.publish(DesktopEvent::MessagesChanged {
            chat_id: self.chat_id.clone(),
        });
    }

    async fn run_turn(self: Arc<Self>, turn: TurnId, request: ReplyRequest) {
        let body = match self.transport.reply(request).await {
            Ok(body) => body,
            Err(e) => {
                self.fail_turn(turn, e.into());
                return;
            }
        };

        let frames = frame_stream(body);
        futures_util::pin_mut!(frames);
        let idle_timeout = self.options.idle_timeout;

        loop {
            let next = match tokio::time::timeout(idle_timeout, frames.next()).await {
                Ok(next) => next,
                Err(_) => {
                    let seconds = idle_timeout.as_secs();
                    warn!("Chat {}: no frame for {}s", self.chat_id, seconds);
                    self.fail_turn(turn, TransportError::IdleTimeout { seconds }.into());
                    return;
                }
            };

            match next {
                Some(Ok(event)) => {
                    let effects = self.reconciler().apply(turn, event);
                    self.sync_state();
                    if effects.changed {
                        self.publish_changed();
                    }

                    for (request_id, message) in effects.notifications {
                        self.events.publish(DesktopEvent::ToolNotification {
                            chat_id: self.chat_id.clone(),
                            request_id,
                            message,
                        });
                    }
                    for request in effects.confirmation_requests {
                        self.events.publish(DesktopEvent::ToolConfirmationRequested {
                            chat_id: self.chat_id.clone(),
                            request,
                        });
                    }
                    for request in effects.frontend_requests {
                        self.run_frontend_tool(turn, request).await;
                    }

                    match effects.end {
                        Some(TurnEnd::Finished) => {
                            self.on_finished();
                            return;
                        }
                        Some(TurnEnd::Errored) => {
                            self.on_errored();
                            return;
                        }
                        None => {}
                    }
                }
                Some(Err(e)) => {
                    self.fail_turn(turn, e);
                    return;
                }
                None => {
                    let completed = self.reconciler().complete(turn);
                    if completed {
                        self.sync_state();
                        self.on_finished();
                    }
                    return;
                }
            }
        }
    }

    async fn run_frontend_tool(&self, turn: TurnId, request: FrontendToolRequest) {
        let result = match &request.tool_call {
            Ok(call) => {
                debug!("Chat {}: running frontend tool {}", self.chat_id, call.name);
                self.tools.execute(call).await
            }
            Err(e) => Err(e.to_string()),
        };

        if !self.is_current(turn) {
            debug!(
                "Chat {}: dropping result of {} for a stopped turn",
                self.chat_id, request.id
            );
            return;
        }

        let body = ToolResultRequest {
            id: request.id.clone(),
            result: result.into(),
        };
        if let Err(source) = self.transport.submit_tool_result(body).await {
            let err = ChatError::ToolResultSubmission {
                id: request.id,
                source,
            };
            error!("Chat {}: {}", self.chat_id, err);
            self.events.publish(DesktopEvent::Toast(Toast::error(
                "Tool result not delivered",
                err.to_string(),
            )));
        }
    }

    fn fail_turn(&self, turn: TurnId, error: ChatError) {
        let failed = self.reconciler().fail(turn, error);
        if failed {
            self.sync_state();
            self.on_errored();
        }
    }

    fn on_finished(&self) {
        self.hooks.set_power_save_blocked(false);

        let idle_for = lock(&self.last_activity).elapsed();
        if idle_for > self.options.inactivity_threshold {
            self.hooks
                .notify(FINISHED_NOTIFICATION_TITLE, FINISHED_NOTIFICATION_BODY);
        }

        self.events.publish(DesktopEvent::TurnFinished {
            chat_id: self.chat_id.clone(),
        });
    }

    fn on_errored(&self) {
        self.hooks.set_power_save_blocked(false);

        let message = self
            .reconciler()
            .error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        self.publish_changed();
        self.events.publish(DesktopEvent::TurnFailed {
            chat_id: self.chat_id.clone(),
            banner: Banner::with_retry(message),
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
