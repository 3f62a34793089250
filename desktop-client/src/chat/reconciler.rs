use goose_desktop_models::{
    FrontendToolRequest, Message, MessageContent, Role, StreamEvent, TextContent,
    ToolConfirmationRequest,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::interrupt::interrupt_pending_tool_calls;
use crate::error::{ChatError, ProtocolError};

/// Where the current conversational turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    /// User message appended, request dispatched, nothing received yet
    Sending,
    Streaming,
    /// A tool request or confirmation is outstanding
    AwaitingToolResult,
    Finished,
    Errored,
    Stopped,
}

impl TurnState {
    /// True while a turn is in flight.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TurnState::Sending | TurnState::Streaming | TurnState::AwaitingToolResult
        )
    }
}

/// Identifies one turn; frames carrying an older id are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEnd {
    Finished,
    Errored,
}

/// Side effects requested by a frame, for the caller to carry out.
#[derive(Debug, Default)]
pub struct FrameEffects {
    pub frontend_requests: Vec<FrontendToolRequest>,
    pub confirmation_requests: Vec<ToolConfirmationRequest>,
    pub notifications: Vec<(String, serde_json::Value)>,
    pub changed: bool,
    pub end: Option<TurnEnd>,
}

#[derive(Debug, Default, PartialEq)]
pub struct StopOutcome {
    /// Text of a removed unanswered user message, for the input box
    pub restored_input: Option<String>,
    /// Tool calls that received a synthetic "Interrupted." response
    pub interrupted_tool_calls: Vec<String>,
    pub was_active: bool,
}

/// Folds reply frames into the message list of one chat.
#[derive(Debug, Default)]
pub struct MessageReconciler {
    messages: Vec<Message>,
    state: TurnState,
    error: Option<ChatError>,
    current_turn: Option<TurnId>,
    next_turn: u64,
    /// Index of this turn's assistant message, once the first frame arrived
    assistant_index: Option<usize>,
    pending_tools: BTreeSet<String>,
}

impl MessageReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_active()
    }

    pub fn error(&self) -> Option<&ChatError> {
        self.error.as_ref()
    }

    pub fn current_turn(&self) -> Option<TurnId> {
        self.current_turn
    }

    pub fn pending_tools(&self) -> impl Iterator<Item = &str> {
        self.pending_tools.iter().map(String::as_str)
    }

    /// Start a turn with `message`. Rejected while another turn is in flight.
    pub fn begin_turn(&mut self, message: Message) -> Result<TurnId, ChatError> {
        if self.state.is_active() {
            warn!("Rejecting new message: turn already in progress ({:?})", self.state);
            return Err(ChatError::TurnInProgress);
        }

        self.next_turn += 1;
        let turn = TurnId(self.next_turn);
        self.messages.push(message);
        self.current_turn = Some(turn);
        self.assistant_index = None;
        self.pending_tools.clear();
        self.error = None;
        self.state = TurnState::Sending;
        debug!("Turn {:?} started with {} messages", turn, self.messages.len());
        Ok(turn)
    }

    /// Reduce one frame of `turn` into the message list.
    pub fn apply(&mut self, turn: TurnId, event: StreamEvent) -> FrameEffects {
        let mut effects = FrameEffects::default();
        if !self.accepts(turn) {
            debug!("Ignoring frame for inactive turn {:?}", turn);
            return effects;
        }

        match event {
            StreamEvent::Message { message } => {
                if let Err(e) = self.apply_message(message, &mut effects) {
                    self.enter_error(e);
                    effects.end = Some(TurnEnd::Errored);
                }
                effects.changed = true;
            }
            StreamEvent::Notification {
                request_id,
                message,
            } => {
                debug!("Notification for tool request {}", request_id);
                effects.notifications.push((request_id, message));
            }
            StreamEvent::Finish { reason } => {
                info!("Turn {:?} finished ({})", turn, reason);
                self.finish();
                effects.end = Some(TurnEnd::Finished);
            }
            StreamEvent::Error { error } => {
                self.enter_error(ChatError::agent(error));
                effects.end = Some(TurnEnd::Errored);
            }
        }

        effects
    }

    /// Record a transport or decoding failure for `turn`. Messages reduced
    /// so far are kept.
    pub fn fail(&mut self, turn: TurnId, error: ChatError) -> bool {
        if !self.accepts(turn) {
            debug!("Ignoring failure for inactive turn {:?}: {}", turn, error);
            return false;
        }
        self.enter_error(error);
        true
    }

    /// The reply body closed without a terminal frame.
    pub fn complete(&mut self, turn: TurnId) -> bool {
        if !self.accepts(turn) {
            return false;
        }
        warn!("Reply stream for turn {:?} closed without a finish frame", turn);
        self.finish();
        true
    }

    /// Cancel the current turn and reconcile the last message.
    pub fn stop(&mut self) -> StopOutcome {
        let mut outcome = StopOutcome {
            was_active: self.state.is_active(),
            ..StopOutcome::default()
        };

        self.current_turn = None;
        self.assistant_index = None;
        self.pending_tools.clear();
        self.state = TurnState::Stopped;

        let last_role = self.messages.last().map(|m| (m.role, m.has_tool_content()));
        match last_role {
            Some((Role::User, false)) => {
                if let Some(removed) = self.messages.pop() {
                    debug!("Removed unanswered user message after stop");
                    outcome.restored_input = Some(removed.as_concat_text());
                }
            }
            Some((Role::Assistant, _)) => {
                if let Some(last) = self.messages.last_mut() {
                    outcome.interrupted_tool_calls = interrupt_pending_tool_calls(last);
                }
            }
            _ => {}
        }

        info!(
            "Stopped turn (active: {}, interrupted tool calls: {})",
            outcome.was_active,
            outcome.interrupted_tool_calls.len()
        );
        outcome
    }

    /// Replace the message list as-is.
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        if self.state.is_active() {
            debug!("Replacing messages during an active turn");
            self.assistant_index = None;
        }
        self.messages = messages;
    }

    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User && !m.as_concat_text().is_empty())
            .map(|m| m.as_concat_text())
    }

    fn accepts(&self, turn: TurnId) -> bool {
        self.current_turn == Some(turn) && self.state.is_active()
    }

    fn finish(&mut self) {
        if !self.pending_tools.is_empty() {
            warn!(
                "Turn finished with unanswered tool calls: {:?}",
                self.pending_tools
            );
        }
        self.state = TurnState::Finished;
        self.current_turn = None;
        self.assistant_index = None;
        self.pending_tools.clear();
    }

    fn enter_error(&mut self, error: ChatError) {
        warn!("Turn failed: {}", error);
        self.error = Some(error);
        self.state = TurnState::Errored;
        self.current_turn = None;
        self.assistant_index = None;
        self.pending_tools.clear();
    }

    fn assistant_message(&mut self, incoming: &Message) -> usize {
        if let Some(index) = self.assistant_index {
            return index;
        }
        let mut message = Message::assistant();
        if let Some(id) = &incoming.id {
            message.id = Some(id.clone());
        }
        if incoming.created > 0 {
            message.created = incoming.created;
        }
        self.messages.push(message);
        let index = self.messages.len() - 1;
        self.assistant_index = Some(index);
        index
    }

    fn apply_message(
        &mut self,
        incoming: Message,
        effects: &mut FrameEffects,
    ) -> Result<(), ChatError> {
        let index = self.assistant_message(&incoming);
        if self.state == TurnState::Sending {
            self.state = TurnState::Streaming;
        }

        for item in incoming.content {
            match item {
                MessageContent::Text(text) => self.push_text(index, text),
                MessageContent::ToolResponse(response) => {
                    if !self.is_known_invocation(&response.id) {
                        return Err(ProtocolError::UnmatchedToolResponse { id: response.id }.into());
                    }
                    self.pending_tools.remove(&response.id);
                    self.messages[index]
                        .content
                        .push(MessageContent::ToolResponse(response));
                }
                MessageContent::ToolRequest(request) => {
                    self.pending_tools.insert(request.id.clone());
                    self.messages[index]
                        .content
                        .push(MessageContent::ToolRequest(request));
                }
                MessageContent::FrontendToolRequest(request) => {
                    self.pending_tools.insert(request.id.clone());
                    effects.frontend_requests.push(request.clone());
                    self.messages[index]
                        .content
                        .push(MessageContent::FrontendToolRequest(request));
                }
                MessageContent::ToolConfirmationRequest(confirmation) => {
                    self.pending_tools.insert(confirmation.id.clone());
                    effects.confirmation_requests.push(confirmation.clone());
                    self.messages[index]
                        .content
                        .push(MessageContent::ToolConfirmationRequest(confirmation));
                }
            }
        }

        self.state = if self.pending_tools.is_empty() {
            TurnState::Streaming
        } else {
            TurnState::AwaitingToolResult
        };
        Ok(())
    }

    /// Append a text delta, merging it into a trailing plain text item.
    fn push_text(&mut self, index: usize, text: TextContent) {
        let content = &mut self.messages[index].content;
        if text.annotations.is_none() {
            if let Some(MessageContent::Text(last)) = content.last_mut() {
                if last.annotations.is_none() {
                    last.text.push_str(&text.text);
                    return;
                }
            }
        }
        content.push(MessageContent::Text(text));
    }

    fn is_known_invocation(&self, id: &str) -> bool {
        self.messages
            .iter()
            .any(|m| m.tool_request_ids().any(|request| request == id))
    }
}
