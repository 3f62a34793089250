use goose_desktop_models::{Content, Message, MessageContent, Role};
use std::collections::HashSet;

pub const INTERRUPTED_USER_TEXT: &str = "Interrupted.";
pub const INTERRUPTED_ASSISTANT_TEXT: &str = "Interrupted by the user to make a correction.";

/// Synthetic tool output recorded for a call the user cancelled.
pub fn interrupted_result() -> Vec<Content> {
    vec![
        Content::text(INTERRUPTED_USER_TEXT).with_audience(Role::User),
        Content::text(INTERRUPTED_ASSISTANT_TEXT).with_audience(Role::Assistant),
    ]
}

/// Give every unanswered tool invocation in `message` an "Interrupted."
/// response, placed right after its request. Returns the ids that were
/// resolved; calling it again on the same message resolves nothing.
pub fn interrupt_pending_tool_calls(message: &mut Message) -> Vec<String> {
    let mut answered: HashSet<String> = message.tool_response_ids().map(str::to_string).collect();
    let mut resolved = Vec::new();

    let mut content = Vec::with_capacity(message.content.len());
    for item in message.content.drain(..) {
        let pending = item
            .invocation_id()
            .filter(|id| !answered.contains(*id))
            .map(str::to_string);
        content.push(item);

        if let Some(id) = pending {
            content.push(MessageContent::tool_response(
                id.clone(),
                Ok(interrupted_result()),
            ));
            answered.insert(id.clone());
            resolved.push(id);
        }
    }
    message.content = content;

    resolved
}
