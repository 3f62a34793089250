mod common;

use common::{sse, EchoTools, FakeTransport, RecordingHooks, ScriptedReply};
use goose_desktop_client::chat::{ChatOptions, ChatSession, TurnState};
use goose_desktop_client::error::{ChatError, TransportError};
use goose_desktop_client::events::DesktopEvent;
use goose_desktop_models::{
    Content, Message, MessageContent, Role, SessionDetails, SessionMetadata, StreamEvent,
    ToolCall, ToolResultPayload,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn text(id: &str, text: &str) -> String {
    sse(&StreamEvent::Message {
        message: Message::assistant().with_id(id).with_text(text),
    })
}

fn finish() -> String {
    sse(&StreamEvent::Finish {
        reason: "stop".to_string(),
    })
}

fn session_with(transport: Arc<FakeTransport>, hooks: Arc<RecordingHooks>) -> ChatSession {
    ChatSession::builder(transport)
        .chat_id("chat-1")
        .hooks(hooks)
        .frontend_tools(Arc::new(EchoTools))
        .build()
}

async fn wait_for_state(session: &ChatSession, state: TurnState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("state not reached");
}

#[tokio::test]
async fn test_streamed_reply_folds_into_one_assistant_message() {
    let split = text("r1", "lo ");
    let (head, tail) = split.split_at(20);
    let transport = Arc::new(FakeTransport::new(vec![ScriptedReply::Complete(vec![
        text("r1", "Hel"),
        // a frame split across chunks
        head.to_string(),
        tail.to_string(),
        text("r1", "there"),
        finish(),
    ])]));
    let hooks = Arc::new(RecordingHooks::default());
    let session = session_with(transport.clone(), hooks.clone());
    let mut events = session.events().subscribe();

    tokio_test::assert_ok!(session.append(Message::user().with_text("hi")));
    assert!(session.is_loading());
    assert_eq!(session.wait_idle().await, TurnState::Finished);

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].as_concat_text(), "Hello there");
    assert_eq!(*hooks.power_save.lock().unwrap(), vec![true, false]);
    assert!(hooks.notifications.lock().unwrap().is_empty());

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests[0].session_id.as_deref(), Some("chat-1"));
    assert_eq!(requests[0].messages.len(), 1);
    drop(requests);

    let mut finished = false;
    while let Some(event) = events.try_recv() {
        if matches!(event, DesktopEvent::TurnFinished { ref chat_id } if chat_id == "chat-1") {
            finished = true;
        }
    }
    assert!(finished);
}

#[tokio::test]
async fn test_append_rejected_while_turn_in_flight() {
    let transport = Arc::new(FakeTransport::new(vec![ScriptedReply::Stall(vec![text(
        "r1", "thinking",
    )])]));
    let session = session_with(transport.clone(), Arc::new(RecordingHooks::default()));

    session.append(Message::user().with_text("first")).unwrap();
    let err = session
        .append(Message::user().with_text("second"))
        .unwrap_err();
    assert!(matches!(err, ChatError::TurnInProgress));

    wait_for_state(&session, TurnState::Streaming).await;
    assert_eq!(transport.request_count(), 1);
    session.stop();
}

#[tokio::test]
async fn test_stop_keeps_partial_reply_and_ignores_rest() {
    let transport = Arc::new(FakeTransport::new(vec![ScriptedReply::Stall(vec![text(
        "r1", "partial",
    )])]));
    let hooks = Arc::new(RecordingHooks::default());
    let session = session_with(transport, hooks.clone());

    session.append(Message::user().with_text("hi")).unwrap();
    wait_for_state(&session, TurnState::Streaming).await;

    let outcome = session.stop();
    assert!(outcome.was_active);
    assert!(outcome.restored_input.is_none());
    assert_eq!(session.state(), TurnState::Stopped);
    assert!(!session.is_loading());
    assert_eq!(session.wait_idle().await, TurnState::Stopped);

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].as_concat_text(), "partial");
    assert_eq!(hooks.power_save.lock().unwrap().last(), Some(&false));
}

#[tokio::test]
async fn test_stop_before_first_frame_restores_input() {
    let transport = Arc::new(FakeTransport::new(vec![ScriptedReply::Stall(vec![])]));
    let session = session_with(transport, Arc::new(RecordingHooks::default()));

    session.append(Message::user().with_text("never mind")).unwrap();
    let outcome = session.stop();
    assert_eq!(outcome.restored_input.as_deref(), Some("never mind"));
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn test_stalled_stream_times_out() {
    let transport = Arc::new(FakeTransport::new(vec![ScriptedReply::Stall(vec![text(
        "r1", "half",
    )])]));
    let hooks = Arc::new(RecordingHooks::default());
    let session = ChatSession::builder(transport)
        .hooks(hooks.clone())
        .options(ChatOptions {
            idle_timeout: Duration::from_millis(50),
            ..ChatOptions::default()
        })
        .build();
    let mut events = session.events().subscribe();

    session.append(Message::user().with_text("hi")).unwrap();
    assert_eq!(session.wait_idle().await, TurnState::Errored);
    assert!(session.error().unwrap().contains("No data received"));
    assert_eq!(session.messages()[1].as_concat_text(), "half");
    assert_eq!(hooks.power_save.lock().unwrap().last(), Some(&false));

    let mut banner = None;
    while let Some(event) = events.try_recv() {
        if let DesktopEvent::TurnFailed { banner: b, .. } = event {
            banner = Some(b);
        }
    }
    let banner = banner.expect("no failure banner");
    assert_eq!(banner.retry_label.as_deref(), Some("Retry Last Message"));
}

#[tokio::test]
async fn test_malformed_frame_keeps_valid_prefix() {
    let transport = Arc::new(FakeTransport::new(vec![ScriptedReply::Complete(vec![
        text("r1", "valid prefix"),
        "data: {\"type\":\"Message\",\"message\":\n\n".to_string(),
        text("r1", " never applied"),
    ])]));
    let session = session_with(transport, Arc::new(RecordingHooks::default()));

    session.append(Message::user().with_text("hi")).unwrap();
    assert_eq!(session.wait_idle().await, TurnState::Errored);
    assert_eq!(session.messages()[1].as_concat_text(), "valid prefix");
}

#[tokio::test]
async fn test_retry_resends_last_user_text() {
    let transport = Arc::new(FakeTransport::new(vec![
        ScriptedReply::Fail(TransportError::http_status(500, "provider down")),
        ScriptedReply::Complete(vec![text("r2", "recovered"), finish()]),
    ]));
    let session = session_with(transport.clone(), Arc::new(RecordingHooks::default()));

    session.append(Message::user().with_text("summarize")).unwrap();
    assert_eq!(session.wait_idle().await, TurnState::Errored);
    assert!(session.error().unwrap().contains("500"));

    session.retry_last_message().unwrap();
    assert_eq!(session.wait_idle().await, TurnState::Finished);
    assert!(session.error().is_none());

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let resent = requests[1].messages.last().unwrap();
    assert_eq!(resent.as_concat_text(), "summarize");
}

#[tokio::test]
async fn test_retry_without_user_message() {
    let session = session_with(
        Arc::new(FakeTransport::default()),
        Arc::new(RecordingHooks::default()),
    );
    assert!(matches!(
        session.retry_last_message(),
        Err(ChatError::NothingToRetry)
    ));
}

#[tokio::test]
async fn test_frontend_tool_result_is_submitted() {
    let call = ToolCall::new("clipboard__read", json!({}));
    let request = sse(&StreamEvent::Message {
        message: Message::assistant().with_frontend_tool_request("f1", Ok(call)),
    });
    let response = sse(&StreamEvent::Message {
        message: Message::user().with_tool_response("f1", Ok(vec![Content::text("ran clipboard__read")])),
    });
    let transport = Arc::new(FakeTransport::new(vec![ScriptedReply::Complete(vec![
        request,
        response,
        text("r1", "Done"),
        finish(),
    ])]));
    let session = session_with(transport.clone(), Arc::new(RecordingHooks::default()));

    session.append(Message::user().with_text("paste")).unwrap();
    assert_eq!(session.wait_idle().await, TurnState::Finished);

    let results = transport.tool_results.lock().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "f1");
    assert_eq!(
        results[0].result,
        ToolResultPayload::Ok(vec![Content::text("ran clipboard__read")])
    );

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert!(matches!(
        messages[1].content.first(),
        Some(MessageContent::FrontendToolRequest(_))
    ));
}

#[tokio::test]
async fn test_confirmation_request_is_published_and_answered() {
    let confirmation = sse(&StreamEvent::Message {
        message: Message::assistant().with_content(MessageContent::tool_confirmation_request(
            "c1",
            "developer__shell".to_string(),
            json!({"command": "rm -rf build"}),
            Some("Allow this command?".to_string()),
        )),
    });
    let transport = Arc::new(FakeTransport::new(vec![ScriptedReply::Stall(vec![
        confirmation,
    ])]));
    let session = session_with(transport.clone(), Arc::new(RecordingHooks::default()));
    let mut events = session.events().subscribe();

    session.append(Message::user().with_text("clean up")).unwrap();
    wait_for_state(&session, TurnState::AwaitingToolResult).await;

    let mut requested = None;
    while let Some(event) = events.try_recv() {
        if let DesktopEvent::ToolConfirmationRequested { request, .. } = event {
            requested = Some(request);
        }
    }
    assert_eq!(requested.unwrap().id, "c1");

    session.confirm_tool("c1", true).await.unwrap();
    let confirmations = transport.confirmations.lock().unwrap();
    assert_eq!(confirmations[0].id, "c1");
    assert!(confirmations[0].confirmed);
    drop(confirmations);
    session.stop();
}

#[tokio::test]
async fn test_notifies_when_user_is_away() {
    let transport = Arc::new(FakeTransport::new(vec![ScriptedReply::Complete(vec![
        text("r1", "done"),
        finish(),
    ])]));
    let hooks = Arc::new(RecordingHooks::default());
    let session = ChatSession::builder(transport)
        .hooks(hooks.clone())
        .options(ChatOptions {
            inactivity_threshold: Duration::ZERO,
            ..ChatOptions::default()
        })
        .build();

    session.append(Message::user().with_text("long task")).unwrap();
    session.wait_idle().await;
    assert_eq!(hooks.notifications.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_resume_sets_history_index() {
    let session = session_with(
        Arc::new(FakeTransport::default()),
        Arc::new(RecordingHooks::default()),
    );
    session.resume(SessionDetails {
        session_id: "s-42".to_string(),
        metadata: SessionMetadata {
            description: "Old chat".to_string(),
            ..SessionMetadata::default()
        },
        messages: vec![
            Message::user().with_text("q"),
            Message::assistant().with_text("a"),
        ],
    });

    let chat = session.snapshot();
    assert_eq!(chat.id, "chat-1");
    assert_eq!(chat.title, "Old chat");
    assert_eq!(chat.messages.len(), 2);
    assert_eq!(chat.message_history_index, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_racing_append_releases_power_save() {
    for _ in 0..50 {
        let transport = Arc::new(FakeTransport::new(vec![ScriptedReply::Complete(vec![
            text("r1", "ok"),
            finish(),
        ])]));
        let hooks = Arc::new(RecordingHooks::default());
        let session = Arc::new(session_with(transport, hooks.clone()));

        let stopper = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.stop())
        };
        session.append(Message::user().with_text("hi")).unwrap();
        stopper.join().unwrap();

        session.wait_idle().await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while hooks.power_save.lock().unwrap().last() != Some(&false) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("power save still blocked");
        assert!(!session.is_loading());
    }
}
