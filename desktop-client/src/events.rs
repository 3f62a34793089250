//! Typed event bus between the client core and the desktop shell.

use goose_desktop_models::{ExtensionConfig, Recipe, SessionDetails, ToolConfirmationRequest};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

/// A transient notification for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
    pub auto_dismiss: bool,
}

impl Toast {
    pub fn success<T: Into<String>, M: Into<String>>(title: T, message: M) -> Self {
        Self {
            level: ToastLevel::Success,
            title: title.into(),
            message: message.into(),
            auto_dismiss: true,
        }
    }

    /// Error toasts stay until the user dismisses them.
    pub fn error<T: Into<String>, M: Into<String>>(title: T, message: M) -> Self {
        Self {
            level: ToastLevel::Error,
            title: title.into(),
            message: message.into(),
            auto_dismiss: false,
        }
    }
}

/// Inline banner shown under a failed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub message: String,
    pub retry_label: Option<String>,
}

impl Banner {
    pub fn with_retry<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            retry_label: Some("Retry Last Message".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DesktopEvent {
    Toast(Toast),
    MessagesChanged {
        chat_id: String,
    },
    TurnFinished {
        chat_id: String,
    },
    TurnFailed {
        chat_id: String,
        banner: Banner,
    },
    ToolConfirmationRequested {
        chat_id: String,
        request: ToolConfirmationRequest,
    },
    ToolNotification {
        chat_id: String,
        request_id: String,
        message: serde_json::Value,
    },
    /// An extension link needs env values before it can be installed
    ShowExtensionSettings {
        config: ExtensionConfig,
        missing_env: Vec<String>,
    },
    OpenSharedSession {
        session: SessionDetails,
    },
    OpenRecipe {
        recipe: Recipe,
    },
}

/// Broadcast bus; every subscriber sees every event published after it
/// subscribed.
#[derive(Debug)]
pub struct EventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns the number of subscribers that will see the event.
    pub fn publish(&self, event: E) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription<E> {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription<E> {
    receiver: broadcast::Receiver<E>,
}

impl<E: Clone> Subscription<E> {
    /// Next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<E> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}
