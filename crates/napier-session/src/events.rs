use serde_json::Value;
use tokio::sync::broadcast;

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Lifecycle notifications emitted by a session front end.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The remote session is live. For the widget shell the id is the proxy
    /// session id.
    Connected { conversation_id: String },
    Disconnected,
    PermissionDenied { message: String },
    Error { message: String },
    /// A reply from the agent.
    Message(Value),
    ToolInvoked { name: String, ok: bool },
}

/// Fan-out of [`SessionEvent`]s to any number of observers.
///
/// Emitting never blocks and never fails; events sent with no subscriber are
/// dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("session event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
