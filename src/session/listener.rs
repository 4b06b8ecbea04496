use std::sync::Mutex;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::cache::lock::mutex_lock;
use crate::error::SessionError;

const SOURCE: &str = "session::listener";

/// Identifies the session a listener callback is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session_id: Uuid,
    pub context_type: &'static str,
    pub started_at: OffsetDateTime,
}

/// Observes one session's lifecycle. Every callback defaults to a no-op.
///
/// `on_end` is delivered exactly once per operation, after `on_error` when
/// the operation failed and also when it panicked.
pub trait SessionListener: Send + Sync {
    fn on_start(&self, _event: &SessionEvent) {}

    fn on_warning(&self, _event: &SessionEvent, _message: &str) {}

    fn on_error(&self, _event: &SessionEvent, _error: &SessionError) {}

    fn on_end(&self, _event: &SessionEvent) {}
}

/// One callback as seen by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerCall {
    Start,
    Warning(String),
    Error(String),
    End,
}

/// Keeps every callback it receives, in order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    calls: Mutex<Vec<ListenerCall>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ListenerCall> {
        mutex_lock(&self.calls, SOURCE, "calls").clone()
    }

    fn push(&self, call: ListenerCall) {
        mutex_lock(&self.calls, SOURCE, "push").push(call);
    }
}

impl SessionListener for RecordingListener {
    fn on_start(&self, _event: &SessionEvent) {
        self.push(ListenerCall::Start);
    }

    fn on_warning(&self, _event: &SessionEvent, message: &str) {
        self.push(ListenerCall::Warning(message.to_string()));
    }

    fn on_error(&self, _event: &SessionEvent, error: &SessionError) {
        self.push(ListenerCall::Error(error.to_string()));
    }

    fn on_end(&self, _event: &SessionEvent) {
        self.push(ListenerCall::End);
    }
}
