//! Caller-supplied notification hooks.
//!
//! All hooks are optional and fire-and-forget. They run on the session's
//! driver task, so they should hand work off rather than block.

use std::fmt;
use std::sync::Arc;

use chatlink_protocol::ResponseEvent;

use crate::error::SessionError;

pub type MessageCallback = Arc<dyn Fn(ResponseEvent) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(SessionError) + Send + Sync>;
pub type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;
pub type ExhaustedCallback = Arc<dyn Fn(u32) + Send + Sync>;

/// The set of hooks a session notifies.
#[derive(Clone, Default)]
pub struct SessionCallbacks {
    on_message: Option<MessageCallback>,
    on_error: Option<ErrorCallback>,
    on_connect: Option<LifecycleCallback>,
    on_disconnect: Option<LifecycleCallback>,
    on_retry_exhausted: Option<ExhaustedCallback>,
}

impl SessionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called for every inbound event, after stream accumulation.
    pub fn on_message(mut self, f: impl Fn(ResponseEvent) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(SessionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called each time a socket opens, including after a reconnect.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Called when a socket closes without the caller asking for it.
    pub fn on_disconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Called once when automatic reconnection gives up, with the number of
    /// attempts made. The session then stays closed until `connect()`.
    pub fn on_retry_exhausted(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_retry_exhausted = Some(Arc::new(f));
        self
    }

    /// Replaces the hooks that are set in `other`, keeping the rest.
    pub(crate) fn merge(&mut self, other: SessionCallbacks) {
        if other.on_message.is_some() {
            self.on_message = other.on_message;
        }
        if other.on_error.is_some() {
            self.on_error = other.on_error;
        }
        if other.on_connect.is_some() {
            self.on_connect = other.on_connect;
        }
        if other.on_disconnect.is_some() {
            self.on_disconnect = other.on_disconnect;
        }
        if other.on_retry_exhausted.is_some() {
            self.on_retry_exhausted = other.on_retry_exhausted;
        }
    }

    pub(crate) fn message(&self, event: ResponseEvent) {
        if let Some(cb) = &self.on_message {
            cb(event);
        }
    }

    pub(crate) fn error(&self, error: SessionError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    pub(crate) fn connected(&self) {
        if let Some(cb) = &self.on_connect {
            cb();
        }
    }

    pub(crate) fn disconnected(&self) {
        if let Some(cb) = &self.on_disconnect {
            cb();
        }
    }

    pub(crate) fn retry_exhausted(&self, attempts: u32) {
        if let Some(cb) = &self.on_retry_exhausted {
            cb(attempts);
        }
    }
}

impl fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_retry_exhausted", &self.on_retry_exhausted.is_some())
            .finish()
    }
}
