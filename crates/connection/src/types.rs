//! Public types for the chat session.

use std::time::Duration;

use chatlink_protocol::constants::{
    MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY, WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD,
};
use chatlink_protocol::resolve_endpoint;

use crate::callbacks::SessionCallbacks;

/// Lifecycle state of a [`ConnectionSession`](crate::ConnectionSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    /// Socket handshake in progress.
    Connecting,
    /// Socket open; frames flow both ways.
    Open,
    /// Intentional close in progress (close handshake pending).
    Closing,
    /// No socket. May be waiting for a reconnect timer.
    Closed,
}

/// A state change that the session state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid state transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

impl ConnectionState {
    /// Returns `true` if the state machine allows moving to `next`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Closed, Connecting)
                | (Connecting, Open)
                | (Connecting, Closed)
                | (Open, Closing)
                | (Open, Closed)
                | (Closing, Closed)
        )
    }

    /// Validates a transition, returning the new state.
    pub fn transition(self, next: ConnectionState) -> Result<ConnectionState, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// `Connecting` or `Open`: a `connect()` call is a no-op.
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

/// Configuration for automatic reconnection with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub base_delay: Duration,
    /// Attempts allowed after an unexpected close before giving up.
    pub max_attempts: u32,
    /// Adds ±25% jitter to each delay.
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: RECONNECT_BASE_DELAY,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            jitter: false,
        }
    }
}

/// Per-session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base socket URI, e.g. `wss://chat.example.com/ws`.
    pub endpoint_base: String,
    /// User or account identifier, appended as a path segment.
    pub identity: String,
    /// Conversation to attach to, appended as a second path segment.
    pub thread_id: Option<String>,
    pub reconnect: ReconnectConfig,
    /// Keepalive ping period. `None` disables pings.
    pub keepalive: Option<Duration>,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,
}

impl SessionConfig {
    pub fn new(endpoint_base: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            endpoint_base: endpoint_base.into(),
            identity: identity.into(),
            thread_id: None,
            reconnect: ReconnectConfig::default(),
            keepalive: Some(WS_PING_PERIOD),
            max_message_size: WS_MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Resolves the socket URI for the current identity and thread.
    pub fn endpoint(&self) -> String {
        resolve_endpoint(
            &self.endpoint_base,
            &self.identity,
            self.thread_id.as_deref(),
        )
    }
}

/// Partial configuration update applied by
/// [`ConnectionSession::update_config`](crate::ConnectionSession::update_config).
///
/// Unset fields are left alone. Changes take effect on the next connect;
/// an open socket is not torn down.
#[derive(Debug, Default)]
pub struct ConfigUpdate {
    pub endpoint_base: Option<String>,
    pub identity: Option<String>,
    /// `Some(None)` clears the thread.
    pub thread_id: Option<Option<String>>,
    /// Only the callbacks set here replace the current ones.
    pub callbacks: Option<SessionCallbacks>,
}

impl ConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint_base(mut self, base: impl Into<String>) -> Self {
        self.endpoint_base = Some(base.into());
        self
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn thread_id(mut self, thread_id: Option<String>) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    pub fn callbacks(mut self, callbacks: SessionCallbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub(crate) fn apply_to(self, config: &mut SessionConfig) -> Option<SessionCallbacks> {
        if let Some(base) = self.endpoint_base {
            config.endpoint_base = base;
        }
        if let Some(identity) = self.identity {
            config.identity = identity;
        }
        if let Some(thread_id) = self.thread_id {
            config.thread_id = thread_id;
        }
        self.callbacks
    }
}

/// Point-in-time view of a session's internal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub pending_frames: usize,
    pub accumulated_text: String,
    pub has_socket: bool,
    pub intentional_close: bool,
}
