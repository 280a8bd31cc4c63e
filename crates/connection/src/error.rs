//! Errors reported through a session's `on_error` callback.

use chatlink_protocol::CodecError;
use tokio_tungstenite::tungstenite;

/// Errors surfaced by a [`ConnectionSession`](crate::ConnectionSession).
///
/// None of these end the session. They are delivered to `on_error` and the
/// session carries on (or waits for its reconnect timer).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// An inbound frame could not be decoded and was dropped.
    #[error("dropped inbound frame: {0}")]
    MalformedFrame(#[source] CodecError),

    /// The socket reported an error. A close usually follows.
    #[error("WebSocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// The socket could not even be constructed (bad URI, unsupported scheme).
    #[error("cannot connect to {url}: {reason}")]
    ConnectFailure { url: String, reason: String },

    /// An outbound frame could not be serialized.
    #[error("dropped outbound frame: {0}")]
    Encode(#[source] CodecError),
}
