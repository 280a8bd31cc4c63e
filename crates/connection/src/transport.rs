//! Socket construction and the events socket tasks report to the driver.

use std::pin::Pin;

use futures_util::future::BoxFuture;
use futures_util::{Sink, Stream, StreamExt};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::debug;

use chatlink_protocol::constants::WS_MAX_MESSAGE_SIZE;

/// Write half of a socket.
pub type WsSink = Pin<Box<dyn Sink<tungstenite::Message, Error = tungstenite::Error> + Send>>;

/// Read half of a socket.
pub type WsStream =
    Pin<Box<dyn Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Send>>;

/// Future returned by [`Connector::connect`].
pub type ConnectFuture = BoxFuture<'static, Result<(WsSink, WsStream), tungstenite::Error>>;

/// Opens sockets for a session.
///
/// The production implementation is [`TungsteniteConnector`]; tests inject
/// in-memory sockets.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str) -> ConnectFuture;
}

/// Opens real WebSocket connections with `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    max_message_size: usize,
}

impl TungsteniteConnector {
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new(WS_MAX_MESSAGE_SIZE)
    }
}

impl Connector for TungsteniteConnector {
    fn connect(&self, url: &str) -> ConnectFuture {
        let url = url.to_string();
        let max = self.max_message_size;
        Box::pin(async move {
            let mut ws_config = WebSocketConfig::default();
            ws_config.max_message_size = Some(socket_limit(max));
            ws_config.max_frame_size = Some(socket_limit(max));
            let (ws_stream, response) =
                tokio_tungstenite::connect_async_with_config(url.as_str(), Some(ws_config), false)
                    .await?;
            debug!(url = %url, status = %response.status(), "WebSocket handshake complete");
            let (write, read) = ws_stream.split();
            Ok((Box::pin(write) as WsSink, Box::pin(read) as WsStream))
        })
    }
}

/// Socket-level size cap for a decoder limit of `max`.
///
/// Messages between `max` and this cap reach the decoder, which drops them
/// as oversized and keeps the socket. Only messages past the cap fail the
/// socket itself.
pub(crate) fn socket_limit(max: usize) -> usize {
    max.saturating_mul(4).saturating_add(SOCKET_LIMIT_HEADROOM)
}

const SOCKET_LIMIT_HEADROOM: usize = 64 * 1024;

/// Close frame details reported by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

/// Everything that reaches the driver from outside the caller's handle.
///
/// Socket events carry the generation of the socket that produced them; the
/// driver drops events from sockets it has already let go of.
pub(crate) enum SocketEvent {
    /// Handshake finished.
    Opened {
        generation: u64,
        sink: WsSink,
        stream: WsStream,
    },
    /// Handshake failed.
    ConnectFailed {
        generation: u64,
        error: tungstenite::Error,
    },
    /// Inbound text frame.
    Frame { generation: u64, text: String },
    /// The socket reported an error. A `Closed` follows.
    Error {
        generation: u64,
        error: tungstenite::Error,
    },
    /// The socket is gone.
    Closed {
        generation: u64,
        close: Option<CloseInfo>,
    },
    /// The write pump finished flushing and closing.
    Released { generation: u64 },
    /// A reconnect timer fired.
    ReconnectDue { timer: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_limit_leaves_room_above_decoder_limit() {
        assert_eq!(socket_limit(1024), 4 * 1024 + 64 * 1024);
        assert!(socket_limit(WS_MAX_MESSAGE_SIZE) > WS_MAX_MESSAGE_SIZE);
        assert_eq!(socket_limit(usize::MAX), usize::MAX);
    }
}
