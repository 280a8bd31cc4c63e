//! Resilient WebSocket transport for streaming chat.
//!
//! A [`ConnectionSession`] owns one socket to the chat backend: it queues
//! frames while disconnected, rebuilds streamed replies from their chunks,
//! and reconnects with exponential backoff after unexpected closes.

mod accumulator;
pub mod callbacks;
mod driver;
pub mod error;
mod pumps;
mod queue;
pub mod reconnection;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use accumulator::StreamAccumulator;
pub use callbacks::SessionCallbacks;
pub use error::SessionError;
pub use queue::OutboundQueue;
pub use reconnection::ReconnectPolicy;
pub use session::ConnectionSession;
pub use transport::{CloseInfo, Connector, TungsteniteConnector, WsSink, WsStream};
pub use types::{
    ConfigUpdate, ConnectionState, InvalidTransition, ReconnectConfig, SessionConfig,
    SessionSnapshot,
};

pub use chatlink_protocol as protocol;
