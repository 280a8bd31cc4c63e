//! Wire protocol for the streaming chat socket.
//!
//! Frames are JSON text over a full-duplex WebSocket: [`RequestFrame`]s go
//! out, [`ResponseEvent`]s come back.

pub mod codec;
pub mod constants;
pub mod endpoint;
pub mod frames;

// Re-export primary types for convenience.
pub use codec::{CodecError, FrameCodec};
pub use endpoint::{EndpointError, resolve_endpoint, validate_endpoint};
pub use frames::{EventType, RequestFrame, RequestKind, ResponseEvent, Tool};
