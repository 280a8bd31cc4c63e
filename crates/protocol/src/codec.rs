//! Text codec for request frames and response events.
//!
//! Decoding never panics: anything that is not a JSON object shaped like a
//! [`ResponseEvent`] comes back as [`CodecError`], and the caller decides
//! whether to report and drop it.

use crate::constants::WS_MAX_MESSAGE_SIZE;
use crate::frames::{RequestFrame, ResponseEvent};

/// Errors produced while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("frame too large ({len} bytes, max {max})")]
    Oversized { len: usize, max: usize },

    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Serializes outgoing frames and parses incoming ones.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(WS_MAX_MESSAGE_SIZE)
    }
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encodes a request frame as JSON text.
    pub fn encode(&self, frame: &RequestFrame) -> Result<String, CodecError> {
        serde_json::to_string(frame).map_err(CodecError::Encode)
    }

    /// Decodes JSON text into a response event.
    pub fn decode(&self, text: &str) -> Result<ResponseEvent, CodecError> {
        if text.len() > self.max_frame_size {
            return Err(CodecError::Oversized {
                len: text.len(),
                max: self.max_frame_size,
            });
        }
        serde_json::from_str(text).map_err(CodecError::Malformed)
    }
}
