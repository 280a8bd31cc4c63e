//! Assembly of streamed reply text.
//!
//! The backend streams a reply as `start`, any number of `chunk` deltas,
//! then `complete` or `interrupted`. Callers get chunk events whose
//! `content` is the whole reply so far, so they can render it directly.

use chatlink_protocol::{EventType, ResponseEvent};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Streaming,
    /// `interrupted` seen; bare chunks may resume the stream.
    Paused,
}

/// Running buffer for the in-flight reply.
#[derive(Debug, Default, Clone)]
pub struct StreamAccumulator {
    buffer: String,
    phase: Phase,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one inbound event into the buffer and returns the event to
    /// forward to the caller.
    pub fn apply(&mut self, mut event: ResponseEvent) -> ResponseEvent {
        // Only ever set here, on `interrupted`.
        event.accumulated_content = None;
        match event.kind {
            EventType::Start => {
                if self.phase == Phase::Streaming {
                    warn!(
                        dropped = self.buffer.len(),
                        "start received before previous stream ended"
                    );
                }
                self.buffer.clear();
                self.phase = Phase::Streaming;
                event
            }
            EventType::Chunk => {
                if self.phase == Phase::Idle {
                    warn!(
                        residue = self.buffer.len(),
                        "chunk received outside a stream"
                    );
                }
                if self.phase == Phase::Paused {
                    debug!("stream resumed after interruption");
                }
                self.phase = Phase::Streaming;
                self.buffer.push_str(&event.content);
                ResponseEvent {
                    content: self.buffer.clone(),
                    ..event
                }
            }
            EventType::Interrupted => {
                self.phase = Phase::Paused;
                ResponseEvent {
                    accumulated_content: Some(self.buffer.clone()),
                    ..event
                }
            }
            EventType::Complete => {
                self.buffer.clear();
                self.phase = Phase::Idle;
                event
            }
            EventType::Other(_) => event,
        }
    }

    /// Reply text accumulated so far.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.phase = Phase::Idle;
    }
}
