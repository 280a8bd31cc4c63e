//! Frames waiting for an open socket.

use std::collections::VecDeque;

use chatlink_protocol::RequestFrame;

/// FIFO buffer of outbound frames submitted while no socket was open.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    frames: VecDeque<RequestFrame>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, frame: RequestFrame) {
        self.frames.push_back(frame);
    }

    /// Takes every queued frame in submission order, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<RequestFrame> {
        self.frames.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
