//! Turns accumulated reply events into terminal output.

use chatlink_protocol::{EventType, ResponseEvent};

/// Something to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Reply text for stdout, printed as-is.
    Reply(String),
    /// A status line for stderr.
    Status(String),
}

/// Prints streamed replies incrementally.
///
/// Chunk events carry the whole reply so far; only the part not yet on
/// screen is emitted.
#[derive(Debug, Default)]
pub struct ReplyRenderer {
    printed: String,
}

impl ReplyRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &ResponseEvent) -> Vec<Output> {
        match &event.kind {
            EventType::Start => {
                self.printed.clear();
                Vec::new()
            }
            EventType::Chunk => self.extend_to(&event.content).into_iter().collect(),
            EventType::Complete => {
                let mut out: Vec<Output> = self.extend_to(&event.content).into_iter().collect();
                out.push(Output::Reply("\n".into()));
                self.printed.clear();
                out
            }
            EventType::Interrupted => {
                let mut out = Vec::new();
                if !self.printed.is_empty() {
                    out.push(Output::Reply("\n".into()));
                }
                let status = if event.content.is_empty() {
                    "interrupted".to_string()
                } else {
                    format!("interrupted: {}", event.content)
                };
                out.push(Output::Status(status));
                out
            }
            EventType::Other(kind) if !event.content.is_empty() => {
                vec![Output::Status(format!("{kind}: {}", event.content))]
            }
            EventType::Other(_) => Vec::new(),
        }
    }

    /// Emits whatever `full` adds to what is already printed.
    fn extend_to(&mut self, full: &str) -> Option<Output> {
        let suffix = match full.strip_prefix(self.printed.as_str()) {
            Some(rest) => rest.to_string(),
            // Not a continuation of what is on screen: start a new line.
            None if !self.printed.is_empty() => format!("\n{full}"),
            None => full.to_string(),
        };
        self.printed = full.to_string();
        (!suffix.is_empty()).then_some(Output::Reply(suffix))
    }
}
