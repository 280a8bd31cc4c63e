//! Request frames and response events exchanged over the chat socket.

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// Kind of request a client can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    /// A regular conversational turn.
    Chat,
    /// A research-mode turn (long running, may be interrupted and resumed).
    DeepResearch,
    /// Asks the backend to stop the in-flight generation.
    Cancel,
}

/// Tool the backend may use while answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Web,
}

/// A request frame sent from the client to the backend.
///
/// Cancel frames carry only `thread_id` and `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub thread_id: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RequestFrame {
    /// Creates a conversational turn.
    pub fn chat(thread_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::turn(thread_id, RequestKind::Chat, message)
    }

    /// Creates a research-mode turn.
    pub fn deep_research(thread_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::turn(thread_id, RequestKind::DeepResearch, message)
    }

    /// Creates a cancellation frame for a thread.
    pub fn cancel(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            kind: RequestKind::Cancel,
            contexts: None,
            tool: None,
            message: None,
        }
    }

    fn turn(thread_id: impl Into<String>, kind: RequestKind, message: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            kind,
            contexts: None,
            tool: None,
            message: Some(message.into()),
        }
    }

    /// Attaches named context categories. Duplicates are dropped, first
    /// occurrence wins. An empty set clears the field. Ignored on cancel frames.
    pub fn with_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.kind == RequestKind::Cancel {
            return self;
        }
        let mut unique: Vec<String> = Vec::new();
        for ctx in contexts {
            let ctx = ctx.into();
            if !unique.contains(&ctx) {
                unique.push(ctx);
            }
        }
        self.contexts = (!unique.is_empty()).then_some(unique);
        self
    }

    /// Selects a tool for the backend to use. Ignored on cancel frames.
    pub fn with_tool(mut self, tool: Tool) -> Self {
        if self.kind != RequestKind::Cancel {
            self.tool = Some(tool);
        }
        self
    }

    /// Returns `true` for cancellation frames.
    pub fn is_cancel(&self) -> bool {
        self.kind == RequestKind::Cancel
    }
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// Type tag of a response event.
///
/// Unknown tags are kept verbatim in [`EventType::Other`] so they can be
/// passed through to the caller untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Start,
    Chunk,
    Complete,
    Interrupted,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Chunk => "chunk",
            Self::Complete => "complete",
            Self::Interrupted => "interrupted",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "start" => Self::Start,
            "chunk" => Self::Chunk,
            "complete" => Self::Complete,
            "interrupted" => Self::Interrupted,
            _ => Self::Other(value),
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response event received from the backend.
///
/// For `chunk` events delivered to callers, `content` holds the full reply
/// text accumulated so far, not the wire delta. For `interrupted` events,
/// `content` is the backend status message and the partial reply is in
/// `accumulated_content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    /// Synthesized client-side on `interrupted`; never sent by the backend.
    #[serde(
        rename = "accumulatedContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub accumulated_content: Option<String>,
    /// Usage telemetry, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_tracking: Option<serde_json::Value>,
    /// Fields this client does not model, preserved for passthrough.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ResponseEvent {
    pub fn new(kind: EventType, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            thread_id: None,
            done: None,
            accumulated_content: None,
            token_tracking: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn start() -> Self {
        Self::new(EventType::Start, "")
    }

    pub fn chunk(content: impl Into<String>) -> Self {
        Self::new(EventType::Chunk, content)
    }

    pub fn complete(content: impl Into<String>) -> Self {
        Self::new(EventType::Complete, content)
    }

    pub fn interrupted(status: impl Into<String>) -> Self {
        Self::new(EventType::Interrupted, status)
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Returns `true` if this event ends a stream (`complete` or `interrupted`).
    pub fn ends_stream(&self) -> bool {
        matches!(self.kind, EventType::Complete | EventType::Interrupted)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
