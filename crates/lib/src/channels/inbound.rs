//! Inbound message from a channel: delivered to the pipeline for dedup, state, and reply handling.

/// Message type as reported by the platform. Anything we do not handle keeps its wire name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    Document,
    Other(String),
}

impl MessageKind {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "text" => MessageKind::Text,
            "image" => MessageKind::Image,
            "document" => MessageKind::Document,
            other => MessageKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Document => "document",
            MessageKind::Other(s) => s,
        }
    }
}

/// A single delivered chat event. `body` is present only for text messages.
///
/// `timestamp` is the raw platform value (unix seconds, usually as a string); it is parsed by the
/// staleness filter so that a malformed value can be logged and let through rather than rejected here.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: String,
    pub sender: String,
    pub kind: MessageKind,
    pub timestamp: String,
    pub body: Option<String>,
}

impl InboundMessage {
    pub fn text(
        id: impl Into<String>,
        sender: impl Into<String>,
        timestamp: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            kind: MessageKind::Text,
            timestamp: timestamp.into(),
            body: Some(body.into()),
        }
    }

    /// Non-text message (image, document, audio, ...).
    pub fn non_text(
        id: impl Into<String>,
        sender: impl Into<String>,
        timestamp: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            kind,
            timestamp: timestamp.into(),
            body: None,
        }
    }
}
