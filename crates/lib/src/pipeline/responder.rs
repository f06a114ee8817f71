//! Reply generation: greeting keywords, the registration state machine, and media acknowledgments.

use crate::channels::{InboundMessage, MessageKind};
use crate::directory::Directory;
use crate::pipeline::state::ConversationStore;
use std::sync::Arc;

/// Greeting vocabulary, matched case-insensitively anywhere in the text.
pub const GREETING_KEYWORDS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "salam",
    "marhaba",
];

/// Sent in order, paced, to a sender the directory does not know.
pub const ONBOARDING_MESSAGES: &[&str] = &[
    "👋 Hello and welcome!",
    "I'm Jawhar, your friendly recycling assistant. ♻️",
    "Whether you are unsure about what to recycle, where to take items, or how to reduce waste I'm here to make it easy. 🌍✨",
    "I noticed you haven't registered yet - no worries! It's quick and easy.",
    "To get registered reply with your name.",
];

pub const REGISTRATION_FAILED: &str =
    "❌ Sorry, there was a problem registering you. Please try again later.";

pub const IMAGE_NOT_SUPPORTED: &str = "Image processing is not available.";

pub const DOCUMENT_NOT_SUPPORTED: &str = "Document processing is not available.";

pub fn welcome_back(name: &str) -> String {
    format!("👋 Hello {}! Welcome back. How can I help you today?", name)
}

pub fn registration_confirmed(name: &str) -> String {
    format!("✅ Thank you, {}! You have been registered successfully.", name)
}

/// Fixed acknowledgment for message types we do not process.
pub fn non_text_ack(kind: &MessageKind) -> String {
    match kind {
        MessageKind::Image => IMAGE_NOT_SUPPORTED.to_string(),
        MessageKind::Document => DOCUMENT_NOT_SUPPORTED.to_string(),
        other => format!("I received your {} message!", other.as_str()),
    }
}

/// Lowercase, punctuation folded to spaces, whitespace collapsed.
fn normalize(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when any greeting keyword appears in `text`. Substring match, so elongated or compound
/// greetings ("hii", "Assalamualaikum") count, and so do words that merely contain one ("this").
pub fn is_greeting(text: &str) -> bool {
    let normalized = normalize(text);
    GREETING_KEYWORDS.iter().any(|kw| normalized.contains(*kw))
}

/// What to send back for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Explicit no-op.
    None,
    Single(String),
    /// Ordered burst to the same recipient (onboarding).
    Sequence(Vec<String>),
}

impl Reply {
    pub fn is_none(&self) -> bool {
        matches!(self, Reply::None)
    }

    /// Message bodies in send order.
    pub fn bodies(&self) -> Vec<&str> {
        match self {
            Reply::None => Vec::new(),
            Reply::Single(body) => vec![body.as_str()],
            Reply::Sequence(bodies) => bodies.iter().map(String::as_str).collect(),
        }
    }
}

/// State change applied while deciding the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    EnteredAwaitingName,
    LeftAwaitingName { registered: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub reply: Reply,
    pub transition: Transition,
}

impl Decision {
    fn unchanged(reply: Reply) -> Self {
        Self {
            reply,
            transition: Transition::Unchanged,
        }
    }
}

/// Decides replies from message content, conversation state, and directory lookups.
pub struct Responder {
    directory: Arc<dyn Directory>,
    conversations: Arc<ConversationStore>,
}

impl Responder {
    pub fn new(directory: Arc<dyn Directory>, conversations: Arc<ConversationStore>) -> Self {
        Self {
            directory,
            conversations,
        }
    }

    pub async fn respond(&self, msg: &InboundMessage) -> Decision {
        match msg.kind {
            MessageKind::Text => {
                let text = msg.body.as_deref().unwrap_or_default();
                self.respond_text(&msg.sender, text).await
            }
            ref other => Decision::unchanged(Reply::Single(non_text_ack(other))),
        }
    }

    async fn respond_text(&self, sender: &str, text: &str) -> Decision {
        if self.conversations.take_awaiting_name(sender).await {
            return self.complete_registration(sender, text.trim()).await;
        }
        if is_greeting(text) {
            return self.greet(sender).await;
        }
        Decision::unchanged(Reply::None)
    }

    /// One-shot: the awaiting flag is already cleared, whatever the outcome.
    async fn complete_registration(&self, sender: &str, name: &str) -> Decision {
        let registered = if name.is_empty() {
            log::info!("pipeline: empty name from {}, registration abandoned", sender);
            false
        } else {
            match self.directory.register(sender, name).await {
                Ok(reply) if reply.is_success() => true,
                Ok(reply) => {
                    log::warn!(
                        "pipeline: directory refused registration for {}: {:?}",
                        sender,
                        reply.message
                    );
                    false
                }
                Err(e) => {
                    log::warn!("pipeline: directory register failed for {}: {}", sender, e);
                    false
                }
            }
        };
        let reply = if registered {
            Reply::Single(registration_confirmed(name))
        } else {
            Reply::Single(REGISTRATION_FAILED.to_string())
        };
        Decision {
            reply,
            transition: Transition::LeftAwaitingName { registered },
        }
    }

    async fn greet(&self, sender: &str) -> Decision {
        let found = match self.directory.find(sender).await {
            Ok(reply) if reply.is_success() && reply.user_found => Some(reply.name),
            Ok(_) => None,
            Err(e) => {
                log::warn!("pipeline: directory lookup failed for {}: {}", sender, e);
                None
            }
        };
        match found {
            Some(name) => {
                let name = name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "there".to_string());
                Decision::unchanged(Reply::Single(welcome_back(&name)))
            }
            None => {
                self.conversations.set_awaiting_name(sender).await;
                Decision {
                    reply: Reply::Sequence(
                        ONBOARDING_MESSAGES.iter().map(|m| m.to_string()).collect(),
                    ),
                    transition: Transition::EnteredAwaitingName,
                }
            }
        }
    }
}
