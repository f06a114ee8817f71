//! Outbound side of a channel: what the dispatcher sends replies through.

use async_trait::async_trait;

/// Why an outbound send failed. Transport, timeout, and rejected responses are kept apart so
/// callers can log or react to each.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("channel credentials not configured")]
    NotConfigured,
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request rejected: {status} {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for SendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SendError::Timeout
        } else {
            SendError::Transport(e.to_string())
        }
    }
}

/// Handle to a channel that can deliver text to a recipient.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "whatsapp").
    fn id(&self) -> &str;

    /// Send one text message; returns the platform message id (empty when the platform omits it).
    async fn send_message(&self, to: &str, text: &str) -> Result<String, SendError>;
}
