//! External user directory (phone-indexed identity and points balance).
//!
//! The pipeline only talks to the [`Directory`] trait; [`DirectoryClient`] is the HTTP
//! implementation that POSTs `{action, phone, ...}` to a single endpoint.

mod client;

pub use client::{DirectoryClient, DirectoryError};

use async_trait::async_trait;
use serde::Deserialize;

/// `status` field of a directory reply. Anything other than `success` counts as failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Uniform reply shape for every directory action: `{status, ...payload}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DirectoryReply {
    #[serde(default)]
    pub status: ReplyStatus,
    #[serde(default)]
    pub user_found: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub points: Option<serde_json::Value>,
    /// Free-form message; also carries the raw body when the directory answered with plain text.
    #[serde(default)]
    pub message: Option<String>,
}

impl DirectoryReply {
    pub fn success() -> Self {
        Self {
            status: ReplyStatus::Success,
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Successful `find` for a registered user.
    pub fn found(name: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Success,
            user_found: true,
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Successful `find` for an unknown phone.
    pub fn not_found() -> Self {
        Self::success()
    }

    /// Plain-text body from a 2xx response, accepted as success.
    pub fn text_fallback(body: &str) -> Self {
        Self {
            status: ReplyStatus::Success,
            message: Some(body.trim().to_string()),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }

    /// Points balance; the directory may send it as a number or a numeric string.
    pub fn points(&self) -> Option<f64> {
        match self.points.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Operations the pipeline and CLI need from the directory.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Look a user up by phone; `user_found` and `name` are set when registered.
    async fn find(&self, phone: &str) -> Result<DirectoryReply, DirectoryError>;

    /// Register `phone` under `name`.
    async fn register(&self, phone: &str, name: &str) -> Result<DirectoryReply, DirectoryError>;

    /// Current points balance for `phone`.
    async fn check_balance(&self, phone: &str) -> Result<DirectoryReply, DirectoryError>;

    /// Add `delta` points to `phone` (admin only).
    async fn update_points(
        &self,
        phone: &str,
        delta: i64,
        admin_secret: &str,
    ) -> Result<DirectoryReply, DirectoryError>;
}
