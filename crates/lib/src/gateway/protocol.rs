//! Webhook wire types: subscription handshake query and delivery acknowledgment.

use serde::{Deserialize, Serialize};

/// Query of `GET /webhook` during subscription.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Body of every `POST /webhook` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
}

impl WebhookAck {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Check a subscription request. Returns the challenge to echo back, or the reason for refusing.
pub fn verify_subscription(
    expected_token: Option<&str>,
    params: &VerifyParams,
) -> Result<String, &'static str> {
    let expected = expected_token.ok_or("verify_token_not_configured")?;
    if params.mode.as_deref() != Some("subscribe") {
        return Err("invalid_mode");
    }
    let provided = params.verify_token.as_deref().ok_or("missing_token")?;
    if provided != expected {
        return Err("token_mismatch");
    }
    params.challenge.clone().ok_or("missing_challenge")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: &str, token: &str, challenge: &str) -> VerifyParams {
        VerifyParams {
            mode: Some(mode.to_string()),
            verify_token: Some(token.to_string()),
            challenge: Some(challenge.to_string()),
        }
    }

    #[test]
    fn matching_subscribe_returns_challenge() {
        let p = params("subscribe", "secret", "1158201444");
        assert_eq!(verify_subscription(Some("secret"), &p), Ok("1158201444".to_string()));
    }

    #[test]
    fn wrong_token_or_mode_is_refused() {
        assert_eq!(
            verify_subscription(Some("secret"), &params("subscribe", "guess", "c")),
            Err("token_mismatch")
        );
        assert_eq!(
            verify_subscription(Some("secret"), &params("unsubscribe", "secret", "c")),
            Err("invalid_mode")
        );
        assert_eq!(
            verify_subscription(None, &params("subscribe", "secret", "c")),
            Err("verify_token_not_configured")
        );
        assert_eq!(
            verify_subscription(Some("secret"), &VerifyParams::default()),
            Err("invalid_mode")
        );
    }

    #[test]
    fn query_keys_use_hub_prefix() {
        let p: VerifyParams = serde_json::from_value(serde_json::json!({
            "hub.mode": "subscribe",
            "hub.verify_token": "t",
            "hub.challenge": "42"
        }))
        .unwrap();
        assert_eq!(p.mode.as_deref(), Some("subscribe"));
        assert_eq!(p.verify_token.as_deref(), Some("t"));
        assert_eq!(p.challenge.as_deref(), Some("42"));
    }
}
