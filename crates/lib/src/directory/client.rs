//! HTTP directory client: one endpoint, `action` selects the operation.

use super::{Directory, DirectoryReply};
use crate::config::{self, Config};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Why a directory call failed. Callers treat every variant (and any non-success reply) as failure.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory url not configured")]
    NotConfigured,
    #[error("directory request timed out")]
    Timeout,
    #[error("directory transport error: {0}")]
    Transport(String),
    #[error("directory returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed directory response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for DirectoryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DirectoryError::Timeout
        } else {
            DirectoryError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct DirectoryRequest<'a> {
    action: &'static str,
    phone: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    admin_secret: Option<&'a str>,
}

impl<'a> DirectoryRequest<'a> {
    fn new(action: &'static str, phone: &'a str) -> Self {
        Self {
            action,
            phone,
            name: None,
            points: None,
            admin_secret: None,
        }
    }
}

/// What to do with a 2xx body that is not JSON.
#[derive(Clone, Copy)]
enum NonJsonBody {
    /// Accept the raw text as a success reply (find, register).
    TextFallback,
    /// Treat as a malformed response (balance, points).
    Reject,
}

/// Client for the directory web app.
#[derive(Clone)]
pub struct DirectoryClient {
    url: Option<String>,
    client: reqwest::Client,
}

impl DirectoryClient {
    pub fn new(url: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("directory: http client builder failed ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self { url, client }
    }

    /// Build from config, resolving the endpoint from DIRECTORY_URL when set.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config::resolve_directory_url(config),
            Duration::from_secs(config.directory.timeout_secs),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    async fn call(
        &self,
        request: &DirectoryRequest<'_>,
        non_json: NonJsonBody,
    ) -> Result<DirectoryReply, DirectoryError> {
        let url = self.url.as_deref().ok_or(DirectoryError::NotConfigured)?;
        let res = self.client.post(url).json(request).send().await?;
        let status = res.status();
        let body = res.text().await?;
        log::debug!(
            "directory: {} response {}: {}",
            request.action,
            status,
            body
        );
        if !status.is_success() {
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        match serde_json::from_str::<DirectoryReply>(&body) {
            Ok(reply) => Ok(reply),
            Err(e) => match non_json {
                NonJsonBody::TextFallback => Ok(DirectoryReply::text_fallback(&body)),
                NonJsonBody::Reject => Err(DirectoryError::Malformed(e.to_string())),
            },
        }
    }
}

#[async_trait]
impl Directory for DirectoryClient {
    async fn find(&self, phone: &str) -> Result<DirectoryReply, DirectoryError> {
        let request = DirectoryRequest::new("find", phone);
        self.call(&request, NonJsonBody::TextFallback).await
    }

    async fn register(&self, phone: &str, name: &str) -> Result<DirectoryReply, DirectoryError> {
        let request = DirectoryRequest {
            name: Some(name),
            ..DirectoryRequest::new("register", phone)
        };
        self.call(&request, NonJsonBody::TextFallback).await
    }

    async fn check_balance(&self, phone: &str) -> Result<DirectoryReply, DirectoryError> {
        let request = DirectoryRequest::new("check_balance", phone);
        self.call(&request, NonJsonBody::Reject).await
    }

    async fn update_points(
        &self,
        phone: &str,
        delta: i64,
        admin_secret: &str,
    ) -> Result<DirectoryReply, DirectoryError> {
        let request = DirectoryRequest {
            points: Some(delta),
            admin_secret: Some(admin_secret),
            ..DirectoryRequest::new("update_points", phone)
        };
        self.call(&request, NonJsonBody::Reject).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Requests seen by the mock, and the canned (status, body) it answers with.
    #[derive(Clone)]
    struct Mock {
        seen: Arc<Mutex<Vec<serde_json::Value>>>,
        status: StatusCode,
        body: &'static str,
        delay: Duration,
    }

    async fn handle(State(mock): State<Mock>, Json(req): Json<serde_json::Value>) -> (StatusCode, &'static str) {
        mock.seen.lock().await.push(req);
        tokio::time::sleep(mock.delay).await;
        (mock.status, mock.body)
    }

    async fn spawn_mock(status: StatusCode, body: &'static str, delay: Duration) -> (String, Mock) {
        let mock = Mock {
            seen: Arc::new(Mutex::new(Vec::new())),
            status,
            body,
            delay,
        };
        let app = Router::new().route("/exec", post(handle)).with_state(mock.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{}/exec", addr), mock)
    }

    fn client(url: String) -> DirectoryClient {
        DirectoryClient::new(Some(url), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn find_parses_json_reply_and_sends_action() {
        let (url, mock) = spawn_mock(
            StatusCode::OK,
            r#"{"status":"success","user_found":true,"name":"Bob"}"#,
            Duration::ZERO,
        )
        .await;
        let reply = client(url).find("96890000001").await.unwrap();
        assert_eq!(reply, DirectoryReply::found("Bob"));
        let seen = mock.seen.lock().await;
        assert_eq!(
            seen[0],
            serde_json::json!({ "action": "find", "phone": "96890000001" })
        );
    }

    #[tokio::test]
    async fn register_accepts_plain_text_as_success() {
        let (url, mock) = spawn_mock(StatusCode::OK, "Registered OK\n", Duration::ZERO).await;
        let reply = client(url).register("968", "Alice").await.unwrap();
        assert!(reply.is_success());
        assert_eq!(reply.message.as_deref(), Some("Registered OK"));
        let seen = mock.seen.lock().await;
        assert_eq!(
            seen[0],
            serde_json::json!({ "action": "register", "phone": "968", "name": "Alice" })
        );
    }

    #[tokio::test]
    async fn balance_rejects_plain_text() {
        let (url, _mock) = spawn_mock(StatusCode::OK, "<html>oops</html>", Duration::ZERO).await;
        let err = client(url).check_balance("968").await.unwrap_err();
        assert!(matches!(err, DirectoryError::Malformed(_)));
    }

    #[tokio::test]
    async fn update_points_sends_delta_and_secret() {
        let (url, mock) = spawn_mock(StatusCode::OK, r#"{"status":"success"}"#, Duration::ZERO).await;
        let reply = client(url).update_points("968", 15, "adm").await.unwrap();
        assert!(reply.is_success());
        let seen = mock.seen.lock().await;
        assert_eq!(
            seen[0],
            serde_json::json!({
                "action": "update_points",
                "phone": "968",
                "points": 15,
                "admin_secret": "adm"
            })
        );
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (url, _mock) = spawn_mock(StatusCode::INTERNAL_SERVER_ERROR, "boom", Duration::ZERO).await;
        let err = client(url).find("968").await.unwrap_err();
        match err {
            DirectoryError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_directory_times_out() {
        let (url, _mock) = spawn_mock(StatusCode::OK, r#"{"status":"success"}"#, Duration::from_secs(2)).await;
        let client = DirectoryClient::new(Some(url), Duration::from_millis(100));
        let err = client.find("968").await.unwrap_err();
        assert!(matches!(err, DirectoryError::Timeout), "got {err:?}");
    }

    #[tokio::test]
    async fn unreachable_directory_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = client(format!("http://127.0.0.1:{}/exec", port))
            .find("968")
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_url_is_not_configured() {
        let client = DirectoryClient::new(None, Duration::from_secs(1));
        assert!(!client.is_configured());
        let err = client.find("968").await.unwrap_err();
        assert!(matches!(err, DirectoryError::NotConfigured));
    }
}
