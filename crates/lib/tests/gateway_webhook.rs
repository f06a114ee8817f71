//! Integration test: start the gateway on a free port against an in-process mock of the Graph API
//! and the directory, then drive it over HTTP the way the platform does.
//! The server tasks are left running when each test ends.

use axum::{extract::State, routing::post, Json, Router};
use jawhar::config::Config;
use jawhar::gateway;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const REGISTERED_PHONE: &str = "96800000002";

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// What the mock upstreams received.
#[derive(Clone, Default)]
struct Upstream {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    directory: Arc<Mutex<Vec<Value>>>,
}

impl Upstream {
    async fn sent_bodies(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|(_, b)| b.clone()).collect()
    }

    async fn directory_actions(&self, action: &str) -> Vec<Value> {
        self.directory
            .lock()
            .await
            .iter()
            .filter(|v| v["action"] == action)
            .cloned()
            .collect()
    }
}

async fn mock_send(State(up): State<Upstream>, Json(req): Json<Value>) -> Json<Value> {
    let to = req["to"].as_str().unwrap_or_default().to_string();
    let body = req["text"]["body"].as_str().unwrap_or_default().to_string();
    let mut sent = up.sent.lock().await;
    sent.push((to, body));
    Json(json!({ "messaging_product": "whatsapp", "messages": [{ "id": format!("wamid.out.{}", sent.len()) }] }))
}

async fn mock_directory(State(up): State<Upstream>, Json(req): Json<Value>) -> Json<Value> {
    up.directory.lock().await.push(req.clone());
    match req["action"].as_str() {
        Some("find") if req["phone"] == REGISTERED_PHONE => {
            Json(json!({ "status": "success", "user_found": true, "name": "Bob" }))
        }
        Some("find") => Json(json!({ "status": "success", "user_found": false })),
        Some("register") => Json(json!({ "status": "success" })),
        _ => Json(json!({ "status": "error", "message": "unsupported" })),
    }
}

async fn start_upstream() -> (String, Upstream) {
    let upstream = Upstream::default();
    let app = Router::new()
        .route("/v18.0/PHONE/messages", post(mock_send))
        .route("/directory", post(mock_directory))
        .with_state(upstream.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), upstream)
}

/// Start upstream mocks and the gateway; returns the gateway base URL once it answers GET /.
async fn start() -> (String, Upstream) {
    let (upstream_url, upstream) = start_upstream().await;
    let port = free_port();

    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    config.whatsapp.api_token = Some("test-token".to_string());
    config.whatsapp.phone_number_id = Some("PHONE".to_string());
    config.whatsapp.api_base = format!("{}/v18.0", upstream_url);
    config.whatsapp.verify_token = Some("verify-me".to_string());
    config.directory.url = Some(format!("{}/directory", upstream_url));
    config.pipeline.pacing_millis = 10;

    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(format!("{}/", base)).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: Value = resp.json().await.expect("parse JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));
                return (base, upstream);
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway on {} did not come up within 5s; last error: {:?}", base, last_err);
}

fn delivery(id: &str, from: &str, body: &str) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{ "changes": [{ "value": { "messages": [{
            "id": id,
            "from": from,
            "timestamp": chrono::Utc::now().timestamp().to_string(),
            "type": "text",
            "text": { "body": body }
        }] } }] }]
    })
}

async fn post_delivery(base: &str, payload: &Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/webhook", base))
        .json(payload)
        .send()
        .await
        .expect("post webhook");
    assert_eq!(resp.status(), 200);
    let ack: Value = resp.json().await.expect("ack JSON");
    assert_eq!(ack, json!({ "status": "ok" }));
}

/// Poll until the mock has seen at least `n` sends (or give up after 5s).
async fn wait_for_sends(upstream: &Upstream, n: usize) -> Vec<String> {
    for _ in 0..100 {
        let sent = upstream.sent_bodies().await;
        if sent.len() >= n {
            return sent;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {} sends, saw {:?}", n, upstream.sent_bodies().await);
}

#[tokio::test]
async fn subscription_handshake() {
    let (base, _upstream) = start().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!(
            "{}/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444",
            base
        ))
        .send()
        .await
        .expect("verify request");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.expect("body"), "1158201444");

    let resp = client
        .get(format!(
            "{}/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1",
            base
        ))
        .send()
        .await
        .expect("verify request");
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn onboarding_registration_and_redelivery() {
    let (base, upstream) = start().await;
    let phone = "96800000001";

    post_delivery(&base, &delivery("wamid.hello", phone, "Hello")).await;
    let sent = wait_for_sends(&upstream, 5).await;
    assert_eq!(sent.len(), 5);
    assert_eq!(sent[0], "👋 Hello and welcome!");
    assert_eq!(sent[4], "To get registered reply with your name.");

    let name = delivery("wamid.name", phone, "Alice");
    post_delivery(&base, &name).await;
    let sent = wait_for_sends(&upstream, 6).await;
    assert!(sent[5].contains("Alice"), "confirmation was {:?}", sent[5]);

    post_delivery(&base, &name).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(upstream.sent_bodies().await.len(), 6);

    let registers = upstream.directory_actions("register").await;
    assert_eq!(registers.len(), 1);
    assert_eq!(registers[0]["phone"], phone);
    assert_eq!(registers[0]["name"], "Alice");

    let recipients: Vec<String> = upstream.sent.lock().await.iter().map(|(to, _)| to.clone()).collect();
    assert!(recipients.iter().all(|to| to == phone));
}

#[tokio::test]
async fn registered_user_is_welcomed_back() {
    let (base, upstream) = start().await;
    post_delivery(&base, &delivery("wamid.bob", REGISTERED_PHONE, "hi")).await;
    let sent = wait_for_sends(&upstream, 1).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Bob"));
    assert!(upstream.directory_actions("register").await.is_empty());
}

#[tokio::test]
async fn malformed_and_stale_deliveries_are_acknowledged_without_reply() {
    let (base, upstream) = start().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/webhook", base))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .expect("post webhook");
    assert_eq!(resp.status(), 200);

    let mut stale = delivery("wamid.stale", "96800000003", "hello");
    let old = (chrono::Utc::now().timestamp() - 3600).to_string();
    stale["entry"][0]["changes"][0]["value"]["messages"][0]["timestamp"] = json!(old);
    post_delivery(&base, &stale).await;

    post_delivery(&base, &delivery("wamid.chat", "96800000003", "what time is it")).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(upstream.sent_bodies().await.is_empty());
    assert!(upstream.directory.lock().await.is_empty());
}
