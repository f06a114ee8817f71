//! Gateway HTTP server: health probe, webhook handshake, and webhook delivery.

use crate::channels::{ChannelHandle, InboundMessage, WhatsAppChannel, WhatsAppWebhook};
use crate::config::{self, Config};
use crate::directory::{Directory, DirectoryClient};
use crate::gateway::protocol::{verify_subscription, VerifyParams, WebhookAck};
use crate::gateway::signature::{verify_signature, SIGNATURE_HEADER};
use crate::pipeline::{Outcome, Pipeline};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Queue depth between the webhook handler and the processor task.
const INBOUND_QUEUE: usize = 256;

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Expected `hub.verify_token`; None refuses every handshake.
    pub verify_token: Option<String>,
    /// Secret for payload signatures; only consulted when `whatsapp.verifySignatures` is on.
    pub app_secret: Option<String>,
    /// Sender for parsed inbound messages. Processor task receives.
    pub inbound_tx: mpsc::Sender<InboundMessage>,
}

/// Run one message through the pipeline and log how it ended.
async fn process_inbound_message(pipeline: Arc<Pipeline>, msg: InboundMessage) {
    match pipeline.process(&msg).await {
        Outcome::Replied { transition, dispatched } => {
            let report = dispatched.settle().await;
            log::debug!(
                "webhook: message {} handled ({:?}), {} sent, {} failed",
                msg.id,
                transition,
                report.sent,
                report.failed
            );
        }
        other => log::debug!("webhook: message {} ended as {:?}", msg.id, other),
    }
}

/// Drain the inbound queue; each message is its own task so a slow directory call or a paced
/// sequence never holds up other senders. A task that panics is logged and forgotten.
async fn run_processor(pipeline: Arc<Pipeline>, mut inbound_rx: mpsc::Receiver<InboundMessage>) {
    while let Some(msg) = inbound_rx.recv().await {
        let id = msg.id.clone();
        let unit = tokio::spawn(process_inbound_message(pipeline.clone(), msg));
        tokio::spawn(async move {
            if let Err(e) = unit.await {
                log::error!("webhook: processing message {} aborted: {}", id, e);
            }
        });
    }
    log::info!("webhook: inbound queue closed, processor stopped");
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// When bind is not loopback, a webhook verify token must be configured or startup fails.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind = config.gateway.bind.trim().to_string();
    if !config::is_loopback_bind(&bind) && config::resolve_verify_token(&config).is_none() {
        anyhow::bail!(
            "refusing to bind gateway to {} without a webhook verify token (set whatsapp.verifyToken or WEBHOOK_VERIFY_TOKEN)",
            bind
        );
    }

    let channel = WhatsAppChannel::from_config(&config);
    if !channel.is_configured() {
        log::warn!("whatsapp credentials missing (WHATSAPP_API_TOKEN / WHATSAPP_PHONE_NUMBER_ID); replies will fail");
    }
    let directory = DirectoryClient::from_config(&config);
    if !directory.is_configured() {
        log::warn!("directory url missing (DIRECTORY_URL); greetings will be treated as unregistered");
    }

    let bind_addr = format!("{}:{}", bind, config.gateway.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);
    serve(config, listener, Arc::new(directory), Arc::new(channel)).await
}

/// Serve the gateway on an already-bound listener with the given directory and channel.
pub async fn serve(
    config: Config,
    listener: TcpListener,
    directory: Arc<dyn Directory>,
    channel: Arc<dyn ChannelHandle>,
) -> Result<()> {
    let pipeline = Arc::new(Pipeline::new(directory, channel, &config.pipeline));
    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(INBOUND_QUEUE);
    tokio::spawn(run_processor(pipeline, inbound_rx));

    if config.whatsapp.verify_signatures {
        log::info!("webhook payload signature verification enabled");
    }
    let state = GatewayState {
        verify_token: config::resolve_verify_token(&config),
        app_secret: config::resolve_app_secret(&config),
        config: Arc::new(config),
        inbound_tx,
    };

    let app = Router::new()
        .route("/", get(health_http))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .with_state(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}

/// GET /webhook: subscription handshake. Echo `hub.challenge` when mode and token match.
async fn verify_webhook(
    State(state): State<GatewayState>,
    Query(params): Query<VerifyParams>,
) -> (StatusCode, String) {
    match verify_subscription(state.verify_token.as_deref(), &params) {
        Ok(challenge) => {
            log::info!("webhook: subscription verified");
            (StatusCode::OK, challenge)
        }
        Err(reason) => {
            log::warn!("webhook: subscription verification failed: {}", reason);
            (StatusCode::FORBIDDEN, "Forbidden".to_string())
        }
    }
}

fn ack() -> Response {
    (StatusCode::OK, Json(WebhookAck::ok())).into_response()
}

/// Check the payload signature when enabled. A missing header is let through; a bad one is not.
fn check_signature(state: &GatewayState, headers: &HeaderMap, body: &[u8]) -> Result<(), &'static str> {
    if !state.config.whatsapp.verify_signatures {
        return Ok(());
    }
    let Some(secret) = state.app_secret.as_deref() else {
        log::warn!("webhook: no app secret configured, skipping signature verification");
        return Ok(());
    };
    match headers.get(SIGNATURE_HEADER) {
        Some(value) => {
            let signature = value.to_str().map_err(|_| "malformed_signature")?;
            verify_signature(secret, body, signature)
        }
        None => Ok(()),
    }
}

/// POST /webhook: parse the delivery, queue each message, always acknowledge.
async fn receive_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let delivery = uuid::Uuid::new_v4();
    if let Err(reason) = check_signature(&state, &headers, &body) {
        log::warn!("webhook: delivery {} rejected: {}", delivery, reason);
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    let webhook: WhatsAppWebhook = match serde_json::from_slice(&body) {
        Ok(w) => w,
        Err(e) => {
            log::warn!("webhook: delivery {} is not a valid payload: {}", delivery, e);
            return ack();
        }
    };
    log::debug!("webhook: delivery {}: {}", delivery, String::from_utf8_lossy(&body));
    if !webhook.is_business_account() {
        log::debug!("webhook: delivery {} ignored (object {:?})", delivery, webhook.object);
        return ack();
    }

    for message in webhook.messages() {
        let Some(inbound) = message.to_inbound() else {
            log::warn!("webhook: delivery {} has a message without id or sender, skipping", delivery);
            continue;
        };
        if state.inbound_tx.send(inbound).await.is_err() {
            log::error!("webhook: processor stopped, dropping delivery {}", delivery);
            break;
        }
    }
    ack()
}
