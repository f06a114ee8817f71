//! Gateway: HTTP server for the WhatsApp webhook.
//!
//! `GET /webhook` answers the subscription handshake, `POST /webhook` queues every message in the
//! delivery for the pipeline and always acknowledges with `{"status":"ok"}`.

mod protocol;
mod server;
mod signature;

pub use protocol::{verify_subscription, VerifyParams, WebhookAck};
pub use server::{run_gateway, serve, GatewayState};
pub use signature::{verify_signature, SIGNATURE_HEADER};
