//! Communication channels (WhatsApp Cloud API).
//!
//! Wire types for the webhook payload, the platform-neutral inbound message handed to the
//! pipeline, and the outbound handle the dispatcher sends replies through.

mod handle;
mod inbound;
mod whatsapp;

pub use handle::{ChannelHandle, SendError};
pub use inbound::{InboundMessage, MessageKind};
pub use whatsapp::{
    PhoneNumberInfo, WhatsAppChannel, WhatsAppChange, WhatsAppEntry, WhatsAppMessage,
    WhatsAppText, WhatsAppValue, WhatsAppWebhook, WHATSAPP_BUSINESS_ACCOUNT,
};
