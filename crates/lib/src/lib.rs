//! Jawhar core library: WhatsApp webhook gateway, inbound message pipeline, and directory client
//! used by the CLI.

pub mod channels;
pub mod config;
pub mod directory;
pub mod gateway;
pub mod pipeline;
