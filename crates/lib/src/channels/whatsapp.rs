//! WhatsApp channel: webhook payload types and sending via the Cloud API messages endpoint.

use crate::channels::handle::{ChannelHandle, SendError};
use crate::channels::inbound::{InboundMessage, MessageKind};
use crate::config::{self, Config};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// `object` value of webhook deliveries we act on.
pub const WHATSAPP_BUSINESS_ACCOUNT: &str = "whatsapp_business_account";

/// Root webhook payload. Every field is optional on the wire. Absent, null or mistyped fields
/// decode to empty, and a malformed element of a list is dropped on its own, so one bad change
/// never hides the messages delivered next to it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppWebhook {
    #[serde(default, deserialize_with = "lenient")]
    pub object: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub entry: Vec<WhatsAppEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppEntry {
    #[serde(default, deserialize_with = "lenient_list")]
    pub changes: Vec<WhatsAppChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppChange {
    #[serde(default, deserialize_with = "lenient")]
    pub value: WhatsAppValue,
}

/// Change value; status callbacks arrive here too, without `messages`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppValue {
    #[serde(default, deserialize_with = "lenient_list")]
    pub messages: Vec<WhatsAppMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub from: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: String,
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    pub message_type: String,
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<WhatsAppText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppText {
    #[serde(default, deserialize_with = "lenient")]
    pub body: String,
}

/// Decode `T`, falling back to its default on null or a wrong type.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_else(|e| {
        log::debug!("whatsapp: ignoring malformed webhook field: {}", e);
        T::default()
    }))
}

/// Decode a list element by element, skipping the ones that do not fit. Non-lists decode as empty.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => return Ok(Vec::new()),
        other => {
            log::warn!("whatsapp: expected a list in webhook payload, got {}", other);
            return Ok(Vec::new());
        }
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                log::warn!("whatsapp: skipping malformed webhook element: {}", e);
                None
            }
        })
        .collect())
}

/// Platform timestamps are documented as strings but tolerate bare numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

impl WhatsAppWebhook {
    /// True when the delivery comes from a WhatsApp Business Account subscription.
    pub fn is_business_account(&self) -> bool {
        self.object == WHATSAPP_BUSINESS_ACCOUNT
    }

    /// All messages across every entry and change, in delivery order.
    pub fn messages(&self) -> impl Iterator<Item = &WhatsAppMessage> {
        self.entry
            .iter()
            .flat_map(|e| e.changes.iter())
            .flat_map(|c| c.value.messages.iter())
    }
}

impl WhatsAppMessage {
    /// Convert to the pipeline's inbound message. None when the message has no id or sender.
    pub fn to_inbound(&self) -> Option<InboundMessage> {
        if self.id.trim().is_empty() || self.from.trim().is_empty() {
            return None;
        }
        let kind = MessageKind::from_wire(&self.message_type);
        let body = match kind {
            MessageKind::Text => Some(
                self.text
                    .as_ref()
                    .map(|t| t.body.clone())
                    .unwrap_or_default(),
            ),
            _ => None,
        };
        Some(InboundMessage {
            id: self.id.clone(),
            sender: self.from.clone(),
            kind,
            timestamp: self.timestamp.clone(),
            body,
        })
    }
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'static str,
    text: SendTextBody<'a>,
}

#[derive(Debug, Serialize)]
struct SendTextBody<'a> {
    body: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SendTextResponse {
    #[serde(default)]
    messages: Vec<SentMessageId>,
}

#[derive(Debug, Default, Deserialize)]
struct SentMessageId {
    #[serde(default)]
    id: String,
}

/// Business phone number details from `GET /<phone_number_id>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhoneNumberInfo {
    #[serde(default)]
    pub display_phone_number: Option<String>,
    #[serde(default)]
    pub verified_name: Option<String>,
}

/// WhatsApp channel connector: sends text replies through the Graph API.
pub struct WhatsAppChannel {
    id: String,
    token: Option<String>,
    phone_number_id: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(
        token: Option<String>,
        phone_number_id: Option<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("whatsapp: http client builder failed ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self {
            id: "whatsapp".to_string(),
            token,
            phone_number_id,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Build from config, resolving credentials from env where set.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config::resolve_whatsapp_token(config),
            config::resolve_phone_number_id(config),
            config.whatsapp.api_base.clone(),
            Duration::from_secs(config.whatsapp.send_timeout_secs),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.phone_number_id.is_some()
    }

    fn credentials(&self) -> Result<(&str, &str), SendError> {
        match (self.token.as_deref(), self.phone_number_id.as_deref()) {
            (Some(token), Some(phone_id)) => Ok((token, phone_id)),
            _ => Err(SendError::NotConfigured),
        }
    }

    /// Send a text message via the messages endpoint. Returns the platform message id.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<String, SendError> {
        let (token, phone_id) = self.credentials()?;
        let url = format!("{}/{}/messages", self.api_base, phone_id);
        let request = SendTextRequest {
            messaging_product: "whatsapp",
            to,
            message_type: "text",
            text: SendTextBody { body },
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        let parsed: SendTextResponse = serde_json::from_str(&text).unwrap_or_else(|e| {
            log::debug!("whatsapp: send response was not the expected JSON: {}", e);
            SendTextResponse::default()
        });
        Ok(parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .unwrap_or_default())
    }

    /// Fetch the business phone number details; used to check that credentials work.
    pub async fn phone_number_info(&self) -> Result<PhoneNumberInfo, SendError> {
        let (token, phone_id) = self.credentials()?;
        let url = format!("{}/{}", self.api_base, phone_id);
        let res = self.client.get(&url).bearer_auth(token).send().await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| SendError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ChannelHandle for WhatsAppChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_message(&self, to: &str, text: &str) -> Result<String, SendError> {
        self.send_text(to, text).await
    }
}
