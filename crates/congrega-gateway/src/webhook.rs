//! Webhook payload normalization.
//!
//! Providers disagree on payload shapes; the boundary normalizes them into
//! one [`InboundMessage`] and filters out everything that must not enter
//! the pipeline: non-message events, outgoing messages (our own replies
//! echo back through the webhook), and private agent notes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A normalized inbound chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Provider conversation id, used for replies.
    pub conversation_id: i64,
    /// Sender phone in provider format (normalized later by the store).
    pub phone: String,
    /// Sender display name, when the provider carries one.
    pub sender_name: Option<String>,
    /// Raw message text.
    pub content: String,
}

/// Outcome of normalizing one webhook delivery.
#[derive(Debug)]
pub enum WebhookDisposition {
    /// Feed this message to the intent pipeline.
    Process(InboundMessage),
    /// Acknowledge and drop, with the reason for the logs.
    Ignore(&'static str),
}

/// Normalize a Chatwoot `message_created` webhook payload.
pub fn normalize_webhook(payload: &Value) -> WebhookDisposition {
    let event = payload.get("event").and_then(Value::as_str);
    if event != Some("message_created") {
        return WebhookDisposition::Ignore("event is not message_created");
    }

    // Chatwoot sends message_type as "incoming"/"outgoing" on webhooks and
    // as 0/1 on some API objects; accept both encodings.
    let incoming = match payload.get("message_type") {
        Some(Value::String(s)) => s == "incoming",
        Some(Value::Number(n)) => n.as_i64() == Some(0),
        _ => false,
    };
    if !incoming {
        return WebhookDisposition::Ignore("message is not incoming");
    }

    if payload.get("private").and_then(Value::as_bool) == Some(true) {
        return WebhookDisposition::Ignore("private note");
    }

    let Some(content) = payload
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
    else {
        return WebhookDisposition::Ignore("empty content");
    };

    let Some(conversation_id) = payload.pointer("/conversation/id").and_then(Value::as_i64)
    else {
        return WebhookDisposition::Ignore("missing conversation id");
    };

    let Some(phone) = payload
        .pointer("/sender/phone_number")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
    else {
        return WebhookDisposition::Ignore("sender has no phone number");
    };

    let sender_name = payload
        .pointer("/sender/name")
        .and_then(Value::as_str)
        .map(str::to_string);

    WebhookDisposition::Process(InboundMessage {
        conversation_id,
        phone: phone.to_string(),
        sender_name,
        content: content.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
