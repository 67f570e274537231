//! Chatwoot API client.
//!
//! Implements [`MessageSink`] with deliberate pacing: a synthetic typing
//! delay proportional to message length before every send, and a fixed
//! pause between the messages of a batch. The pacing doubles as
//! backpressure against the provider's rate limits.
//!
//! Non-critical calls (typing indicator, contact resolution during a
//! proactive send) degrade to no-op/`None` instead of failing the
//! operation that triggered them.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::sink::MessageSink;

/// Per-character typing simulation.
const TYPING_MS_PER_CHAR: u64 = 40;

/// Shortest simulated typing pause.
const TYPING_FLOOR: Duration = Duration::from_millis(800);

/// Longest simulated typing pause.
const TYPING_CEILING: Duration = Duration::from_millis(2500);

/// Pause between messages of one batch.
const BATCH_PAUSE: Duration = Duration::from_millis(500);

/// How long a message of `len` characters "takes to type".
pub fn typing_delay(len: usize) -> Duration {
    Duration::from_millis(len as u64 * TYPING_MS_PER_CHAR)
        .clamp(TYPING_FLOOR, TYPING_CEILING)
}

/// Connection settings for one Chatwoot account/inbox.
#[derive(Debug, Clone)]
pub struct ChatwootConfig {
    /// Base URL of the Chatwoot installation, without trailing slash.
    pub base_url: String,
    pub account_id: i64,
    /// Inbox used when opening conversations proactively.
    pub inbox_id: i64,
    pub api_token: String,
}

/// A contact resolved (or created) by phone number.
#[derive(Debug, Clone)]
pub struct Contact {
    pub id: i64,
    pub name: Option<String>,
}

/// Chatwoot messaging gateway.
pub struct ChatwootGateway {
    config: ChatwootConfig,
    http: reqwest::Client,
}

impl ChatwootGateway {
    pub fn new(config: ChatwootConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v1/accounts/{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.account_id,
            path
        )
    }

    /// POST a JSON body and return the parsed response.
    async fn post(
        &self,
        operation: &'static str,
        url: &str,
        body: &Value,
    ) -> GatewayResult<Value> {
        let response = self
            .http
            .post(url)
            .header("api_access_token", &self.config.api_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// GET and return the parsed response.
    async fn get(&self, operation: &'static str, url: &str) -> GatewayResult<Value> {
        let response = self
            .http
            .get(url)
            .header("api_access_token", &self.config.api_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    // ── contact / conversation resolution ────────────────────────────

    /// Find a contact by phone, creating one if absent.
    ///
    /// Degrades to `None` on provider failure: proactive sends are
    /// best-effort and must not abort the operation that triggered them.
    pub async fn find_or_create_contact(
        &self,
        phone: &str,
        name: Option<&str>,
    ) -> Option<Contact> {
        match self.try_find_or_create_contact(phone, name).await {
            Ok(contact) => Some(contact),
            Err(e) => {
                warn!(error = %e, phone = %phone, "contact resolution failed");
                None
            }
        }
    }

    async fn try_find_or_create_contact(
        &self,
        phone: &str,
        name: Option<&str>,
    ) -> GatewayResult<Contact> {
        let url = self.api_url(&format!("/contacts/search?q={phone}"));
        let found = self.get("contact_search", &url).await?;

        if let Some(first) = found
            .pointer("/payload/0")
            .filter(|c| !c.is_null())
        {
            let id = first.get("id").and_then(Value::as_i64).ok_or_else(|| {
                GatewayError::UnexpectedResponse {
                    operation: "contact_search",
                    reason: "contact without id".into(),
                }
            })?;
            return Ok(Contact {
                id,
                name: first
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }

        let url = self.api_url("/contacts");
        let body = json!({
            "name": name.unwrap_or(phone),
            "phone_number": format!("+{}", phone.trim_start_matches('+')),
        });
        let created = self.post("contact_create", &url, &body).await?;

        let id = created
            .pointer("/payload/contact/id")
            .or_else(|| created.pointer("/id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| GatewayError::UnexpectedResponse {
                operation: "contact_create",
                reason: "created contact without id".into(),
            })?;

        debug!(contact_id = id, "contact created");
        Ok(Contact {
            id,
            name: name.map(str::to_string),
        })
    }

    /// Find the contact's open conversation in the configured inbox,
    /// creating one if absent. Used for proactive sends.
    pub async fn find_or_create_conversation(&self, contact: &Contact) -> GatewayResult<i64> {
        let url = self.api_url(&format!("/contacts/{}/conversations", contact.id));
        let found = self.get("conversation_list", &url).await?;

        if let Some(conversations) = found.pointer("/payload").and_then(Value::as_array) {
            let open = conversations.iter().find(|c| {
                c.get("status").and_then(Value::as_str) == Some("open")
                    && c.pointer("/inbox_id").and_then(Value::as_i64)
                        == Some(self.config.inbox_id)
            });
            if let Some(id) = open.and_then(|c| c.get("id")).and_then(Value::as_i64) {
                return Ok(id);
            }
        }

        let url = self.api_url("/conversations");
        let body = json!({
            "contact_id": contact.id,
            "inbox_id": self.config.inbox_id,
        });
        let created = self.post("conversation_create", &url, &body).await?;

        created
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| GatewayError::UnexpectedResponse {
                operation: "conversation_create",
                reason: "created conversation without id".into(),
            })
    }
}

#[async_trait]
impl MessageSink for ChatwootGateway {
    /// Deliver one message after simulating typing for it.
    async fn send_message(&self, conversation_id: i64, content: &str) -> GatewayResult<()> {
        // Best-effort indicator on, proportional pause, indicator off.
        let _ = self.toggle_typing(conversation_id, true).await;
        tokio::time::sleep(typing_delay(content.chars().count())).await;
        let _ = self.toggle_typing(conversation_id, false).await;

        let url = self.api_url(&format!("/conversations/{conversation_id}/messages"));
        let body = json!({
            "content": content,
            "message_type": "outgoing",
        });
        self.post("message_create", &url, &body).await?;

        debug!(conversation_id, chars = content.chars().count(), "message sent");
        Ok(())
    }

    /// Deliver a batch sequentially with a fixed pause between messages.
    async fn send_messages(&self, conversation_id: i64, contents: &[String]) -> GatewayResult<()> {
        for (i, content) in contents.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(BATCH_PAUSE).await;
            }
            self.send_message(conversation_id, content).await?;
        }
        Ok(())
    }

    /// Toggle the typing indicator; failures degrade to a logged no-op.
    async fn toggle_typing(&self, conversation_id: i64, on: bool) -> GatewayResult<()> {
        let url = self.api_url(&format!(
            "/conversations/{conversation_id}/toggle_typing_status"
        ));
        let body = json!({"typing_status": if on { "on" } else { "off" }});

        if let Err(e) = self.post("toggle_typing", &url, &body).await {
            warn!(error = %e, conversation_id, "typing toggle failed (ignored)");
        }
        Ok(())
    }

    /// Resolve a phone to an open conversation in the configured inbox.
    /// Contact-resolution failures degrade to `None`.
    async fn resolve_conversation(
        &self,
        phone: &str,
        name: Option<&str>,
    ) -> GatewayResult<Option<i64>> {
        let Some(contact) = self.find_or_create_contact(phone, name).await else {
            return Ok(None);
        };
        let conversation_id = self.find_or_create_conversation(&contact).await?;
        Ok(Some(conversation_id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
