//! The outbound messaging seam.
//!
//! Handlers talk to [`MessageSink`], never to Chatwoot directly, so the
//! whole pipeline runs against an in-memory sink in tests.

use async_trait::async_trait;

use crate::error::GatewayResult;

/// Outbound message delivery and conversation resolution for one provider.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one text message.
    async fn send_message(&self, conversation_id: i64, content: &str) -> GatewayResult<()>;

    /// Deliver several messages in order. Implementations may pace them.
    async fn send_messages(&self, conversation_id: i64, contents: &[String]) -> GatewayResult<()>;

    /// Toggle the typing indicator. Best-effort: implementations should
    /// degrade to a no-op on provider failure.
    async fn toggle_typing(&self, conversation_id: i64, on: bool) -> GatewayResult<()>;

    /// Resolve a phone number to an open conversation for a proactive send,
    /// creating contact and conversation as needed. `None` means the
    /// resolution degraded (provider failure) and the send should be
    /// skipped, not failed.
    async fn resolve_conversation(
        &self,
        phone: &str,
        name: Option<&str>,
    ) -> GatewayResult<Option<i64>>;
}
