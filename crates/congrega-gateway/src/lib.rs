//! # congrega-gateway
//!
//! The messaging edge of the Congrega bot.
//!
//! - **[`sink`]** -- the [`MessageSink`] trait handlers send through,
//!   mockable in tests.
//! - **[`chatwoot`]** -- the real implementation: Chatwoot API client with
//!   synthetic typing delays, batch pacing, and find-or-create
//!   contact/conversation resolution for proactive sends.
//! - **[`webhook`]** -- inbound payload normalization and filtering
//!   (non-message events, outgoing echoes, private notes).

pub mod chatwoot;
pub mod error;
pub mod sink;
pub mod webhook;

// ── re-exports ───────────────────────────────────────────────────────

pub use chatwoot::{ChatwootConfig, ChatwootGateway, Contact, typing_delay};
pub use error::{GatewayError, GatewayResult};
pub use sink::MessageSink;
pub use webhook::{InboundMessage, WebhookDisposition, normalize_webhook};
