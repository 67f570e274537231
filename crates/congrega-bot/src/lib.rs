//! # congrega-bot
//!
//! The orchestrator: webhook server, per-conversation intent router, and
//! the domain handlers (attendance, programs, users, notifications) that
//! turn classified intents into store mutations and replies.
//!
//! The binary (`congrega serve`) wires this crate to the real Chatwoot
//! gateway; the integration tests wire it to an in-memory sink and an
//! in-memory database, exercising the same pipeline end to end.

pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod messages;
pub mod router;
pub mod server;

// ── re-exports ───────────────────────────────────────────────────────

pub use config::BotConfig;
pub use error::{BotError, BotResult};
pub use events::{AttendanceEvent, EventBus};
pub use handlers::BotContext;
pub use router::IntentRouter;
