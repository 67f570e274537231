//! # congrega-core
//!
//! Shared domain types for the Congrega chat bot:
//!
//! - **[`intent`]** -- The closed set of bot intents, caller roles, and the
//!   [`IntentResult`] produced by classification.
//! - **[`fields`]** -- Data-driven form-field schema ([`FieldDef`]) with
//!   per-kind answer validation and question rendering.
//! - **[`flow`]** -- Conversation states and the typed flow-context payloads
//!   persisted between messages of a multi-turn form.
//! - **[`codes`]** -- QR and program code formats with extraction helpers.
//! - **[`program_text`]** -- The canonical multi-line "pasted program"
//!   detector and parser, shared by every classification path.
//!
//! Everything here is plain data plus pure functions; persistence and I/O
//! live in the sibling crates.

pub mod codes;
pub mod error;
pub mod fields;
pub mod flow;
pub mod intent;
pub mod program_text;

// ── re-exports ───────────────────────────────────────────────────────

pub use error::CoreError;
pub use fields::{FieldDef, FieldError, FieldKind, FieldOption, FieldValue};
pub use flow::{AttendanceFlowState, ConversationState, FlowContext, ManualTarget};
pub use intent::{Intent, IntentResult, Role};
