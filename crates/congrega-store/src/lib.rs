//! # congrega-store
//!
//! SQLite-backed persistence for the Congrega bot.
//!
//! All access goes through [`Database`], which wraps `rusqlite` behind
//! `tokio::task::spawn_blocking` (WAL journal, versioned migrations). On
//! top of it sit four stores:
//!
//! - [`ConversationStore`] -- per-phone conversation state, upserted on
//!   every inbound message.
//! - [`AttendanceStore`] -- QR/attendance-type lookups (moka hot cache) and
//!   attendance records guarded by partial unique indexes.
//! - [`UserStore`] -- member accounts with phone-suffix and fuzzy-name
//!   resolution.
//! - [`ProgramStore`] -- weekly programs with JSON part lists.
//!
//! Duplicate-registration races are not prevented up front; the unique
//! indexes catch them and [`StoreError::DuplicateRecord`] carries the
//! outcome to the handlers.

pub mod attendance;
pub mod conversation;
pub mod db;
pub mod error;
pub mod migration;
pub mod programs;
pub mod users;

// ── re-exports ───────────────────────────────────────────────────────

pub use attendance::{
    AttendanceQr, AttendanceRecord, AttendanceStore, NewAttendanceRecord, RecordIdentity,
    RecordStatus, RegistrationMethod, current_week_start, week_start,
};
pub use conversation::{Conversation, ConversationPatch, ConversationStore, normalize_phone};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use programs::{Program, ProgramStore};
pub use users::{PHONE_SUFFIX_LEN, User, UserStore};
