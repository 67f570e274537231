//! Error types for the congrega-core crate.

use thiserror::Error;

/// Errors produced by core domain parsing and decoding.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A persisted flow context could not be decoded for the conversation's
    /// current state. Callers must treat this as corruption and reset the
    /// conversation rather than guess.
    #[error("malformed flow context for state `{state}`: {reason}")]
    MalformedContext { state: String, reason: String },

    /// A string did not parse as a known enum value (intent, role, state).
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
