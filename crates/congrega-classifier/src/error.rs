//! Error types for the congrega-classifier crate.
//!
//! These never reach the router: [`crate::IntentClassifier::classify`]
//! converts every failure into a local-fallback classification. They exist
//! so the remote strategy can report *why* it fell back.

use thiserror::Error;

/// Alias for `Result<T, ClassifierError>`.
pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// Errors from the remote classification strategy.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The HTTP call itself failed (network, timeout, TLS).
    #[error("llm request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("llm endpoint returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body was not the strict JSON the prompt demands.
    #[error("malformed llm response: {0}")]
    MalformedResponse(String),
}
