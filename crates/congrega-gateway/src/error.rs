//! Error types for the congrega-gateway crate.

use thiserror::Error;

/// Alias for `Result<T, GatewayError>`.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors from the Chatwoot messaging gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The HTTP call failed (network, timeout, TLS).
    #[error("chatwoot request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Chatwoot answered with a non-success status.
    #[error("chatwoot returned {status} on {operation}: {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// A response was missing a field the gateway needs.
    #[error("unexpected chatwoot response on {operation}: {reason}")]
    UnexpectedResponse {
        operation: &'static str,
        reason: String,
    },
}
