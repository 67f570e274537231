//! Error type for the orchestrator.
//!
//! Handler failures converge here and stop at the router: the webhook has
//! already been acknowledged, so nothing may escape the detached
//! message-processing task.

use thiserror::Error;

/// Alias for `Result<T, BotError>`.
pub type BotResult<T> = Result<T, BotError>;

/// Errors surfaced by the router and handlers.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Store(#[from] congrega_store::StoreError),

    #[error(transparent)]
    Gateway(#[from] congrega_gateway::GatewayError),

    #[error(transparent)]
    Core(#[from] congrega_core::CoreError),
}
