//! Webhook server.
//!
//! One rule: acknowledge first, work later. Chatwoot does not retry
//! webhook deliveries, so the handler normalizes the payload, answers 200
//! immediately, and runs the classify/dispatch pipeline as a detached
//! task. A second message from the same phone can therefore start
//! processing before the first finishes; see the router and store docs
//! for how that race is absorbed.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde_json::Value;
use tracing::{debug, info};

use congrega_gateway::{WebhookDisposition, normalize_webhook};

use crate::router::IntentRouter;

/// Build the Axum router with all routes registered.
pub fn app(router: Arc<IntentRouter>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/chatwoot", post(chatwoot_webhook))
        .with_state(router)
}

/// Bind and serve until shutdown.
pub async fn serve(router: Arc<IntentRouter>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "webhook server listening");
    axum::serve(listener, app(router)).await?;
    Ok(())
}

/// Liveness probe.
async fn health() -> &'static str {
    "ok"
}

/// Chatwoot webhook endpoint: filter, ack, detach.
async fn chatwoot_webhook(
    State(router): State<Arc<IntentRouter>>,
    axum::Json(payload): axum::Json<Value>,
) -> StatusCode {
    match normalize_webhook(&payload) {
        WebhookDisposition::Ignore(reason) => {
            debug!(reason, "webhook delivery dropped");
            StatusCode::OK
        }
        WebhookDisposition::Process(msg) => {
            debug!(
                conversation = msg.conversation_id,
                chars = msg.content.chars().count(),
                "webhook accepted"
            );
            tokio::spawn(async move {
                router.on_message(msg).await;
            });
            StatusCode::OK
        }
    }
}
