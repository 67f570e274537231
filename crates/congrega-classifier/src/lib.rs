//! # congrega-classifier
//!
//! Turns free-form chat messages into [`IntentResult`]s through three
//! layers, cheapest first:
//!
//! 1. **Short-circuits** ([`patterns`]) -- deterministic regex checks for
//!    QR codes, program codes, and explicit registration phrasings. Free,
//!    unambiguous, and they keep the bot alive with no LLM configured.
//! 2. **Strategy** -- one [`Classify`] implementation chosen at
//!    construction: [`LlmClassifier`] when an API key is configured,
//!    [`LocalClassifier`] otherwise. Call sites never ask which one is
//!    active.
//! 3. **Fallback** -- a failed remote call silently degrades to the local
//!    cascade. [`IntentClassifier::classify`] therefore never fails.

pub mod error;
pub mod llm;
pub mod local;
pub mod patterns;

use async_trait::async_trait;
use tracing::{info, warn};

use congrega_core::IntentResult;

use crate::error::ClassifierResult;

pub use error::ClassifierError;
pub use llm::{LlmClassifier, LlmConfig};
pub use local::LocalClassifier;

/// A classification strategy.
#[async_trait]
pub trait Classify: Send + Sync {
    async fn classify(&self, message: &str) -> ClassifierResult<IntentResult>;
}

/// The full classification pipeline. See the crate docs for the layering.
pub struct IntentClassifier {
    primary: Box<dyn Classify>,
    fallback: LocalClassifier,
}

impl IntentClassifier {
    /// Select the strategy from configuration presence: with an
    /// [`LlmConfig`] the remote strategy runs first, otherwise the local
    /// cascade is the only strategy.
    pub fn from_config(config: Option<LlmConfig>) -> Self {
        let primary: Box<dyn Classify> = match config {
            Some(config) => {
                info!(model = %config.model, "intent classifier: llm strategy");
                Box::new(LlmClassifier::new(config))
            }
            None => {
                info!("intent classifier: local strategy (no llm configured)");
                Box::new(LocalClassifier::new())
            }
        };

        Self {
            primary,
            fallback: LocalClassifier::new(),
        }
    }

    /// Classify a message. Never fails: short-circuits first, then the
    /// configured strategy, then the local fallback on any strategy error.
    pub async fn classify(&self, message: &str) -> IntentResult {
        if let Some(hit) = patterns::short_circuit(message) {
            return hit;
        }

        match self.primary.classify(message).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "classification strategy failed, using local fallback");
                self.fallback.classify_local(message)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
