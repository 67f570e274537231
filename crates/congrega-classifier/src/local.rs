//! Local fallback classifier.
//!
//! Used when no LLM is configured, or when the remote call fails. An
//! ordered keyword/regex cascade over the same taxonomy; first match wins,
//! and anything unmatched degrades to `desconocido` with low confidence.
//! The structured-text heuristic is the same canonical detector the
//! short-circuits use, so a message classifies identically with or without
//! an LLM in the loop.

use std::sync::LazyLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use congrega_core::{Intent, IntentResult, Role};

use crate::Classify;
use crate::error::ClassifierResult;
use crate::patterns;

/// Greeting keywords (scanned case-insensitively).
const GREETING_KEYWORDS: &[&str] = &[
    "hola",
    "buenos días",
    "buenos dias",
    "buenas tardes",
    "buenas noches",
    "saludos",
    "hey",
];

/// Help keywords.
const HELP_KEYWORDS: &[&str] = &[
    "ayuda",
    "ayúdame",
    "ayudame",
    "qué puedes hacer",
    "que puedes hacer",
    "opciones",
    "menú",
    "menu",
];

static GREETINGS: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .build(GREETING_KEYWORDS)
        .expect("valid keyword set")
});

static HELP: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .build(HELP_KEYWORDS)
        .expect("valid keyword set")
});

static CREATE_PROGRAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcrear\s+(?:un\s+)?(?:nuevo\s+)?programa\b").expect("valid regex")
});

static SEND_PROGRAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:enviar|envía|envia|mandar|manda)\s+(?:el\s+)?programa\b")
        .expect("valid regex")
});

/// "asignar <parte> a <usuario>".
static ASSIGN_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*asignar?\s+(?:la\s+|el\s+)?(?P<parte>.+?)\s+a\s+(?P<usuario>.+?)\s*$")
        .expect("valid regex")
});

static CREATE_USER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcrear\s+(?:un\s+)?(?:nuevo\s+)?usuario\b").expect("valid regex")
});

static VIEW_PROGRAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bver\s+(?:el\s+)?programa\b").expect("valid regex"));

/// The zero-dependency classification strategy.
#[derive(Debug, Default, Clone)]
pub struct LocalClassifier;

impl LocalClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Run the cascade. Infallible: always produces a result.
    pub fn classify_local(&self, message: &str) -> IntentResult {
        let result = self.cascade(message);
        debug!(intent = %result.intent, confidence = result.confidence, "local classification");
        result
    }

    fn cascade(&self, message: &str) -> IntentResult {
        if GREETINGS.is_match(message) {
            return IntentResult::new(Intent::Saludo, 0.9);
        }

        if HELP.is_match(message) {
            return IntentResult::new(Intent::Ayuda, 0.9);
        }

        if CREATE_PROGRAM.is_match(message) {
            return IntentResult::new(Intent::CrearPrograma, 0.85)
                .restricted_to(&[Role::Admin, Role::Lider]);
        }

        if SEND_PROGRAM.is_match(message) {
            return IntentResult::new(Intent::EnviarPrograma, 0.85)
                .restricted_to(&[Role::Admin, Role::Lider]);
        }

        if let Some(caps) = ASSIGN_PART.captures(message) {
            return IntentResult::new(Intent::AsignarParte, 0.8)
                .with_entity("parte", caps["parte"].trim())
                .with_entity("usuario", caps["usuario"].trim())
                .restricted_to(&[Role::Admin, Role::Lider]);
        }

        // The deterministic phrasings again (manual registration, bare
        // codes, pasted programs): callers may use this strategy directly,
        // without the short-circuit layer in front.
        if let Some(result) = patterns::short_circuit(message) {
            return result;
        }

        if CREATE_USER.is_match(message) {
            return IntentResult::new(Intent::CrearUsuario, 0.85).restricted_to(&[Role::Admin]);
        }

        if VIEW_PROGRAM.is_match(message) {
            return IntentResult::new(Intent::VerPrograma, 0.8).restricted_to(&[
                Role::Admin,
                Role::Lider,
                Role::Participante,
            ]);
        }

        IntentResult::unknown()
    }
}

#[async_trait]
impl Classify for LocalClassifier {
    async fn classify(&self, message: &str) -> ClassifierResult<IntentResult> {
        Ok(self.classify_local(message))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_and_help() {
        let local = LocalClassifier::new();
        assert_eq!(local.classify_local("Hola!").intent, Intent::Saludo);
        assert_eq!(
            local.classify_local("buenos días hermanos").intent,
            Intent::Saludo
        );
        assert_eq!(
            local.classify_local("necesito AYUDA por favor").intent,
            Intent::Ayuda
        );
    }

    #[test]
    fn program_commands() {
        let local = LocalClassifier::new();
        assert_eq!(
            local.classify_local("quiero crear un programa").intent,
            Intent::CrearPrograma
        );
        assert_eq!(
            local.classify_local("envía el programa al grupo").intent,
            Intent::EnviarPrograma
        );
        assert_eq!(
            local.classify_local("ver programa").intent,
            Intent::VerPrograma
        );
    }

    #[test]
    fn assignment_captures_part_and_user() {
        let local = LocalClassifier::new();
        let result = local.classify_local("asignar la bienvenida a Ana Torres");
        assert_eq!(result.intent, Intent::AsignarParte);
        assert_eq!(result.entity_str("parte"), Some("bienvenida"));
        assert_eq!(result.entity_str("usuario"), Some("Ana Torres"));
    }

    #[test]
    fn manual_registration_reachable_without_short_circuits() {
        let local = LocalClassifier::new();
        let result = local.classify_local("registrar a Juan en JA-A1B2C3D4");
        assert_eq!(result.intent, Intent::RegistrarAsistenciaManual);
    }

    #[test]
    fn create_user_is_admin_only() {
        let local = LocalClassifier::new();
        let result = local.classify_local("crear usuario para mi primo");
        assert_eq!(result.intent, Intent::CrearUsuario);
        assert_eq!(result.required_roles, vec![Role::Admin]);
    }

    #[test]
    fn pasted_program_detected() {
        let local = LocalClassifier::new();
        let pasted = "Programa sábado\nBienvenida: Ana\nHimno: 254";
        assert_eq!(
            local.classify_local(pasted).intent,
            Intent::EditarProgramaTexto
        );
    }

    #[test]
    fn unmatched_text_degrades() {
        let local = LocalClassifier::new();
        let result = local.classify_local("el clima está bonito hoy");
        assert_eq!(result.intent, Intent::Desconocido);
        assert_eq!(result.confidence, 0.3);
    }
}
