//! Remote classification strategy backed by an OpenAI-compatible endpoint.
//!
//! One non-streaming chat-completions call per message with a fixed
//! taxonomy prompt demanding strict JSON. The call is attempted exactly
//! once, with no retry and no backoff: a transient failure costs only
//! classification quality, never availability, because the caller falls
//! back to [`crate::LocalClassifier`].

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::debug;

use congrega_core::{Intent, IntentResult, Role};

use crate::Classify;
use crate::error::{ClassifierError, ClassifierResult};

/// Default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default classification model.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Hard cap on the classification response; the JSON contract is tiny.
const MAX_TOKENS: u32 = 300;

/// Fixed taxonomy prompt. The model must answer with one JSON object and
/// nothing else.
const TAXONOMY_PROMPT: &str = "\
Eres el clasificador de intenciones de un bot de WhatsApp para un grupo de \
iglesia. Dado un mensaje, responde SOLO con un objeto JSON, sin texto \
adicional, con esta forma exacta:

{\"intent\": \"...\", \"entities\": {}, \"confidence\": 0.0, \
\"requiresAuth\": false, \"requiredRoles\": []}

Intenciones válidas:
- saludo: saludos y cortesías
- ayuda: pedir ayuda o el menú de opciones
- registrar_asistencia: registrar la propia asistencia (entidad codigoQR)
- registrar_asistencia_manual: registrar la asistencia de OTRA persona \
(entidades nombreUsuario, codigoQR; requiresAuth true; roles admin, lider)
- ver_programa: consultar el programa (entidad opcional codigoPrograma; \
requiresAuth true; roles admin, lider, participante)
- editar_programa_texto: editar o pegar un programa completo \
(requiresAuth true; roles admin, lider)
- crear_programa: crear un programa nuevo (requiresAuth true; roles admin, lider)
- enviar_programa: enviar el programa al grupo (requiresAuth true; roles admin, lider)
- asignar_parte: asignar una parte del programa a alguien (entidades parte, \
usuario; requiresAuth true; roles admin, lider)
- crear_usuario: crear un usuario (requiresAuth true; roles admin)
- desconocido: cualquier otra cosa

confidence es un número entre 0 y 1. requiredRoles usa los valores admin, \
lider, participante.";

/// Configuration for the remote strategy.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl LlmConfig {
    /// Build a config from the environment, if an API key is present.
    ///
    /// Reads `OPENAI_API_KEY` (required), `CONGREGA_LLM_BASE_URL` and
    /// `CONGREGA_LLM_MODEL` (optional overrides). Returns `None` with no
    /// key; the bot then runs on the local classifier alone.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.is_empty())?;
        let base_url = std::env::var("CONGREGA_LLM_BASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
        let model = std::env::var("CONGREGA_LLM_MODEL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// The LLM-backed classification strategy.
pub struct LlmClassifier {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmClassifier {
    pub fn new(config: LlmConfig) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(auth) = HeaderValue::from_str(&format!("Bearer {}", config.api_key)) {
            headers.insert(AUTHORIZATION, auth);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self { config, http }
    }

    /// One chat-completions round trip.
    async fn request(&self, message: &str) -> ClassifierResult<Value> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = json!({
            "model": self.config.model,
            "temperature": 0.0,
            "max_tokens": MAX_TOKENS,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": TAXONOMY_PROMPT},
                {"role": "user", "content": message},
            ],
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Classify for LlmClassifier {
    async fn classify(&self, message: &str) -> ClassifierResult<IntentResult> {
        let response = self.request(message).await?;

        let content = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ClassifierError::MalformedResponse("no message content in response".into())
            })?;

        let result = parse_classification(content)?;
        debug!(intent = %result.intent, confidence = result.confidence, "llm classification");
        Ok(result)
    }
}

/// Parse the model's JSON answer into an [`IntentResult`] with safe
/// per-field defaults: a missing or unparseable field degrades that field,
/// not the whole classification.
pub(crate) fn parse_classification(content: &str) -> ClassifierResult<IntentResult> {
    // Models occasionally wrap the object in a code fence despite the
    // contract; strip it before parsing.
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;

    let intent = value
        .get("intent")
        .and_then(Value::as_str)
        .map(Intent::parse_lossy)
        .unwrap_or(Intent::Desconocido);

    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);

    let mut result = IntentResult::new(intent, confidence);

    if let Some(entities) = value.get("entities").and_then(Value::as_object) {
        for (key, entity) in entities {
            result.entities.insert(key.clone(), entity.clone());
        }
    }

    result.requires_auth = value
        .get("requiresAuth")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if let Some(roles) = value.get("requiredRoles").and_then(Value::as_array) {
        result.required_roles = roles
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|r| Role::from_str(r).ok())
            .collect();
    }

    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_answer_parses() {
        let content = r#"{
            "intent": "asignar_parte",
            "entities": {"parte": "bienvenida", "usuario": "Ana"},
            "confidence": 0.92,
            "requiresAuth": true,
            "requiredRoles": ["admin", "lider"]
        }"#;

        let result = parse_classification(content).unwrap();
        assert_eq!(result.intent, Intent::AsignarParte);
        assert_eq!(result.confidence, 0.92);
        assert!(result.requires_auth);
        assert_eq!(result.required_roles, vec![Role::Admin, Role::Lider]);
        assert_eq!(result.entity_str("usuario"), Some("Ana"));
    }

    #[test]
    fn missing_fields_take_safe_defaults() {
        let result = parse_classification(r#"{"intent": "saludo"}"#).unwrap();
        assert_eq!(result.intent, Intent::Saludo);
        assert_eq!(result.confidence, 0.5);
        assert!(!result.requires_auth);
        assert!(result.required_roles.is_empty());
        assert!(result.entities.is_empty());
    }

    #[test]
    fn unknown_intent_and_roles_degrade() {
        let content = r#"{
            "intent": "lanzar_cohete",
            "confidence": 3.5,
            "requiredRoles": ["root", "lider"]
        }"#;
        let result = parse_classification(content).unwrap();
        assert_eq!(result.intent, Intent::Desconocido);
        // Confidence clamped into [0, 1].
        assert_eq!(result.confidence, 1.0);
        // Unknown role names are dropped, known ones kept.
        assert_eq!(result.required_roles, vec![Role::Lider]);
    }

    #[test]
    fn code_fences_are_tolerated() {
        let content = "```json\n{\"intent\": \"ayuda\", \"confidence\": 0.8}\n```";
        let result = parse_classification(content).unwrap();
        assert_eq!(result.intent, Intent::Ayuda);
    }

    #[test]
    fn non_json_is_an_error() {
        assert!(parse_classification("claro, con gusto te ayudo").is_err());
    }

    #[test]
    fn prompt_lists_every_wire_intent() {
        for intent in [
            Intent::Saludo,
            Intent::Ayuda,
            Intent::RegistrarAsistencia,
            Intent::RegistrarAsistenciaManual,
            Intent::VerPrograma,
            Intent::EditarProgramaTexto,
            Intent::CrearPrograma,
            Intent::EnviarPrograma,
            Intent::AsignarParte,
            Intent::CrearUsuario,
            Intent::Desconocido,
        ] {
            assert!(
                TAXONOMY_PROMPT.contains(intent.as_str()),
                "prompt is missing {intent}"
            );
        }
    }
}
