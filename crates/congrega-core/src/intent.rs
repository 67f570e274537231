//! Intents, caller roles, and classification results.
//!
//! The original dispatch-by-string design is replaced by a closed [`Intent`]
//! enum so that adding an intent is a compile-time-checked change: the
//! router's dispatch `match` is exhaustive and will not build until every
//! variant is handled.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Caller roles recognized by the role gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including manual registration and user management.
    Admin,
    /// Group leader: program editing and manual registration.
    Lider,
    /// Regular member: self-service intents only.
    Participante,
}

impl Role {
    /// Convert from the database/wire string representation.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "admin" => Ok(Self::Admin),
            "lider" => Ok(Self::Lider),
            "participante" => Ok(Self::Participante),
            other => Err(CoreError::UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }

    /// Convert to the database/wire string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Lider => "lider",
            Self::Participante => "participante",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

/// The closed set of intents the bot understands.
///
/// Wire names (used in LLM prompts, logs, and persisted nowhere) follow the
/// original snake_case Spanish vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Saludo,
    Ayuda,
    RegistrarAsistencia,
    RegistrarAsistenciaManual,
    VerPrograma,
    EditarProgramaTexto,
    CrearPrograma,
    EnviarPrograma,
    AsignarParte,
    CrearUsuario,
    Desconocido,
}

impl Intent {
    /// Wire-format name of this intent.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Saludo => "saludo",
            Self::Ayuda => "ayuda",
            Self::RegistrarAsistencia => "registrar_asistencia",
            Self::RegistrarAsistenciaManual => "registrar_asistencia_manual",
            Self::VerPrograma => "ver_programa",
            Self::EditarProgramaTexto => "editar_programa_texto",
            Self::CrearPrograma => "crear_programa",
            Self::EnviarPrograma => "enviar_programa",
            Self::AsignarParte => "asignar_parte",
            Self::CrearUsuario => "crear_usuario",
            Self::Desconocido => "desconocido",
        }
    }

    /// Parse a wire-format name. Unknown names map to [`Intent::Desconocido`]
    /// rather than an error: the LLM is free-form and an unrecognized label
    /// must degrade, not fail.
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim() {
            "saludo" => Self::Saludo,
            "ayuda" => Self::Ayuda,
            "registrar_asistencia" => Self::RegistrarAsistencia,
            "registrar_asistencia_manual" => Self::RegistrarAsistenciaManual,
            "ver_programa" => Self::VerPrograma,
            "editar_programa_texto" => Self::EditarProgramaTexto,
            "crear_programa" => Self::CrearPrograma,
            "enviar_programa" => Self::EnviarPrograma,
            "asignar_parte" => Self::AsignarParte,
            "crear_usuario" => Self::CrearUsuario,
            _ => Self::Desconocido,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Classification result
// ---------------------------------------------------------------------------

/// The outcome of classifying one inbound message.
///
/// Produced fresh per message and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    /// The classified intent.
    pub intent: Intent,
    /// Structured values extracted from the message (QR codes, names, ...).
    #[serde(default)]
    pub entities: HashMap<String, Value>,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether the caller must be a registered user.
    #[serde(default)]
    pub requires_auth: bool,
    /// Roles allowed to trigger this intent. Empty means any caller.
    #[serde(default)]
    pub required_roles: Vec<Role>,
}

impl IntentResult {
    /// A public (no-auth) result with the given confidence.
    pub fn new(intent: Intent, confidence: f64) -> Self {
        Self {
            intent,
            entities: HashMap::new(),
            confidence,
            requires_auth: false,
            required_roles: Vec::new(),
        }
    }

    /// The degraded result used when nothing matched anywhere.
    pub fn unknown() -> Self {
        Self::new(Intent::Desconocido, 0.3)
    }

    /// Attach an extracted entity.
    pub fn with_entity(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.entities.insert(key.to_string(), value.into());
        self
    }

    /// Restrict this intent to authenticated callers with one of `roles`.
    pub fn restricted_to(mut self, roles: &[Role]) -> Self {
        self.requires_auth = true;
        self.required_roles = roles.to_vec();
        self
    }

    /// Fetch an entity as a string slice, if present and textual.
    pub fn entity_str(&self, key: &str) -> Option<&str> {
        self.entities.get(key).and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_wire_names_round_trip() {
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
            assert_eq!(Intent::parse_lossy(intent.as_str()), intent);
        }
    }

    #[test]
    fn unknown_intent_name_degrades() {
        assert_eq!(Intent::parse_lossy("hacer_cafe"), Intent::Desconocido);
        assert_eq!(Intent::parse_lossy(""), Intent::Desconocido);
    }

    #[test]
    fn role_round_trip() {
        for role in [Role::Admin, Role::Lider, Role::Participante] {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
        assert!(Role::from_str("root").is_err());
    }

    #[test]
    fn restricted_result_sets_auth() {
        let result = IntentResult::new(Intent::RegistrarAsistenciaManual, 1.0)
            .restricted_to(&[Role::Admin, Role::Lider]);
        assert!(result.requires_auth);
        assert_eq!(result.required_roles, vec![Role::Admin, Role::Lider]);
    }

    #[test]
    fn entity_accessor() {
        let result =
            IntentResult::new(Intent::RegistrarAsistencia, 1.0).with_entity("codigoQR", "JA-A1B2C3D4");
        assert_eq!(result.entity_str("codigoQR"), Some("JA-A1B2C3D4"));
        assert_eq!(result.entity_str("missing"), None);
    }
}
