//! Conversation states and typed flow-context payloads.
//!
//! The original system stored an opaque JSON blob per conversation and
//! trusted each handler to interpret it. Here the blob is a tagged payload
//! keyed by the conversation state: decoding happens once, at the start of
//! flow continuation, with an explicit malformed branch that forces a
//! conversation reset instead of guessing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::fields::{FieldDef, FieldValue};

// ---------------------------------------------------------------------------
// Conversation states
// ---------------------------------------------------------------------------

/// The per-conversation state machine states.
///
/// `Inicio` is idle: the next message is re-classified. Any other state
/// means an active flow owns the conversation and receives the raw text of
/// the next message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    Inicio,
    FormularioAsistencia,
    FormularioAsistenciaManual,
}

impl ConversationState {
    /// Convert from the persisted string representation.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "inicio" => Ok(Self::Inicio),
            "formulario_asistencia" => Ok(Self::FormularioAsistencia),
            "formulario_asistencia_manual" => Ok(Self::FormularioAsistenciaManual),
            other => Err(CoreError::UnknownVariant {
                kind: "conversation state",
                value: other.to_string(),
            }),
        }
    }

    /// Convert to the persisted string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inicio => "inicio",
            Self::FormularioAsistencia => "formulario_asistencia",
            Self::FormularioAsistenciaManual => "formulario_asistencia_manual",
        }
    }

    /// Whether this state is idle (no active flow).
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Inicio)
    }

    /// The module tag owning this state, if any.
    pub fn owning_module(&self) -> Option<&'static str> {
        match self {
            Self::Inicio => None,
            Self::FormularioAsistencia | Self::FormularioAsistenciaManual => Some("asistencia"),
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Attendance flow payload
// ---------------------------------------------------------------------------

/// Third-party target of a manual registration, resolved at flow entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManualTarget {
    /// Resolved user id, when the subject matched exactly one account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Free-text phone, when the subject was given by number but unmatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Free-text name, when the subject stays unregistered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The persisted state of an in-progress attendance form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceFlowState {
    /// The QR code that opened this flow (normalized uppercase).
    pub qr_code: String,
    /// Id of the QR row.
    pub qr_id: String,
    /// Id of the attendance type the QR points at.
    pub type_id: String,
    /// Ordered field schema snapshot taken at flow entry.
    pub fields: Vec<FieldDef>,
    /// Cursor into `fields`. Invariant: `cursor <= fields.len()`; the flow
    /// is complete when they are equal.
    pub cursor: usize,
    /// Validated answers collected so far, keyed by field name.
    #[serde(default)]
    pub answers: BTreeMap<String, FieldValue>,
    /// Present when a leader is registering someone else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual: Option<ManualTarget>,
}

impl AttendanceFlowState {
    /// The field the flow is currently waiting on, or `None` when complete.
    pub fn current_field(&self) -> Option<&FieldDef> {
        self.fields.get(self.cursor)
    }

    /// Whether every field has been answered.
    pub fn is_complete(&self) -> bool {
        self.cursor >= self.fields.len()
    }
}

// ---------------------------------------------------------------------------
// Tagged context
// ---------------------------------------------------------------------------

/// Typed view of a conversation's persisted context blob.
///
/// Serialization goes through [`FlowContext::encode`]/[`FlowContext::decode`]
/// only; the variant tag is the conversation's `estado`, not part of the
/// JSON payload.
#[derive(Debug, Clone)]
pub enum FlowContext {
    AttendanceForm(AttendanceFlowState),
}

impl FlowContext {
    /// Decode the context blob for a conversation in `state`.
    ///
    /// Returns `Ok(None)` for idle conversations (their context carries no
    /// meaning) and [`CoreError::MalformedContext`] when an active flow's
    /// payload does not decode (the corruption branch).
    pub fn decode(state: ConversationState, raw: &Value) -> Result<Option<Self>, CoreError> {
        match state {
            ConversationState::Inicio => Ok(None),
            ConversationState::FormularioAsistencia
            | ConversationState::FormularioAsistenciaManual => {
                let flow: AttendanceFlowState =
                    serde_json::from_value(raw.clone()).map_err(|e| {
                        CoreError::MalformedContext {
                            state: state.as_str().to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                if flow.cursor > flow.fields.len() {
                    return Err(CoreError::MalformedContext {
                        state: state.as_str().to_string(),
                        reason: format!(
                            "cursor {} out of range for {} fields",
                            flow.cursor,
                            flow.fields.len()
                        ),
                    });
                }
                Ok(Some(Self::AttendanceForm(flow)))
            }
        }
    }

    /// Encode back into the persisted blob shape.
    pub fn encode(&self) -> Value {
        match self {
            Self::AttendanceForm(flow) => {
                serde_json::to_value(flow).unwrap_or_else(|_| Value::Object(Default::default()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
