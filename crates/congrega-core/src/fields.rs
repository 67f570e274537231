//! Data-driven form-field schema with validation and question rendering.
//!
//! Attendance types carry an ordered list of [`FieldDef`]s; the attendance
//! flow walks them one at a time, validating each raw reply with
//! [`FieldDef::validate`] and rendering the next prompt with
//! [`FieldDef::render_question`]. Validation failures carry the exact
//! user-facing message so the flow can re-prompt without state changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Schema types
// ---------------------------------------------------------------------------

/// The kind of a form field, which determines validation and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Number,
    Checkbox,
    Select,
    Text,
}

/// One selectable option of a `select` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

/// One field of a dynamic form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    /// Key under which the validated answer is stored.
    pub name: String,
    /// Human-readable prompt label.
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
}

/// A validated, typed answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// A rejected answer. The `Display` text is the exact re-prompt shown to the
/// user, so every variant speaks the user's language.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("Por favor ingresa un número válido.")]
    NotANumber,

    #[error("El valor mínimo permitido es {0}.")]
    BelowMinimum(f64),

    #[error("El valor máximo permitido es {0}.")]
    AboveMaximum(f64),

    #[error("Por favor responde *sí* o *no*.")]
    NotYesNo,

    #[error("Opción no válida. Responde con el número de una de las opciones.")]
    InvalidOption,

    #[error("Este campo es obligatorio. Por favor escribe una respuesta.")]
    RequiredEmpty,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Affirmative checkbox answers, compared case-insensitively.
const YES_ANSWERS: &[&str] = &["sí", "si", "yes", "1", "true"];

/// Negative checkbox answers, compared case-insensitively.
const NO_ANSWERS: &[&str] = &["no", "0", "false"];

impl FieldDef {
    /// Validate a raw reply against this field, producing a typed value.
    ///
    /// On rejection the returned [`FieldError`] renders the exact message to
    /// re-prompt with; the caller must leave the flow cursor untouched.
    pub fn validate(&self, raw: &str) -> Result<FieldValue, FieldError> {
        let trimmed = raw.trim();

        match self.kind {
            FieldKind::Number => {
                let value: f64 = trimmed.parse().map_err(|_| FieldError::NotANumber)?;
                if let Some(min) = self.min_value {
                    if value < min {
                        return Err(FieldError::BelowMinimum(min));
                    }
                }
                if let Some(max) = self.max_value {
                    if value > max {
                        return Err(FieldError::AboveMaximum(max));
                    }
                }
                Ok(FieldValue::Number(value))
            }

            FieldKind::Checkbox => {
                let lowered = trimmed.to_lowercase();
                if YES_ANSWERS.contains(&lowered.as_str()) {
                    Ok(FieldValue::Bool(true))
                } else if NO_ANSWERS.contains(&lowered.as_str()) {
                    Ok(FieldValue::Bool(false))
                } else {
                    Err(FieldError::NotYesNo)
                }
            }

            FieldKind::Select => {
                // 1-based index into the options list...
                if let Ok(index) = trimmed.parse::<usize>() {
                    if index >= 1 && index <= self.options.len() {
                        return Ok(FieldValue::Text(self.options[index - 1].value.clone()));
                    }
                }
                // ...or an exact case-insensitive match on value or label.
                let lowered = trimmed.to_lowercase();
                for option in &self.options {
                    if option.value.to_lowercase() == lowered
                        || option.label.to_lowercase() == lowered
                    {
                        return Ok(FieldValue::Text(option.value.clone()));
                    }
                }
                Err(FieldError::InvalidOption)
            }

            FieldKind::Text => {
                if trimmed.is_empty() && self.required {
                    return Err(FieldError::RequiredEmpty);
                }
                Ok(FieldValue::Text(trimmed.to_string()))
            }
        }
    }

    /// Render the question for this field: label, optional placeholder, and
    /// a kind-specific answer hint.
    pub fn render_question(&self) -> String {
        let mut out = format!("*{}*", self.label);

        if let Some(placeholder) = &self.placeholder {
            out.push('\n');
            out.push_str(placeholder);
        }

        match self.kind {
            FieldKind::Number => match (self.min_value, self.max_value) {
                (Some(min), Some(max)) => {
                    out.push_str(&format!("\n(valor entre {min} y {max})"));
                }
                (Some(min), None) => out.push_str(&format!("\n(valor mínimo {min})")),
                (None, Some(max)) => out.push_str(&format!("\n(valor máximo {max})")),
                (None, None) => {}
            },
            FieldKind::Checkbox => out.push_str("\n(responde *sí* o *no*)"),
            FieldKind::Select => {
                out.push('\n');
                for (i, option) in self.options.iter().enumerate() {
                    out.push_str(&format!("\n{}. {}", i + 1, option.label));
                }
                out.push_str("\n\nResponde con el número de tu opción.");
            }
            FieldKind::Text => {}
        }

        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn number_field(min: Option<f64>, max: Option<f64>) -> FieldDef {
        FieldDef {
            name: "cantidad".into(),
            label: "¿Cuántos capítulos leíste?".into(),
            kind: FieldKind::Number,
            required: true,
            placeholder: None,
            min_value: min,
            max_value: max,
            options: Vec::new(),
        }
    }

    fn select_field() -> FieldDef {
        FieldDef {
            name: "grupo".into(),
            label: "¿A qué grupo perteneces?".into(),
            kind: FieldKind::Select,
            required: true,
            placeholder: None,
            min_value: None,
            max_value: None,
            options: vec![
                FieldOption {
                    value: "a".into(),
                    label: "Opción A".into(),
                },
                FieldOption {
                    value: "b".into(),
                    label: "Opción B".into(),
                },
            ],
        }
    }

    fn checkbox_field() -> FieldDef {
        FieldDef {
            name: "trajo_biblia".into(),
            label: "¿Trajiste tu Biblia?".into(),
            kind: FieldKind::Checkbox,
            required: true,
            placeholder: None,
            min_value: None,
            max_value: None,
            options: Vec::new(),
        }
    }

    #[test]
    fn number_accepts_boundaries_rejects_outside() {
        let field = number_field(Some(1.0), Some(7.0));

        assert_eq!(field.validate("1"), Ok(FieldValue::Number(1.0)));
        assert_eq!(field.validate("7"), Ok(FieldValue::Number(7.0)));
        assert_eq!(field.validate("0"), Err(FieldError::BelowMinimum(1.0)));
        assert_eq!(field.validate("8"), Err(FieldError::AboveMaximum(7.0)));
        assert_eq!(field.validate("abc"), Err(FieldError::NotANumber));
    }

    #[test]
    fn number_without_bounds_accepts_any_numeric() {
        let field = number_field(None, None);
        assert_eq!(field.validate("  3.5 "), Ok(FieldValue::Number(3.5)));
        assert_eq!(field.validate("-2"), Ok(FieldValue::Number(-2.0)));
    }

    #[test]
    fn checkbox_is_case_insensitive() {
        let field = checkbox_field();

        for yes in ["SI", "sí", "Yes", "1", "TRUE"] {
            assert_eq!(field.validate(yes), Ok(FieldValue::Bool(true)), "{yes}");
        }
        for no in ["NO", "0", "false"] {
            assert_eq!(field.validate(no), Ok(FieldValue::Bool(false)), "{no}");
        }
        assert_eq!(field.validate("maybe"), Err(FieldError::NotYesNo));
    }

    #[test]
    fn select_accepts_index_or_label() {
        let field = select_field();

        assert_eq!(field.validate("2"), Ok(FieldValue::Text("b".into())));
        assert_eq!(field.validate("Opción B"), Ok(FieldValue::Text("b".into())));
        assert_eq!(field.validate("a"), Ok(FieldValue::Text("a".into())));
        assert_eq!(field.validate("0"), Err(FieldError::InvalidOption));
        assert_eq!(field.validate("3"), Err(FieldError::InvalidOption));
        assert_eq!(field.validate("Opción C"), Err(FieldError::InvalidOption));
    }

    #[test]
    fn required_text_rejects_empty() {
        let field = FieldDef {
            name: "comentario".into(),
            label: "Comentario".into(),
            kind: FieldKind::Text,
            required: true,
            placeholder: None,
            min_value: None,
            max_value: None,
            options: Vec::new(),
        };
        assert_eq!(field.validate("   "), Err(FieldError::RequiredEmpty));
        assert_eq!(
            field.validate("  hola  "),
            Ok(FieldValue::Text("hola".into()))
        );
    }

    #[test]
    fn optional_text_accepts_empty() {
        let field = FieldDef {
            name: "comentario".into(),
            label: "Comentario".into(),
            kind: FieldKind::Text,
            required: false,
            placeholder: None,
            min_value: None,
            max_value: None,
            options: Vec::new(),
        };
        assert_eq!(field.validate(""), Ok(FieldValue::Text(String::new())));
    }

    #[test]
    fn question_rendering_includes_hints() {
        let number = number_field(Some(1.0), Some(7.0)).render_question();
        assert!(number.contains("valor entre 1 y 7"));

        let select = select_field().render_question();
        assert!(select.contains("1. Opción A"));
        assert!(select.contains("2. Opción B"));
        assert!(select.contains("Responde con el número"));

        let checkbox = checkbox_field().render_question();
        assert!(checkbox.contains("responde *sí* o *no*"));
    }
}
