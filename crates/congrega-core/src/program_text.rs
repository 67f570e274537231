//! Canonical detector and parser for pasted program text.
//!
//! Leaders paste a whole weekly program as multi-line `label: value` text.
//! Both the deterministic short-circuit and the local fallback classifier
//! used to carry their own slightly different heuristic (colon-only vs.
//! colon-or-slash separators), which could classify the same message two
//! ways depending on LLM availability. This module is the single heuristic
//! both paths now share: colon-or-slash separators, three or more non-blank
//! lines, at least two of them labeled, bullet lines excluded.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// `label: value` or `label/ value`: label up to 40 chars without a
/// separator, then a non-empty value.
static LABEL_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^:/\n]{1,40}[:/]\s*\S.*$").expect("valid regex"));

/// One labeled line of a pasted program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramPart {
    /// The label before the separator (e.g. "Bienvenida").
    pub name: String,
    /// The value after the separator (e.g. an assignee name).
    pub value: String,
}

/// A parsed pasted program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedProgram {
    /// First unlabeled non-blank line, when present.
    pub title: Option<String>,
    /// All labeled lines, in order.
    pub parts: Vec<ProgramPart>,
}

/// Whether a line is a `label: value` pair and not a bullet item.
fn is_label_value(line: &str) -> bool {
    if line.starts_with('-') || line.starts_with('•') || line.starts_with('*') {
        return false;
    }
    LABEL_VALUE.is_match(line)
}

/// Whether `text` looks like a pasted full program: at least three
/// non-blank lines, at least two of them `label: value` shaped.
pub fn looks_like_program_text(text: &str) -> bool {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() < 3 {
        return false;
    }

    lines.iter().filter(|l| is_label_value(l)).count() >= 2
}

/// Parse pasted program text into a title and ordered labeled parts.
///
/// Lines that are neither labeled nor the first unlabeled line are ignored;
/// the caller decides whether a partial parse is acceptable.
pub fn parse_program_text(text: &str) -> ParsedProgram {
    let mut parsed = ParsedProgram::default();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_label_value(line) {
            let (name, value) = split_label_value(line);
            parsed.parts.push(ProgramPart {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            });
        } else if parsed.title.is_none() && parsed.parts.is_empty() {
            parsed.title = Some(line.to_string());
        }
    }

    parsed
}

/// Split at the first `:` or `/`, whichever comes first.
fn split_label_value(line: &str) -> (&str, &str) {
    let colon = line.find(':');
    let slash = line.find('/');
    let at = match (colon, slash) {
        (Some(c), Some(s)) => c.min(s),
        (Some(c), None) => c,
        (None, Some(s)) => s,
        (None, None) => return (line, ""),
    };
    (&line[..at], &line[at + 1..])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const PASTED_PROGRAM: &str = "Programa JA 15 de marzo\n\
                                  Bienvenida: Ana Torres\n\
                                  Himno inicial: 254\n\
                                  Mensaje / Pr. Díaz";

    #[test]
    fn detects_pasted_program() {
        assert!(looks_like_program_text(PASTED_PROGRAM));
    }

    #[test]
    fn rejects_short_messages() {
        assert!(!looks_like_program_text("Bienvenida: Ana"));
        assert!(!looks_like_program_text("hola\ncomo estas"));
    }

    #[test]
    fn rejects_bulleted_lists() {
        let bullets = "mis pendientes\n- comprar: pan\n- llamar: juan\n- dormir: temprano";
        // Bullet lines don't count as labeled, so only the heading remains.
        assert!(!looks_like_program_text(bullets));
    }

    #[test]
    fn needs_two_labeled_lines() {
        let one_label = "titulo\nBienvenida: Ana\nalgo mas sin separador";
        assert!(!looks_like_program_text(one_label));
    }

    #[test]
    fn parses_title_and_parts() {
        let parsed = parse_program_text(PASTED_PROGRAM);
        assert_eq!(parsed.title.as_deref(), Some("Programa JA 15 de marzo"));
        assert_eq!(parsed.parts.len(), 3);
        assert_eq!(parsed.parts[0].name, "Bienvenida");
        assert_eq!(parsed.parts[0].value, "Ana Torres");
        assert_eq!(parsed.parts[2].name, "Mensaje");
        assert_eq!(parsed.parts[2].value, "Pr. Díaz");
    }

    #[test]
    fn splits_at_first_separator() {
        let parsed = parse_program_text("x\ny\nHora: 10:30");
        assert_eq!(parsed.parts[0].name, "Hora");
        assert_eq!(parsed.parts[0].value, "10:30");
    }
}
