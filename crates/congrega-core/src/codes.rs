//! QR and program code formats.
//!
//! QR codes identify one attendance-taking session: two letters, a dash,
//! and eight alphanumerics (`JA-A1B2C3D4`). Program codes identify one
//! weekly program: two or three letters, a dash, and six alphanumerics
//! (`PRG-3FK2M9`). Input is case-insensitive; QR codes normalize fully to
//! uppercase, program codes normalize their letter prefix.

use std::sync::LazyLock;

use regex::Regex;

static QR_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2}-[A-Za-z0-9]{8}$").expect("valid regex"));

static QR_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z]{2}-[A-Za-z0-9]{8})\b").expect("valid regex"));

static PROGRAM_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2,3}-[A-Za-z0-9]{6}$").expect("valid regex"));

static PROGRAM_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z]{2,3}-[A-Za-z0-9]{6})\b").expect("valid regex"));

/// Whether the trimmed message is exactly a QR code and nothing else.
pub fn is_bare_qr_code(message: &str) -> bool {
    QR_EXACT.is_match(message.trim())
}

/// Extract the first QR code anywhere in the text, normalized to uppercase.
pub fn extract_qr_code(text: &str) -> Option<String> {
    QR_ANY
        .captures(text)
        .map(|caps| caps[1].to_ascii_uppercase())
}

/// Normalize a known-shaped QR code to its canonical uppercase form.
pub fn normalize_qr_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Whether the trimmed message is exactly a program code and nothing else.
pub fn is_bare_program_code(message: &str) -> bool {
    PROGRAM_EXACT.is_match(message.trim())
}

/// Extract the first program code anywhere in the text, with its letter
/// prefix normalized to uppercase.
pub fn extract_program_code(text: &str) -> Option<String> {
    PROGRAM_ANY
        .captures(text)
        .map(|caps| normalize_program_code(&caps[1]))
}

/// Normalize a known-shaped program code: uppercase prefix, suffix kept.
pub fn normalize_program_code(code: &str) -> String {
    let code = code.trim();
    match code.split_once('-') {
        Some((prefix, suffix)) => format!("{}-{}", prefix.to_ascii_uppercase(), suffix),
        None => code.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_qr_matches_exact_shape_only() {
        assert!(is_bare_qr_code("JA-A1B2C3D4"));
        assert!(is_bare_qr_code("ja-a1b2c3d4"));
        assert!(is_bare_qr_code("  JA-A1B2C3D4  "));

        assert!(!is_bare_qr_code("JA-A1B2C3"));
        assert!(!is_bare_qr_code("JAX-A1B2C3D4"));
        assert!(!is_bare_qr_code("registrar JA-A1B2C3D4"));
    }

    #[test]
    fn qr_extraction_normalizes_uppercase() {
        assert_eq!(
            extract_qr_code("mi código es ja-a1b2c3d4 gracias"),
            Some("JA-A1B2C3D4".to_string())
        );
        assert_eq!(extract_qr_code("sin código"), None);
    }

    #[test]
    fn program_code_shapes() {
        assert!(is_bare_program_code("PRG-3FK2M9"));
        assert!(is_bare_program_code("JA-3FK2M9"));
        assert!(!is_bare_program_code("P-3FK2M9"));
        assert!(!is_bare_program_code("PRG-3FK2M"));
        // A QR code is not a program code: suffix length differs.
        assert!(!is_bare_program_code("JA-A1B2C3D4"));
    }

    #[test]
    fn program_extraction_normalizes_prefix() {
        assert_eq!(
            extract_program_code("editar programa prg-3fk2m9"),
            Some("PRG-3fk2m9".to_string())
        );
    }
}
