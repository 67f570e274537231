//! Deterministic short-circuits that bypass any classification strategy.
//!
//! QR codes, program codes, and the explicit registration phrasings are
//! unambiguous and free to match locally, so they resolve before the LLM
//! is ever consulted, and they guarantee the bot keeps working with no
//! LLM configured at all. Order matters and first match wins:
//!
//! 1. Manual-registration phrase ("registrar [asistencia de] X en <QR>")
//! 2. Bare QR code
//! 3. Explicit "editar programa <code>"
//! 4. Multi-line pasted program text (before bare-code detection, so a
//!    pasted program containing a code is not mistaken for a lookup)
//! 5. Bare program code

use std::sync::LazyLock;

use regex::Regex;

use congrega_core::codes::{
    extract_program_code, is_bare_program_code, is_bare_qr_code, normalize_qr_code,
};
use congrega_core::program_text::looks_like_program_text;
use congrega_core::{Intent, IntentResult, Role};

/// "registrar [la] [asistencia] [de|a] <subject> en <QR>".
static MANUAL_REGISTRATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*regist(?:rar|ra|ro)\s+(?:la\s+)?(?:asistencia\s+)?(?:de\s+|a\s+)?(?P<nombre>.+?)\s+en\s+(?P<codigo>[A-Za-z]{2}-[A-Za-z0-9]{8})\s*$",
    )
    .expect("valid regex")
});

/// "editar [el] programa <code>".
static EDIT_PROGRAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*editar\s+(?:el\s+)?programa\s+(?P<codigo>[A-Za-z]{2,3}-[A-Za-z0-9]{6})\s*$",
    )
    .expect("valid regex")
});

/// Try the ordered deterministic checks. `None` means the message needs a
/// real classification strategy.
pub fn short_circuit(message: &str) -> Option<IntentResult> {
    // 1. Manual registration: subject + QR in one phrase. Checked before
    //    the bare-QR shape so the wrapper always wins.
    if let Some(caps) = MANUAL_REGISTRATION.captures(message) {
        return Some(
            IntentResult::new(Intent::RegistrarAsistenciaManual, 1.0)
                .with_entity("nombreUsuario", caps["nombre"].trim())
                .with_entity("codigoQR", normalize_qr_code(&caps["codigo"]))
                .restricted_to(&[Role::Admin, Role::Lider]),
        );
    }

    // 2. The message is exactly a QR code: self-registration, public.
    if is_bare_qr_code(message) {
        return Some(
            IntentResult::new(Intent::RegistrarAsistencia, 1.0)
                .with_entity("codigoQR", normalize_qr_code(message)),
        );
    }

    // 3. Explicit program edit by code.
    if let Some(caps) = EDIT_PROGRAM.captures(message) {
        return Some(
            IntentResult::new(Intent::EditarProgramaTexto, 1.0)
                .with_entity(
                    "codigoPrograma",
                    congrega_core::codes::normalize_program_code(&caps["codigo"]),
                )
                .restricted_to(&[Role::Admin, Role::Lider]),
        );
    }

    // 4. A pasted full program. Must run before the bare-code check.
    if looks_like_program_text(message) {
        let mut result = IntentResult::new(Intent::EditarProgramaTexto, 0.95)
            .with_entity("textoPrograma", message.trim())
            .restricted_to(&[Role::Admin, Role::Lider]);
        if let Some(code) = extract_program_code(message) {
            result = result.with_entity("codigoPrograma", code);
        }
        return Some(result);
    }

    // 5. The message is exactly a program code: lookup.
    if is_bare_program_code(message) {
        return Some(
            IntentResult::new(Intent::VerPrograma, 1.0)
                .with_entity(
                    "codigoPrograma",
                    congrega_core::codes::normalize_program_code(message),
                )
                .restricted_to(&[Role::Admin, Role::Lider, Role::Participante]),
        );
    }

    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
