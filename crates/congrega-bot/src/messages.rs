//! User-facing message templates.
//!
//! Every reply the bot sends lives here, one function per template, so the
//! wording can be reviewed (and tested) in a single place. The deployment
//! is single-language; templates are plain Spanish with WhatsApp-style
//! `*bold*` markers.

use congrega_core::Role;
use congrega_store::User;

// ── greetings and menu ───────────────────────────────────────────────

pub fn welcome(name: Option<&str>, role: Option<Role>) -> String {
    let saludo = match name {
        Some(name) => format!("¡Hola, {name}! 👋"),
        None => "¡Hola! 👋".to_string(),
    };

    let mut menu = String::from(
        "\n\nPuedo ayudarte con:\n\
         • Registrar tu asistencia: envía el código QR (ej. JA-A1B2C3D4)\n\
         • Ver el programa: envía el código del programa",
    );

    if matches!(role, Some(Role::Admin | Role::Lider)) {
        menu.push_str(
            "\n• Registrar asistencia de otra persona: \
             \"registrar a Juan en JA-A1B2C3D4\"\n\
             • Editar el programa: pega el programa completo",
        );
    }

    format!("{saludo}{menu}")
}

pub fn help_text() -> String {
    "Envía un código QR (ej. *JA-A1B2C3D4*) para registrar tu asistencia, \
     o un código de programa (ej. *PRG-3FK2M9*) para consultarlo.\n\n\
     Si no tienes un código a la mano, escribe *hola* para ver el menú."
        .to_string()
}

pub fn unknown_hint() -> String {
    "No entendí tu mensaje 🤔. Escribe *ayuda* para ver lo que puedo hacer."
        .to_string()
}

// ── access control ───────────────────────────────────────────────────

pub fn no_account() -> String {
    "No encontré una cuenta asociada a tu número. Pide a un líder que te \
     registre para usar esta función."
        .to_string()
}

pub fn insufficient_role() -> String {
    "Esta función está reservada para líderes del grupo.".to_string()
}

// ── attendance: entry validation ─────────────────────────────────────

pub fn qr_format_hint() -> String {
    "Para registrar asistencia envía el código QR tal como aparece, por \
     ejemplo: *JA-A1B2C3D4*."
        .to_string()
}

pub fn invalid_qr(code: &str) -> String {
    format!("El código *{code}* no es válido. Verifica el código QR e inténtalo de nuevo.")
}

pub fn inactive_qr(code: &str) -> String {
    format!("El código *{code}* ya no está activo. Pide el código vigente a tu líder.")
}

pub fn outside_window(start: &str, end: &str) -> String {
    format!(
        "El registro para esta actividad solo está disponible entre las \
         *{start}* y las *{end}*. Inténtalo dentro de ese horario."
    )
}

pub fn already_registered(type_name: &str) -> String {
    format!("Ya tienes registrada tu asistencia de *{type_name}* esta semana ✅.")
}

pub fn already_registered_manual(subject: &str, type_name: &str) -> String {
    format!("*{subject}* ya tiene registrada su asistencia de *{type_name}* esta semana ✅.")
}

// ── attendance: confirmation ─────────────────────────────────────────

pub fn registration_confirmed(type_name: &str) -> String {
    format!(
        "✅ ¡Asistencia registrada!\n\n\
         Actividad: *{type_name}*\n\
         Tu registro quedará confirmado por un líder."
    )
}

pub fn manual_registration_confirmed(subject: &str, type_name: &str) -> String {
    format!(
        "✅ Asistencia registrada para *{subject}*.\n\n\
         Actividad: *{type_name}*\n\
         Estado: confirmado."
    )
}

pub fn ambiguous_subject(query: &str, matches: &[User]) -> String {
    let mut out = format!(
        "Encontré {} personas que coinciden con \"{query}\". Indica el \
         teléfono para saber a quién registrar:\n",
        matches.len()
    );
    for user in matches {
        let phone = user.phone.as_deref().unwrap_or("sin teléfono");
        out.push_str(&format!("\n• {} ({phone})", user.name));
    }
    out
}

// ── attendance: form flow ────────────────────────────────────────────

pub fn form_greeting(type_name: &str) -> String {
    format!("📋 Registro de asistencia: *{type_name}*")
}

pub fn form_instructions(total_fields: usize) -> String {
    format!(
        "Te haré {total_fields} pregunta(s) breves. Responde cada una y al \
         final registraré tu asistencia."
    )
}

pub fn flow_corrupted() -> String {
    "Algo salió mal con tu registro 😔. Vuelve a enviar el código QR para \
     empezar de nuevo."
        .to_string()
}

// ── programs ─────────────────────────────────────────────────────────

pub fn program_not_found(code: &str) -> String {
    format!("No encontré un programa con el código *{code}*.")
}

pub fn no_programs_yet() -> String {
    "Todavía no hay programas registrados. Un líder puede crear uno pegando \
     el programa completo."
        .to_string()
}

pub fn program_saved(code: &str, parts: usize) -> String {
    format!("✅ Programa guardado con {parts} parte(s). Código: *{code}*.")
}

pub fn program_paste_hint(current: &str) -> String {
    format!(
        "{current}\n\nPara editarlo, pega el programa completo en un solo \
         mensaje (una línea por parte, con el formato *Parte: Responsable*)."
    )
}

pub fn create_program_template() -> String {
    "Para crear un programa, pega uno completo en un solo mensaje. Por \
     ejemplo:\n\n\
     Programa JA 15 de marzo\n\
     Bienvenida: Ana Torres\n\
     Himno inicial: 254\n\
     Mensaje: Pr. Díaz"
        .to_string()
}

pub fn program_sent(recipient: &str) -> String {
    format!("✅ Programa enviado a *{recipient}*.")
}

pub fn part_assigned(part: &str, assignee: &str) -> String {
    format!("✅ *{part}* quedó asignada a *{assignee}*.")
}

pub fn part_not_found(part: &str) -> String {
    format!("No encontré la parte \"{part}\" en el programa.")
}

pub fn assign_usage() -> String {
    "Para asignar una parte escribe, por ejemplo: \
     *asignar la bienvenida a Ana Torres*."
        .to_string()
}

// ── users ────────────────────────────────────────────────────────────

pub fn user_created(name: &str, role: Role) -> String {
    format!("✅ Usuario *{name}* creado con rol *{role}*.")
}

pub fn user_create_usage() -> String {
    "Para crear un usuario indica al menos el nombre, por ejemplo: \
     *crear usuario Ana Torres, teléfono 987654321*."
        .to_string()
}

pub fn user_phone_taken() -> String {
    "Ese teléfono ya pertenece a un usuario registrado.".to_string()
}

// ── generic ──────────────────────────────────────────────────────────

pub fn generic_error() -> String {
    "Ocurrió un error inesperado 😔. Inténtalo de nuevo en unos minutos."
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
