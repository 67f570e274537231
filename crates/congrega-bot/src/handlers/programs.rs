//! Weekly program intents: view, edit-by-paste, create, send, assign.
//!
//! All single-shot. Program editing deliberately has no multi-turn flow:
//! leaders paste the whole program in one message, which survives spotty
//! connections better than a guided form.

use std::sync::Arc;

use tracing::{info, instrument};

use congrega_core::IntentResult;
use congrega_core::program_text::{ProgramPart, parse_program_text};
use congrega_gateway::InboundMessage;
use congrega_store::Program;

use crate::error::BotResult;
use crate::handlers::BotContext;
use crate::messages;

pub struct ProgramsHandler {
    ctx: Arc<BotContext>,
}

impl ProgramsHandler {
    pub fn new(ctx: Arc<BotContext>) -> Self {
        Self { ctx }
    }

    /// `ver_programa`: render by code, or the latest when no code given.
    #[instrument(skip(self, msg, result))]
    pub async fn view(&self, msg: &InboundMessage, result: &IntentResult) -> BotResult<()> {
        let program = match result.entity_str("codigoPrograma") {
            Some(code) => {
                let Some(program) = self.ctx.programs.find_by_code(code).await? else {
                    self.reply(msg, &messages::program_not_found(code)).await?;
                    return Ok(());
                };
                program
            }
            None => {
                let Some(program) = self.ctx.programs.latest().await? else {
                    self.reply(msg, &messages::no_programs_yet()).await?;
                    return Ok(());
                };
                program
            }
        };

        self.reply(msg, &render_program(&program)).await
    }

    /// `editar_programa_texto`: either an explicit code (reply with the
    /// current program and paste instructions) or pasted text (replace the
    /// referenced/latest program's parts, creating one when none exists).
    #[instrument(skip(self, msg, result))]
    pub async fn edit_from_text(
        &self,
        msg: &InboundMessage,
        result: &IntentResult,
    ) -> BotResult<()> {
        let Some(text) = result.entity_str("textoPrograma") else {
            // "editar programa <code>" without a pasted body.
            let Some(code) = result.entity_str("codigoPrograma") else {
                self.reply(msg, &messages::create_program_template()).await?;
                return Ok(());
            };
            let Some(program) = self.ctx.programs.find_by_code(code).await? else {
                self.reply(msg, &messages::program_not_found(code)).await?;
                return Ok(());
            };
            self.reply(msg, &messages::program_paste_hint(&render_program(&program)))
                .await?;
            return Ok(());
        };

        let parsed = parse_program_text(text);
        let parts: Vec<ProgramPart> = parsed.parts;

        // An explicit or embedded code targets that program; otherwise the
        // latest one is edited, and with none at all a new one is created.
        let target = match result.entity_str("codigoPrograma") {
            Some(code) => self.ctx.programs.find_by_code(code).await?,
            None => self.ctx.programs.latest().await?,
        };

        let (code, count) = match target {
            Some(program) => {
                let count = parts.len();
                self.ctx.programs.replace_parts(&program.code, parts).await?;
                (program.code, count)
            }
            None => {
                let title = parsed.title.unwrap_or_else(|| "Programa".to_string());
                let count = parts.len();
                let created = self.ctx.programs.create(&title, None, parts).await?;
                (created.code, count)
            }
        };

        info!(code = %code, parts = count, "program updated from pasted text");
        self.reply(msg, &messages::program_saved(&code, count)).await
    }

    /// `crear_programa`: guidance only; creation happens by pasting.
    pub async fn create_guidance(&self, msg: &InboundMessage) -> BotResult<()> {
        self.reply(msg, &messages::create_program_template()).await
    }

    /// `enviar_programa`: deliver the latest program, proactively to a
    /// named member when one is given, otherwise back to the requester.
    #[instrument(skip(self, msg, result))]
    pub async fn send_latest(&self, msg: &InboundMessage, result: &IntentResult) -> BotResult<()> {
        let Some(program) = self.ctx.programs.latest().await? else {
            self.reply(msg, &messages::no_programs_yet()).await?;
            return Ok(());
        };
        let rendered = render_program(&program);

        if let Some(recipient) = result.entity_str("usuario") {
            let matches = self.ctx.users.search_by_name(recipient).await?;
            if let Some(phone) = matches
                .iter()
                .find_map(|u| u.phone.as_deref())
            {
                let target = self
                    .ctx
                    .sink
                    .resolve_conversation(phone, matches.first().map(|u| u.name.as_str()))
                    .await?;
                if let Some(conversation_id) = target {
                    self.ctx.sink.send_message(conversation_id, &rendered).await?;
                    info!(recipient = %recipient, "program sent proactively");
                    self.reply(msg, &messages::program_sent(recipient)).await?;
                    return Ok(());
                }
            }
        }

        self.reply(msg, &rendered).await
    }

    /// `asignar_parte`: update one part's assignee on the latest program.
    #[instrument(skip(self, msg, result))]
    pub async fn assign(&self, msg: &InboundMessage, result: &IntentResult) -> BotResult<()> {
        let (Some(part), Some(assignee)) =
            (result.entity_str("parte"), result.entity_str("usuario"))
        else {
            self.reply(msg, &messages::assign_usage()).await?;
            return Ok(());
        };

        let Some(program) = self.ctx.programs.latest().await? else {
            self.reply(msg, &messages::no_programs_yet()).await?;
            return Ok(());
        };

        if self.ctx.programs.assign_part(&program.code, part, assignee).await? {
            self.reply(msg, &messages::part_assigned(part, assignee)).await
        } else {
            self.reply(msg, &messages::part_not_found(part)).await
        }
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) -> BotResult<()> {
        self.ctx.sink.send_message(msg.conversation_id, text).await?;
        Ok(())
    }
}

/// Render a program as the text message members receive.
pub fn render_program(program: &Program) -> String {
    let mut out = format!("📖 *{}*", program.title);
    if let Some(fecha) = &program.fecha {
        out.push_str(&format!("\n📅 {fecha}"));
    }
    out.push('\n');

    for part in &program.parts {
        if part.value.is_empty() {
            out.push_str(&format!("\n• {}: _(sin asignar)_", part.name));
        } else {
            out.push_str(&format!("\n• {}: {}", part.name, part.value));
        }
    }

    out.push_str(&format!("\n\nCódigo: {}", program.code));
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
