//! The intent router: one state machine per conversation.
//!
//! Idle conversations (`inicio`) get a fresh classification; conversations
//! inside a flow forward the raw text to the owning handler; entity
//! extraction does not run again mid-flow. Auth and role gates run between
//! classification and dispatch, and the dispatch itself is an exhaustive
//! `match` over the closed [`Intent`] set.
//!
//! Every failure stops here. The webhook was acknowledged before this code
//! runs, so an error is logged, answered with a generic apology, and the
//! conversation is reset to a recoverable state. Nothing propagates out
//! of the detached task.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use congrega_classifier::IntentClassifier;
use congrega_core::{FlowContext, Intent};
use congrega_gateway::InboundMessage;
use congrega_store::User;

use crate::error::BotResult;
use crate::handlers::{
    AttendanceHandler, BotContext, NotificationsHandler, ProgramsHandler, UsersHandler,
};
use crate::messages;

pub struct IntentRouter {
    ctx: Arc<BotContext>,
    classifier: IntentClassifier,
    attendance: AttendanceHandler,
    programs: ProgramsHandler,
    users: UsersHandler,
    notifications: NotificationsHandler,
}

impl IntentRouter {
    pub fn new(ctx: Arc<BotContext>, classifier: IntentClassifier) -> Self {
        Self {
            attendance: AttendanceHandler::new(Arc::clone(&ctx)),
            programs: ProgramsHandler::new(Arc::clone(&ctx)),
            users: UsersHandler::new(Arc::clone(&ctx)),
            notifications: NotificationsHandler::new(Arc::clone(&ctx)),
            classifier,
            ctx,
        }
    }

    /// Process one inbound message to completion. Never fails: the error
    /// path replies generically and force-resets the conversation.
    pub async fn on_message(&self, msg: InboundMessage) {
        if let Err(e) = self.dispatch(&msg).await {
            error!(error = %e, phone = %msg.phone, "message processing failed");
            let _ = self
                .ctx
                .sink
                .send_message(msg.conversation_id, &messages::generic_error())
                .await;
            let _ = self.ctx.conversations.reset(&msg.phone).await;
        }
    }

    async fn dispatch(&self, msg: &InboundMessage) -> BotResult<()> {
        let conversation = self.ctx.conversations.get_or_create(&msg.phone).await?;

        // An active flow owns the raw text of every message until it
        // completes or resets.
        if !conversation.state.is_idle() {
            debug!(state = %conversation.state, "continuing active flow");
            return self.continue_flow(msg, &conversation).await;
        }

        let result = self.classifier.classify(&msg.content).await;
        info!(
            intent = %result.intent,
            confidence = result.confidence,
            "message classified"
        );

        let caller = self.ctx.users.find_by_phone(&msg.phone).await?;

        if !self.gate(msg, &result, caller.as_ref()).await? {
            return Ok(());
        }

        match result.intent {
            Intent::Saludo => self.notifications.greet(msg, caller.as_ref()).await,
            Intent::Ayuda => self.notifications.help(msg).await,
            Intent::RegistrarAsistencia => self.attendance.handle(msg, &result).await,
            Intent::RegistrarAsistenciaManual => {
                // The gate guarantees an authenticated caller here.
                let Some(caller) = caller.as_ref() else {
                    self.ctx
                        .sink
                        .send_message(msg.conversation_id, &messages::no_account())
                        .await?;
                    return Ok(());
                };
                self.attendance.handle_manual(msg, &result, caller).await
            }
            Intent::VerPrograma => self.programs.view(msg, &result).await,
            Intent::EditarProgramaTexto => self.programs.edit_from_text(msg, &result).await,
            Intent::CrearPrograma => self.programs.create_guidance(msg).await,
            Intent::EnviarPrograma => self.programs.send_latest(msg, &result).await,
            Intent::AsignarParte => self.programs.assign(msg, &result).await,
            Intent::CrearUsuario => self.users.create(msg, &result).await,
            Intent::Desconocido => self.notifications.unknown(msg).await,
        }
    }

    /// Enforce `requires_auth`/`required_roles`. Replies and returns
    /// `false` when the caller may not proceed; state is never changed by
    /// a rejection.
    async fn gate(
        &self,
        msg: &InboundMessage,
        result: &congrega_core::IntentResult,
        caller: Option<&User>,
    ) -> BotResult<bool> {
        if !result.requires_auth {
            return Ok(true);
        }

        let Some(user) = caller else {
            self.ctx
                .sink
                .send_message(msg.conversation_id, &messages::no_account())
                .await?;
            return Ok(false);
        };

        if !result.required_roles.is_empty() && !result.required_roles.contains(&user.role) {
            warn!(
                intent = %result.intent,
                role = %user.role,
                "caller role not allowed"
            );
            self.ctx
                .sink
                .send_message(msg.conversation_id, &messages::insufficient_role())
                .await?;
            return Ok(false);
        }

        Ok(true)
    }

    /// Route a mid-flow message to the handler owning the conversation's
    /// state. A context that fails to decode is corruption: reply, reset,
    /// never leave the conversation stuck.
    async fn continue_flow(
        &self,
        msg: &InboundMessage,
        conversation: &congrega_store::Conversation,
    ) -> BotResult<()> {
        match FlowContext::decode(conversation.state, &conversation.context) {
            Ok(Some(FlowContext::AttendanceForm(flow))) => {
                self.attendance.continue_flow(msg, flow).await
            }
            Ok(None) => {
                // Non-idle state with no payload shape: same corruption
                // handling as a failed decode.
                warn!(state = %conversation.state, "flow state without context");
                self.recover(msg).await
            }
            Err(e) => {
                warn!(error = %e, state = %conversation.state, "malformed flow context");
                self.recover(msg).await
            }
        }
    }

    /// The corruption guard: apologize, destroy progress, return to idle.
    async fn recover(&self, msg: &InboundMessage) -> BotResult<()> {
        self.ctx
            .sink
            .send_message(msg.conversation_id, &messages::flow_corrupted())
            .await?;
        self.ctx.conversations.reset(&msg.phone).await?;
        Ok(())
    }
}
