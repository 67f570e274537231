//! User administration: single-shot `crear_usuario`.

use std::sync::Arc;

use tracing::{info, instrument};

use congrega_core::{IntentResult, Role};
use congrega_gateway::InboundMessage;
use congrega_store::StoreError;

use crate::error::BotResult;
use crate::handlers::BotContext;
use crate::messages;

pub struct UsersHandler {
    ctx: Arc<BotContext>,
}

impl UsersHandler {
    pub fn new(ctx: Arc<BotContext>) -> Self {
        Self { ctx }
    }

    /// `crear_usuario`: create an account from entities (`nombre`,
    /// optional `telefono`, optional `rol`; unknown roles fall back to
    /// participante). The admin gate ran in the router.
    #[instrument(skip(self, msg, result))]
    pub async fn create(&self, msg: &InboundMessage, result: &IntentResult) -> BotResult<()> {
        let Some(name) = result.entity_str("nombre").filter(|n| !n.trim().is_empty()) else {
            self.reply(msg, &messages::user_create_usage()).await?;
            return Ok(());
        };

        let phone = result.entity_str("telefono");
        let role = result
            .entity_str("rol")
            .and_then(|r| Role::from_str(r).ok())
            .unwrap_or(Role::Participante);

        match self.ctx.users.create(name, phone, role).await {
            Ok(user) => {
                info!(user = %user.id, "user created via bot");
                self.reply(msg, &messages::user_created(&user.name, user.role))
                    .await
            }
            Err(StoreError::DuplicateRecord(_)) => {
                self.reply(msg, &messages::user_phone_taken()).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) -> BotResult<()> {
        self.ctx.sink.send_message(msg.conversation_id, text).await?;
        Ok(())
    }
}
