//! Conversational intents: greeting, help, unknown fallback.

use std::sync::Arc;

use congrega_gateway::InboundMessage;
use congrega_store::User;

use crate::error::BotResult;
use crate::handlers::BotContext;
use crate::messages;

pub struct NotificationsHandler {
    ctx: Arc<BotContext>,
}

impl NotificationsHandler {
    pub fn new(ctx: Arc<BotContext>) -> Self {
        Self { ctx }
    }

    /// `saludo`: role-aware welcome menu.
    pub async fn greet(&self, msg: &InboundMessage, caller: Option<&User>) -> BotResult<()> {
        let name = caller
            .map(|u| u.name.as_str())
            .or(msg.sender_name.as_deref());
        let text = messages::welcome(name, caller.map(|u| u.role));
        self.reply(msg, &text).await
    }

    /// `ayuda`.
    pub async fn help(&self, msg: &InboundMessage) -> BotResult<()> {
        self.reply(msg, &messages::help_text()).await
    }

    /// `desconocido`: nudge toward the help menu.
    pub async fn unknown(&self, msg: &InboundMessage) -> BotResult<()> {
        self.reply(msg, &messages::unknown_hint()).await
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) -> BotResult<()> {
        self.ctx.sink.send_message(msg.conversation_id, text).await?;
        Ok(())
    }
}
