//! Domain handlers.
//!
//! Each handler owns the intents (and, for attendance, the multi-turn
//! flows) of one module. Handlers receive normalized inbound messages plus
//! classification entities, mutate the stores, and reply through the
//! [`MessageSink`]. They never touch the webhook layer.

pub mod attendance;
pub mod notifications;
pub mod programs;
pub mod users;

use std::sync::Arc;

use congrega_gateway::MessageSink;
use congrega_store::{AttendanceStore, ConversationStore, ProgramStore, UserStore};

use crate::events::EventBus;

/// Shared dependencies for router and handlers.
pub struct BotContext {
    pub conversations: ConversationStore,
    pub users: UserStore,
    pub attendance: AttendanceStore,
    pub programs: ProgramStore,
    pub sink: Arc<dyn MessageSink>,
    pub events: EventBus,
}

pub use attendance::AttendanceHandler;
pub use notifications::NotificationsHandler;
pub use programs::ProgramsHandler;
pub use users::UsersHandler;
