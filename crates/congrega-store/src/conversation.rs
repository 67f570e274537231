//! Per-phone conversation persistence.
//!
//! One row per normalized phone number holds the conversation's state name,
//! active module, and the JSON flow context. Every mutation bumps
//! `last_message_at`. There is no cross-message locking: two messages from
//! the same phone may interleave, and the last write wins; the attendance
//! unique indexes are the correctness backstop for the one case that
//! matters.

use chrono::Utc;
use rusqlite::OptionalExtension;
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use congrega_core::ConversationState;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// A persisted conversation.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    /// Normalized phone number (digits only).
    pub phone: String,
    pub state: ConversationState,
    pub active_module: Option<String>,
    /// Opaque flow payload; meaningful only when `state` is not idle.
    pub context: Value,
    pub last_message_at: i64,
}

/// A partial update to a conversation. `None` fields are left untouched.
#[derive(Debug, Default)]
pub struct ConversationPatch {
    pub state: Option<ConversationState>,
    /// `Some(None)` clears the module; `None` leaves it alone.
    pub active_module: Option<Option<String>>,
    pub context: Option<Value>,
}

impl ConversationPatch {
    /// Patch that moves the conversation into a flow state.
    pub fn enter_flow(state: ConversationState, module: &str, context: Value) -> Self {
        Self {
            state: Some(state),
            active_module: Some(Some(module.to_string())),
            context: Some(context),
        }
    }

    /// Patch that only replaces the flow context.
    pub fn context(context: Value) -> Self {
        Self {
            context: Some(context),
            ..Self::default()
        }
    }
}

/// Strip a phone number down to its digits.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Store for [`Conversation`] rows, keyed by phone number.
#[derive(Clone)]
pub struct ConversationStore {
    db: Database,
}

impl ConversationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetch the conversation for `phone`, creating an idle one if absent.
    /// Bumps `last_message_at` either way.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, phone: &str) -> StoreResult<Conversation> {
        let phone = normalize_phone(phone);
        if phone.is_empty() {
            return Err(StoreError::InvalidArgument("empty phone number".into()));
        }

        self.db
            .execute(move |conn| {
                let now = Utc::now().timestamp();
                conn.execute(
                    "INSERT INTO conversations (id, phone, state, context, last_message_at)
                     VALUES (?1, ?2, 'inicio', '{}', ?3)
                     ON CONFLICT(phone) DO UPDATE SET last_message_at = excluded.last_message_at",
                    rusqlite::params![Uuid::now_v7().to_string(), phone, now],
                )?;

                fetch_by_phone(conn, &phone)?.ok_or_else(|| StoreError::NotFound {
                    entity: "conversation",
                    id: phone.clone(),
                })
            })
            .await
    }

    /// Apply a partial update and bump `last_message_at`.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, phone: &str, patch: ConversationPatch) -> StoreResult<()> {
        let phone = normalize_phone(phone);
        self.db
            .execute(move |conn| {
                let context_json = match &patch.context {
                    Some(value) => Some(serde_json::to_string(value)?),
                    None => None,
                };
                let state = patch.state.map(|s| s.as_str());
                let set_module = patch.active_module.is_some();
                let module = patch.active_module.flatten();

                let changed = conn.execute(
                    "UPDATE conversations SET
                        state           = COALESCE(?2, state),
                        active_module   = CASE WHEN ?3 THEN ?4 ELSE active_module END,
                        context         = COALESCE(?5, context),
                        last_message_at = ?6
                     WHERE phone = ?1",
                    rusqlite::params![
                        phone,
                        state,
                        set_module,
                        module,
                        context_json,
                        Utc::now().timestamp(),
                    ],
                )?;

                if changed == 0 {
                    return Err(StoreError::NotFound {
                        entity: "conversation",
                        id: phone.clone(),
                    });
                }
                debug!(phone = %phone, "conversation updated");
                Ok(())
            })
            .await
    }

    /// Reset the conversation to idle: state `inicio`, no module, empty
    /// context. Used on flow completion, cancellation, and corruption.
    #[instrument(skip(self))]
    pub async fn reset(&self, phone: &str) -> StoreResult<()> {
        let phone = normalize_phone(phone);
        self.db
            .execute(move |conn| {
                conn.execute(
                    "UPDATE conversations SET
                        state = 'inicio', active_module = NULL, context = '{}',
                        last_message_at = ?2
                     WHERE phone = ?1",
                    rusqlite::params![phone, Utc::now().timestamp()],
                )?;
                debug!(phone = %phone, "conversation reset");
                Ok(())
            })
            .await
    }
}

/// Decode a row into a [`Conversation`].
fn fetch_by_phone(
    conn: &rusqlite::Connection,
    phone: &str,
) -> StoreResult<Option<Conversation>> {
    let row = conn
        .query_row(
            "SELECT id, phone, state, active_module, context, last_message_at
             FROM conversations WHERE phone = ?1",
            rusqlite::params![phone],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((id, phone, state, active_module, context, last_message_at)) = row else {
        return Ok(None);
    };

    let state = ConversationState::from_str(&state).map_err(|e| StoreError::CorruptRow {
        entity: "conversations",
        reason: e.to_string(),
    })?;
    let context: Value = serde_json::from_str(&context).map_err(|e| StoreError::CorruptRow {
        entity: "conversations",
        reason: e.to_string(),
    })?;

    Ok(Some(Conversation {
        id,
        phone,
        state,
        active_module,
        context,
        last_message_at,
    }))
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup() -> ConversationStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        ConversationStore::new(db)
    }

    #[tokio::test]
    async fn creates_idle_conversation() {
        let store = setup().await;
        let conv = store.get_or_create("+51 987 654 321").await.unwrap();

        assert_eq!(conv.phone, "51987654321");
        assert_eq!(conv.state, ConversationState::Inicio);
        assert!(conv.active_module.is_none());
        assert_eq!(conv.context, json!({}));
    }

    #[tokio::test]
    async fn second_call_returns_same_row() {
        let store = setup().await;
        let first = store.get_or_create("51987654321").await.unwrap();
        let second = store.get_or_create("+51-987-654-321").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn update_enters_flow_and_reset_leaves_it() {
        let store = setup().await;
        store.get_or_create("51987654321").await.unwrap();

        store
            .update(
                "51987654321",
                ConversationPatch::enter_flow(
                    ConversationState::FormularioAsistencia,
                    "asistencia",
                    json!({"cursor": 0}),
                ),
            )
            .await
            .unwrap();

        let conv = store.get_or_create("51987654321").await.unwrap();
        assert_eq!(conv.state, ConversationState::FormularioAsistencia);
        assert_eq!(conv.active_module.as_deref(), Some("asistencia"));
        assert_eq!(conv.context, json!({"cursor": 0}));

        store.reset("51987654321").await.unwrap();
        let conv = store.get_or_create("51987654321").await.unwrap();
        assert_eq!(conv.state, ConversationState::Inicio);
        assert!(conv.active_module.is_none());
        assert_eq!(conv.context, json!({}));
    }

    #[tokio::test]
    async fn context_only_patch_keeps_state() {
        let store = setup().await;
        store.get_or_create("51987654321").await.unwrap();
        store
            .update(
                "51987654321",
                ConversationPatch::enter_flow(
                    ConversationState::FormularioAsistencia,
                    "asistencia",
                    json!({"cursor": 0}),
                ),
            )
            .await
            .unwrap();

        store
            .update("51987654321", ConversationPatch::context(json!({"cursor": 1})))
            .await
            .unwrap();

        let conv = store.get_or_create("51987654321").await.unwrap();
        assert_eq!(conv.state, ConversationState::FormularioAsistencia);
        assert_eq!(conv.context, json!({"cursor": 1}));
    }

    #[tokio::test]
    async fn update_unknown_phone_is_not_found() {
        let store = setup().await;
        let err = store
            .update("000", ConversationPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn empty_phone_is_rejected() {
        let store = setup().await;
        let err = store.get_or_create("abc").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }
}
