//! User accounts.
//!
//! Bot callers are identified by phone number, not credentials. Manual
//! registration resolves third parties either by a phone-suffix match
//! (providers disagree on country-code formatting, so the last nine digits
//! are the stable part) or by a fuzzy, diacritic-insensitive name search.

use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::{debug, instrument};
use uuid::Uuid;

use congrega_core::Role;

use crate::db::Database;
use crate::error::{StoreError, StoreResult, is_unique_violation};

/// Number of trailing digits compared when matching phones.
pub const PHONE_SUFFIX_LEN: usize = 9;

/// A user account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Normalized phone (digits only), when known.
    pub phone: Option<String>,
    pub role: Role,
    pub active: bool,
}

/// Store for [`User`] rows.
#[derive(Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a user. A duplicate phone surfaces as
    /// [`StoreError::DuplicateRecord`].
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        name: &str,
        phone: Option<&str>,
        role: Role,
    ) -> StoreResult<User> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::InvalidArgument("empty user name".into()));
        }
        let phone = phone.map(crate::conversation::normalize_phone);

        self.db
            .execute(move |conn| {
                let id = Uuid::now_v7().to_string();
                conn.execute(
                    "INSERT INTO users (id, name, phone, role, active, created_at)
                     VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                    rusqlite::params![id, name, phone, role.as_str(), Utc::now().timestamp()],
                )
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        StoreError::DuplicateRecord(format!("phone already registered: {name}"))
                    } else {
                        e.into()
                    }
                })?;

                debug!(id = %id, "user created");
                Ok(User {
                    id,
                    name,
                    phone,
                    role,
                    active: true,
                })
            })
            .await
    }

    /// Find the active user whose phone matches `phone` exactly (after
    /// normalization).
    pub async fn find_by_phone(&self, phone: &str) -> StoreResult<Option<User>> {
        let phone = crate::conversation::normalize_phone(phone);
        self.db
            .execute(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, name, phone, role, active FROM users
                         WHERE phone = ?1 AND active = 1",
                        rusqlite::params![phone],
                        decode_user,
                    )
                    .optional()?;
                row.map(User::try_from).transpose()
            })
            .await
    }

    /// Find active users whose phone ends with the last
    /// [`PHONE_SUFFIX_LEN`] digits of `phone`.
    pub async fn find_by_phone_suffix(&self, phone: &str) -> StoreResult<Vec<User>> {
        let digits = crate::conversation::normalize_phone(phone);
        let suffix = if digits.len() > PHONE_SUFFIX_LEN {
            digits[digits.len() - PHONE_SUFFIX_LEN..].to_string()
        } else {
            digits
        };
        if suffix.is_empty() {
            return Ok(Vec::new());
        }

        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, phone, role, active FROM users
                     WHERE active = 1 AND phone LIKE '%' || ?1",
                )?;
                let rows = stmt.query_map(rusqlite::params![suffix], decode_user)?;
                rows.map(|r| r.map_err(StoreError::from).and_then(User::try_from))
                    .collect()
            })
            .await
    }

    /// Fuzzy name search: case- and diacritic-insensitive substring match
    /// over active users.
    pub async fn search_by_name(&self, query: &str) -> StoreResult<Vec<User>> {
        let needle = fold_for_search(query);
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        self.db
            .execute(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT id, name, phone, role, active FROM users WHERE active = 1")?;
                let rows = stmt.query_map([], decode_user)?;

                let mut matches = Vec::new();
                for row in rows {
                    let user: User = row.map_err(StoreError::from).and_then(User::try_from)?;
                    if fold_for_search(&user.name).contains(&needle) {
                        matches.push(user);
                    }
                }
                Ok(matches)
            })
            .await
    }

    /// Fetch a user by id.
    pub async fn get(&self, id: &str) -> StoreResult<Option<User>> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, name, phone, role, active FROM users WHERE id = ?1",
                        rusqlite::params![id],
                        decode_user,
                    )
                    .optional()?;
                row.map(User::try_from).transpose()
            })
            .await
    }
}

/// Raw row before role decoding.
type UserRow = (String, String, Option<String>, String, bool);

fn decode_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from((id, name, phone, role, active): UserRow) -> StoreResult<Self> {
        let role = Role::from_str(&role).map_err(|e| StoreError::CorruptRow {
            entity: "users",
            reason: e.to_string(),
        })?;
        Ok(Self {
            id,
            name,
            phone,
            role,
            active,
        })
    }
}

/// Lowercase and strip the diacritics that show up in Spanish names.
fn fold_for_search(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

// ── tests ────────────────────────────────────────────────────────────
