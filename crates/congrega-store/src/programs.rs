//! Weekly program persistence.
//!
//! A program is a titled, dated list of parts (`Bienvenida: Ana`, ...)
//! stored as a JSON column, looked up by its short code. Parts reuse
//! [`ProgramPart`] from the shared text parser: an empty `value` means the
//! part is unassigned.

use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::{debug, instrument};
use uuid::Uuid;

use congrega_core::program_text::ProgramPart;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// A persisted weekly program.
#[derive(Debug, Clone)]
pub struct Program {
    pub id: String,
    /// Short lookup code, e.g. `PRG-3FK2M9`.
    pub code: String,
    pub title: String,
    /// Program date, "YYYY-MM-DD", when known.
    pub fecha: Option<String>,
    pub parts: Vec<ProgramPart>,
    pub updated_at: i64,
}

/// Store for [`Program`] rows.
#[derive(Clone)]
pub struct ProgramStore {
    db: Database,
}

impl ProgramStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a program with a freshly generated code.
    #[instrument(skip(self, parts))]
    pub async fn create(
        &self,
        title: &str,
        fecha: Option<&str>,
        parts: Vec<ProgramPart>,
    ) -> StoreResult<Program> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(StoreError::InvalidArgument("empty program title".into()));
        }
        let fecha = fecha.map(str::to_string);

        self.db
            .execute(move |conn| {
                let id = Uuid::now_v7().to_string();
                let code = generate_code(&id);
                let now = Utc::now().timestamp();

                conn.execute(
                    "INSERT INTO programs (id, code, title, fecha, parts, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        id,
                        code,
                        title,
                        fecha,
                        serde_json::to_string(&parts)?,
                        now
                    ],
                )?;

                debug!(code = %code, "program created");
                Ok(Program {
                    id,
                    code,
                    title,
                    fecha,
                    parts,
                    updated_at: now,
                })
            })
            .await
    }

    /// Look up a program by its code (canonical prefix-uppercase form).
    pub async fn find_by_code(&self, code: &str) -> StoreResult<Option<Program>> {
        let code = code.to_string();
        self.db
            .execute(move |conn| {
                conn.query_row(
                    "SELECT id, code, title, fecha, parts, updated_at
                     FROM programs WHERE code = ?1",
                    rusqlite::params![code],
                    decode_program,
                )
                .optional()?
                .transpose()
            })
            .await
    }

    /// The most recently updated program, if any.
    pub async fn latest(&self) -> StoreResult<Option<Program>> {
        self.db
            .execute(|conn| {
                conn.query_row(
                    "SELECT id, code, title, fecha, parts, updated_at
                     FROM programs ORDER BY updated_at DESC, id DESC LIMIT 1",
                    [],
                    decode_program,
                )
                .optional()?
                .transpose()
            })
            .await
    }

    /// Replace a program's parts wholesale (pasted-text edit).
    #[instrument(skip(self, parts))]
    pub async fn replace_parts(&self, code: &str, parts: Vec<ProgramPart>) -> StoreResult<()> {
        let code = code.to_string();
        self.db
            .execute(move |conn| {
                let changed = conn.execute(
                    "UPDATE programs SET parts = ?2, updated_at = ?3 WHERE code = ?1",
                    rusqlite::params![
                        code,
                        serde_json::to_string(&parts)?,
                        Utc::now().timestamp()
                    ],
                )?;
                if changed == 0 {
                    return Err(StoreError::NotFound {
                        entity: "program",
                        id: code.clone(),
                    });
                }
                debug!(code = %code, parts = parts.len(), "program parts replaced");
                Ok(())
            })
            .await
    }

    /// Assign one part (matched case-insensitively by name) to `assignee`.
    /// Returns `false` when no part matches.
    #[instrument(skip(self))]
    pub async fn assign_part(
        &self,
        code: &str,
        part_name: &str,
        assignee: &str,
    ) -> StoreResult<bool> {
        let Some(mut program) = self.find_by_code(code).await? else {
            return Err(StoreError::NotFound {
                entity: "program",
                id: code.to_string(),
            });
        };

        let needle = part_name.trim().to_lowercase();
        let Some(part) = program
            .parts
            .iter_mut()
            .find(|p| p.name.to_lowercase().contains(&needle))
        else {
            return Ok(false);
        };

        part.value = assignee.trim().to_string();
        let parts = program.parts;
        self.replace_parts(code, parts).await?;
        Ok(true)
    }
}

/// Derive a short program code from a fresh UUID: `PRG-` plus the last six
/// alphanumerics (the random tail, not the timestamp head).
fn generate_code(id: &str) -> String {
    let alnum: Vec<char> = id.chars().filter(char::is_ascii_alphanumeric).collect();
    let suffix: String = alnum[alnum.len().saturating_sub(6)..]
        .iter()
        .collect::<String>()
        .to_ascii_uppercase();
    format!("PRG-{suffix}")
}

fn decode_program(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoreResult<Program>> {
    let parts_json: String = row.get(4)?;
    let program = Program {
        id: row.get(0)?,
        code: row.get(1)?,
        title: row.get(2)?,
        fecha: row.get(3)?,
        parts: Vec::new(),
        updated_at: row.get(5)?,
    };

    Ok(match serde_json::from_str(&parts_json) {
        Ok(parts) => Ok(Program { parts, ..program }),
        Err(e) => Err(StoreError::CorruptRow {
            entity: "programs",
            reason: format!("bad parts json: {e}"),
        }),
    })
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> ProgramStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        ProgramStore::new(db)
    }

    fn parts() -> Vec<ProgramPart> {
        vec![
            ProgramPart {
                name: "Bienvenida".into(),
                value: "Ana Torres".into(),
            },
            ProgramPart {
                name: "Mensaje".into(),
                value: String::new(),
            },
        ]
    }

    #[tokio::test]
    async fn create_and_find() {
        let store = setup().await;
        let created = store
            .create("Programa JA", Some("2026-08-08"), parts())
            .await
            .unwrap();
        assert!(created.code.starts_with("PRG-"));

        let found = store.find_by_code(&created.code).await.unwrap().unwrap();
        assert_eq!(found.title, "Programa JA");
        assert_eq!(found.parts.len(), 2);
    }

    #[tokio::test]
    async fn replace_parts_overwrites() {
        let store = setup().await;
        let created = store.create("Programa JA", None, parts()).await.unwrap();

        store
            .replace_parts(
                &created.code,
                vec![ProgramPart {
                    name: "Himno".into(),
                    value: "254".into(),
                }],
            )
            .await
            .unwrap();

        let found = store.find_by_code(&created.code).await.unwrap().unwrap();
        assert_eq!(found.parts.len(), 1);
        assert_eq!(found.parts[0].name, "Himno");
    }

    #[tokio::test]
    async fn assign_part_updates_exactly_one() {
        let store = setup().await;
        let created = store.create("Programa JA", None, parts()).await.unwrap();

        let assigned = store
            .assign_part(&created.code, "mensaje", "Pr. Díaz")
            .await
            .unwrap();
        assert!(assigned);

        let found = store.find_by_code(&created.code).await.unwrap().unwrap();
        assert_eq!(found.parts[1].value, "Pr. Díaz");
        // The other part is untouched.
        assert_eq!(found.parts[0].value, "Ana Torres");
    }

    #[tokio::test]
    async fn assign_unknown_part_returns_false() {
        let store = setup().await;
        let created = store.create("Programa JA", None, parts()).await.unwrap();
        let assigned = store
            .assign_part(&created.code, "ofrenda", "Juan")
            .await
            .unwrap();
        assert!(!assigned);
    }

    #[tokio::test]
    async fn latest_returns_most_recent() {
        let store = setup().await;
        store.create("Antiguo", None, vec![]).await.unwrap();
        let newer = store.create("Nuevo", None, vec![]).await.unwrap();

        // UUIDv7 ids are time-ordered, which tiebreaks same-second rows.
        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.id, newer.id);
    }
}
