//! Schema migration system.
//!
//! Migrations are static SQL strings keyed by version number. Applied
//! versions are tracked in a `_migrations` table so reruns are no-ops.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL. May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "initial schema: conversations, users, attendance, programs",
    sql: r#"
        CREATE TABLE conversations (
            id              TEXT PRIMARY KEY,
            phone           TEXT NOT NULL UNIQUE,
            state           TEXT NOT NULL DEFAULT 'inicio',
            active_module   TEXT,
            context         TEXT NOT NULL DEFAULT '{}',
            last_message_at INTEGER NOT NULL
        );

        CREATE TABLE users (
            id         TEXT PRIMARY KEY,
            name       TEXT NOT NULL,
            phone      TEXT UNIQUE,
            role       TEXT NOT NULL DEFAULT 'participante'
                       CHECK(role IN ('admin','lider','participante')),
            active     BOOLEAN NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE attendance_types (
            id             TEXT PRIMARY KEY,
            name           TEXT NOT NULL,
            solo_presencia BOOLEAN NOT NULL DEFAULT 0,
            active         BOOLEAN NOT NULL DEFAULT 1
        );

        CREATE TABLE qr_codes (
            id          TEXT PRIMARY KEY,
            code        TEXT NOT NULL UNIQUE,
            type_id     TEXT NOT NULL REFERENCES attendance_types(id),
            hora_inicio TEXT NOT NULL,
            hora_fin    TEXT NOT NULL,
            active      BOOLEAN NOT NULL DEFAULT 1
        );

        CREATE TABLE form_fields (
            id          TEXT PRIMARY KEY,
            type_id     TEXT NOT NULL REFERENCES attendance_types(id),
            name        TEXT NOT NULL,
            label       TEXT NOT NULL,
            kind        TEXT NOT NULL CHECK(kind IN ('number','checkbox','select','text')),
            required    BOOLEAN NOT NULL DEFAULT 0,
            placeholder TEXT,
            min_value   REAL,
            max_value   REAL,
            options     TEXT,
            position    INTEGER NOT NULL DEFAULT 0,
            active      BOOLEAN NOT NULL DEFAULT 1
        );
        CREATE INDEX idx_form_fields_type ON form_fields(type_id, position);

        CREATE TABLE attendance_records (
            id            TEXT PRIMARY KEY,
            type_id       TEXT NOT NULL REFERENCES attendance_types(id),
            week_start    TEXT NOT NULL,
            user_id       TEXT REFERENCES users(id),
            phone         TEXT,
            name          TEXT,
            status        TEXT NOT NULL
                          CHECK(status IN ('pendiente_confirmacion','confirmado')),
            method        TEXT NOT NULL CHECK(method IN ('qr_bot','manual')),
            form_data     TEXT NOT NULL DEFAULT '{}',
            registered_by TEXT,
            created_at    INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX idx_attendance_user_week
            ON attendance_records(user_id, week_start, type_id)
            WHERE user_id IS NOT NULL;
        CREATE UNIQUE INDEX idx_attendance_phone_week
            ON attendance_records(phone, week_start, type_id)
            WHERE user_id IS NULL AND phone IS NOT NULL;
        CREATE UNIQUE INDEX idx_attendance_name_week
            ON attendance_records(name, week_start, type_id)
            WHERE user_id IS NULL AND phone IS NULL AND name IS NOT NULL;

        CREATE TABLE programs (
            id         TEXT PRIMARY KEY,
            code       TEXT NOT NULL UNIQUE,
            title      TEXT NOT NULL,
            fecha      TEXT,
            parts      TEXT NOT NULL DEFAULT '[]',
            updated_at INTEGER NOT NULL
        );
    "#,
}];

/// Run all pending migrations against `conn`.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        debug!(
            version = migration.version,
            description = migration.description,
            "applying migration"
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| StoreError::Migration {
                version: migration.version,
                message: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.description,
                chrono::Utc::now().timestamp()
            ],
        )?;

        info!(version = migration.version, "migration applied");
    }

    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_db_reaches_latest_version() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.last().unwrap().version);
    }

    #[test]
    fn rerun_applies_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT count(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count as usize, MIGRATIONS.len());
    }

    #[test]
    fn unique_indexes_exist() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master
                 WHERE type = 'index' AND name LIKE 'idx_attendance_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }
}
