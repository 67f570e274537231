//! SQLite database handle.
//!
//! [`Database`] wraps a `rusqlite::Connection` behind an `Arc<Mutex<>>` and
//! exposes async methods that dispatch onto the blocking thread pool via
//! `tokio::task::spawn_blocking`, so store calls never block the webhook
//! runtime.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// Thread-safe handle to the bot's SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database at `path` and apply pragmas.
    ///
    /// Blocks briefly on file I/O; call during startup.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database, used by the test suites.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the database and run all pending migrations.
    pub async fn open_and_migrate(path: impl AsRef<Path> + Send + 'static) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || Self::open(&path)).await??;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending schema migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        self.execute(migration::run_all).await
    }

    /// Execute a closure against the connection on the blocking pool.
    ///
    /// This is the only way store modules touch the connection from async
    /// code. The closure receives a `&Connection` and returns a
    /// `StoreResult<T>`.
    pub async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await?
    }

    /// Apply pragmas to a fresh connection.
    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        // WAL: concurrent readers while the writer commits.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        // NORMAL sync is safe with WAL; a power failure loses at most the
        // last transaction, never corrupts.
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // Concurrent writers wait instead of failing immediately.
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;

        debug!("database pragmas applied (WAL, NORMAL, fk, busy_timeout)");
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
