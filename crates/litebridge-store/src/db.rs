//! SQLite connection handle with WAL mode and performance pragmas.
//!
//! [`Database`] wraps a single `rusqlite::Connection` behind an
//! `Arc<Mutex<>>` and exposes async methods that dispatch onto the
//! blocking thread pool via `tokio::task::spawn_blocking`, so the async
//! runtime is never blocked on file I/O.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// Thread-safe handle to a SQLite database.
///
/// Cloning is cheap; all clones share the same connection. Reads and
/// writes go through [`Database::execute`] / [`Database::execute_mut`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<std::path::PathBuf>,
}

impl Database {
    /// Open (or create) a database file at `path` and apply pragmas.
    ///
    /// Blocks briefly on file I/O; call during startup or wrap in
    /// `spawn_blocking` yourself.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Create an in-memory database — useful for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Open the database and run all pending schema migrations.
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

    /// Filesystem path of the database, or `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Execute a closure against the connection on the blocking pool.
    ///
    /// This is the primary way to reach the database from async code:
    /// the closure receives a `&Connection` and returns a `StoreResult<T>`.
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

    /// Execute a mutable closure (for transactions) on the blocking pool.
    pub async fn execute_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
            f(&mut conn)
        })
        .await?
    }

    // ── pragmas ──────────────────────────────────────────────────────

    /// Apply performance pragmas to a fresh connection.
    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        debug!("applying SQLite pragmas");

        // WAL mode: concurrent readers, non-blocking writes.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // NORMAL sync is safe with WAL; a power failure can lose the last
        // transaction but cannot corrupt the database.
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        // 256 MiB memory-mapped I/O for hot reads.
        conn.pragma_update(None, "mmap_size", 268_435_456_i64)?;

        // Negative cache_size means KiB: 64 000 KiB page cache.
        conn.pragma_update(None, "cache_size", -64_000_i32)?;

        // Temp tables and indices in memory, not on disk.
        conn.pragma_update(None, "temp_store", "MEMORY")?;

        conn.pragma_update(None, "foreign_keys", "ON")?;

        // Writers wait out contention instead of failing immediately;
        // an expired timeout surfaces as a busy (transient) error.
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;

        info!("database pragmas applied (WAL, mmap 256MiB)");
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
