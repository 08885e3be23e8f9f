//! SQLite data-provider adapter.
//!
//! [`SqliteProvider`] translates the generic data-provider operations
//! (catalog introspection, truncation, generated-key inserts, sequence
//! management, maintenance, incremental blob access) into SQLite SQL
//! and delegates execution to a [`Database`] handle. Each call is
//! stateless and independent; the adapter performs no retries — callers
//! use [`StoreError::is_transient`] to decide whether retrying is safe.
//!
//! Maintenance operations ([`SqliteProvider::shrink`],
//! [`SqliteProvider::rebuild_indexes`]) hold an internal exclusive lock
//! so provider callers cannot interleave them; writers in *other*
//! processes are outside this lock and remain the caller's problem.

use std::sync::Arc;

use rusqlite::blob::Blob;
use rusqlite::{Connection, DatabaseName};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::db::Database;
use crate::dialect::{self, RESERVED_PREFIX};
use crate::error::{StoreError, StoreResult};

/// SQLite-dialect implementation of the data-provider contract.
#[derive(Clone)]
pub struct SqliteProvider {
    db: Database,
    maintenance: Arc<Mutex<()>>,
}

impl SqliteProvider {
    /// Wrap an open [`Database`] handle.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            maintenance: Arc::new(Mutex::new(())),
        }
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // ── existence checks ─────────────────────────────────────────────

    /// Whether the database exists.
    ///
    /// Always true: SQLite creates the file on open, so a reachable
    /// connection is the existence proof. File-level existence is not
    /// consulted.
    pub fn database_exists(&self) -> bool {
        true
    }

    /// Whether a table with this name exists in the catalog.
    pub async fn table_exists(&self, table: impl Into<String>) -> StoreResult<bool> {
        let table = table.into();
        self.db.execute(move |conn| table_exists_sync(conn, &table)).await
    }

    /// Whether `table` has a column with this name.
    pub async fn column_exists(
        &self,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> StoreResult<bool> {
        let table = table.into();
        let column = column.into();
        self.db
            .execute(move |conn| {
                let found: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2)",
                    rusqlite::params![table, column],
                    |row| row.get(0),
                )?;
                Ok(found)
            })
            .await
    }

    /// All user table names, in catalog order.
    ///
    /// Names carrying the engine's reserved `sqlite_` prefix are
    /// excluded.
    pub async fn table_names(&self) -> StoreResult<Vec<String>> {
        self.db
            .execute(|conn| {
                let sql = format!(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '{RESERVED_PREFIX}%'"
                );
                let mut stmt = conn.prepare(&sql)?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
    }

    // ── data operations ──────────────────────────────────────────────

    /// Delete every row of `table`, returning the affected-row count.
    ///
    /// Leaves the table's auto-increment sequence untouched; use
    /// [`SqliteProvider::write_increment`] with 0 to reset it.
    pub async fn truncate(&self, table: impl Into<String>) -> StoreResult<usize> {
        let table = dialect::quote_identifier(&table.into())?;
        self.db
            .execute(move |conn| {
                let affected = conn.execute(&format!("DELETE FROM {table}"), [])?;
                debug!(table = %table, affected, "table truncated");
                Ok(affected)
            })
            .await
    }

    /// Execute a caller-supplied INSERT and return the generated key.
    ///
    /// Equivalent to batching `SELECT last_insert_rowid()` after the
    /// insert: the rowid is read on the same connection immediately
    /// after execution. Fails with [`StoreError::NoGeneratedKey`] if
    /// the insert touched no rows.
    pub async fn insert_returning_id(&self, sql: impl Into<String>) -> StoreResult<i64> {
        let sql = sql.into();
        self.db
            .execute(move |conn| {
                let affected = conn.execute(&sql, [])?;
                if affected == 0 {
                    return Err(StoreError::NoGeneratedKey(sql));
                }
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    // ── size & maintenance ───────────────────────────────────────────

    /// Logical database size in bytes: `page_count * page_size`.
    ///
    /// This is the engine's view of the database, not the exact on-disk
    /// footprint (WAL and free pages skew the file); see
    /// [`SqliteProvider::database_file_size`] for the filesystem figure.
    pub async fn database_size(&self) -> StoreResult<u64> {
        self.db
            .execute(|conn| {
                let pages: u64 = conn.pragma_query_value(None, "page_count", |row| row.get(0))?;
                let page_size: u64 = conn.pragma_query_value(None, "page_size", |row| row.get(0))?;
                Ok(pages * page_size)
            })
            .await
    }

    /// Exact on-disk size of the database file, or `None` for an
    /// in-memory database.
    pub fn database_file_size(&self) -> StoreResult<Option<u64>> {
        match self.db.path() {
            Some(path) => Ok(Some(std::fs::metadata(path)?.len())),
            None => Ok(None),
        }
    }

    /// Reclaim free space: VACUUM, truncate the write-ahead log, and
    /// let the query planner re-analyze.
    ///
    /// Holds the provider's exclusive maintenance lock for the duration.
    pub async fn shrink(&self) -> StoreResult<()> {
        let _guard = self.maintenance.lock().await;
        info!("shrinking database");
        self.db
            .execute(|conn| {
                conn.execute_batch("VACUUM;")?;
                // wal_checkpoint returns a (busy, log, checkpointed) row.
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE);", [], |_row| Ok(()))?;
                conn.execute_batch("PRAGMA optimize;")?;
                Ok(())
            })
            .await
    }

    /// Rebuild every index from scratch, under the maintenance lock.
    pub async fn rebuild_indexes(&self) -> StoreResult<()> {
        let _guard = self.maintenance.lock().await;
        info!("rebuilding indexes");
        self.db
            .execute(|conn| {
                conn.execute_batch("REINDEX;")?;
                Ok(())
            })
            .await
    }

    // ── auto-increment sequence ──────────────────────────────────────

    /// Last sequence value the engine handed out for `table`.
    ///
    /// `None` if the table has never had an auto-incremented insert —
    /// including when the schema has no AUTOINCREMENT table at all and
    /// `sqlite_sequence` itself does not exist yet.
    pub async fn read_increment(&self, table: impl Into<String>) -> StoreResult<Option<i64>> {
        let table = table.into();
        self.db
            .execute(move |conn| {
                if !table_exists_sync(conn, "sqlite_sequence")? {
                    return Ok(None);
                }
                match conn.query_row(
                    "SELECT seq FROM sqlite_sequence WHERE name = ?1",
                    [&table],
                    |row| row.get(0),
                ) {
                    Ok(seq) => Ok(Some(seq)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    /// Overwrite the stored sequence value for `table`.
    ///
    /// The next auto-incremented insert yields `value + 1`. Fails if
    /// the schema has no AUTOINCREMENT table (no `sqlite_sequence`).
    pub async fn write_increment(&self, table: impl Into<String>, value: i64) -> StoreResult<()> {
        let table = table.into();
        self.db
            .execute(move |conn| {
                if !table_exists_sync(conn, "sqlite_sequence")? {
                    return Err(StoreError::InvalidArgument(
                        "schema has no AUTOINCREMENT table; sqlite_sequence does not exist".into(),
                    ));
                }
                let updated = conn.execute(
                    "UPDATE sqlite_sequence SET seq = ?2 WHERE name = ?1",
                    rusqlite::params![table, value],
                )?;
                if updated == 0 {
                    conn.execute(
                        "INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2)",
                        rusqlite::params![table, value],
                    )?;
                }
                debug!(table = %table, value, "sequence value written");
                Ok(())
            })
            .await
    }

    // ── blob streaming ───────────────────────────────────────────────

    /// Scoped incremental access to one BLOB value.
    ///
    /// Opens a seekable [`Blob`] handle bound to the value at
    /// (`table`, `column`, `row_id`), passes it to `f`, and closes the
    /// handle when `f` returns — the engine handle can never outlive the
    /// call. The blob is writable unless `read_only` is set; writes
    /// cannot change the value's size (pre-size with `zeroblob(n)`).
    pub async fn with_blob<T, F>(
        &self,
        table: impl Into<String>,
        column: impl Into<String>,
        row_id: i64,
        read_only: bool,
        f: F,
    ) -> StoreResult<T>
    where
        F: FnOnce(&mut Blob<'_>) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let table = table.into();
        let column = column.into();
        self.db
            .execute(move |conn| {
                let mut blob =
                    conn.blob_open(DatabaseName::Main, &table, &column, row_id, read_only)?;
                let result = f(&mut blob);
                blob.close()?;
                result
            })
            .await
    }
}

// ── connection-level helpers ─────────────────────────────────────────

/// Catalog lookup for a table name, usable from inside `execute` closures.
fn table_exists_sync(conn: &Connection, table: &str) -> StoreResult<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [table],
        |row| row.get(0),
    )?;
    Ok(found)
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom, Write};

    use super::*;

    async fn setup() -> SqliteProvider {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        SqliteProvider::new(db)
    }

    #[tokio::test]
    async fn database_always_exists() {
        let provider = setup().await;
        assert!(provider.database_exists());
    }

    #[tokio::test]
    async fn table_exists_follows_catalog() {
        let provider = setup().await;
        assert!(provider.table_exists("items").await.unwrap());
        assert!(!provider.table_exists("nonexistent").await.unwrap());
    }

    #[tokio::test]
    async fn column_exists_follows_catalog() {
        let provider = setup().await;
        assert!(provider.column_exists("items", "deleted").await.unwrap());
        assert!(!provider.column_exists("items", "nonexistent").await.unwrap());
        assert!(!provider.column_exists("nonexistent", "deleted").await.unwrap());
    }

    #[tokio::test]
    async fn table_names_exclude_reserved_prefix() {
        let provider = setup().await;

        // Force sqlite_sequence into existence via an AUTOINCREMENT insert.
        provider
            .insert_returning_id(
                "INSERT INTO items (name, created_on_utc, updated_on_utc) VALUES ('x', 0, 0)",
            )
            .await
            .unwrap();

        let names = provider.table_names().await.unwrap();
        assert!(names.contains(&"items".to_string()));
        assert!(!names.iter().any(|n| n.starts_with(RESERVED_PREFIX)));
    }

    #[tokio::test]
    async fn truncate_returns_affected_rows() {
        let provider = setup().await;
        for i in 0..3 {
            provider
                .insert_returning_id(format!(
                    "INSERT INTO items (name, created_on_utc, updated_on_utc) VALUES ('{i}', 0, 0)"
                ))
                .await
                .unwrap();
        }

        let affected = provider.truncate("items").await.unwrap();
        assert_eq!(affected, 3);
        assert_eq!(provider.truncate("items").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn truncate_rejects_empty_table_name() {
        let provider = setup().await;
        let err = provider.truncate("").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn insert_returning_id_yields_generated_key() {
        let provider = setup().await;
        let first = provider
            .insert_returning_id(
                "INSERT INTO items (name, created_on_utc, updated_on_utc) VALUES ('a', 0, 0)",
            )
            .await
            .unwrap();
        let second = provider
            .insert_returning_id(
                "INSERT INTO items (name, created_on_utc, updated_on_utc) VALUES ('b', 0, 0)",
            )
            .await
            .unwrap();
        assert!(first > 0);
        assert_eq!(second, first + 1);
    }

    #[tokio::test]
    async fn read_increment_is_none_before_first_insert() {
        let provider = setup().await;
        assert_eq!(provider.read_increment("items").await.unwrap(), None);
    }

    #[tokio::test]
    async fn increment_round_trip() {
        let provider = setup().await;
        let id = provider
            .insert_returning_id(
                "INSERT INTO items (name, created_on_utc, updated_on_utc) VALUES ('a', 0, 0)",
            )
            .await
            .unwrap();
        assert_eq!(provider.read_increment("items").await.unwrap(), Some(id));

        provider.write_increment("items", 500).await.unwrap();
        assert_eq!(provider.read_increment("items").await.unwrap(), Some(500));

        let next = provider
            .insert_returning_id(
                "INSERT INTO items (name, created_on_utc, updated_on_utc) VALUES ('b', 0, 0)",
            )
            .await
            .unwrap();
        assert_eq!(next, 501);
    }

    #[tokio::test]
    async fn database_size_is_positive() {
        let provider = setup().await;
        assert!(provider.database_size().await.unwrap() > 0);
    }

    #[tokio::test]
    async fn maintenance_operations_succeed() {
        let provider = setup().await;
        provider.shrink().await.unwrap();
        provider.rebuild_indexes().await.unwrap();
    }

    #[tokio::test]
    async fn blob_read_write_seek() {
        let provider = setup().await;
        let row_id = provider
            .database()
            .execute(|conn| {
                conn.execute_batch("CREATE TABLE payloads (id INTEGER PRIMARY KEY, data BLOB)")?;
                conn.execute("INSERT INTO payloads (data) VALUES (zeroblob(8))", [])?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .unwrap();

        provider
            .with_blob("payloads", "data", row_id, false, |blob| {
                blob.write_all(b"litebrid")?;
                Ok(())
            })
            .await
            .unwrap();

        let tail = provider
            .with_blob("payloads", "data", row_id, true, |blob| {
                blob.seek(SeekFrom::Start(4))?;
                let mut buf = Vec::new();
                blob.read_to_end(&mut buf)?;
                Ok(buf)
            })
            .await
            .unwrap();
        assert_eq!(tail, b"brid");
    }
}
