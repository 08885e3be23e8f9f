//! # litebridge-store
//!
//! SQLite data-provider adapter: translates a generic data-access
//! contract into SQLite-dialect SQL and delegates execution to a shared
//! connection handle.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  ItemStore        (entity CRUD, tombstones)  │
//! │  SqliteProvider   (catalog, maintenance,     │
//! │                    sequences, blob streams)  │
//! ├──────────────────────────────────────────────┤
//! │  dialect          (pure SQL text helpers)    │
//! ├──────────────────────────────────────────────┤
//! │  Database         (rusqlite WAL + mmap)      │
//! │  Migrations       (versioned, transactional) │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use litebridge_store::{Database, ItemStore, SqliteProvider};
//!
//! let db = Database::open_and_migrate("data/litebridge.db").await?;
//! let provider = SqliteProvider::new(db.clone());
//! let items = ItemStore::new(db);
//! ```
//!
//! The adapter never retries: classify failures with
//! [`StoreError::is_transient`] / [`StoreError::is_unique_violation`]
//! and decide at the call site.

pub mod db;
pub mod dialect;
pub mod error;
pub mod item_store;
pub mod migration;
pub mod provider;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use item_store::{Item, ItemStore, NewItem};
pub use provider::SqliteProvider;
