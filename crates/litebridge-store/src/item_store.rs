//! Persistence for the catalog item entity.
//!
//! Items carry a surrogate engine-assigned key, visibility flags, and a
//! soft-delete tombstone: deleting an item flips `deleted` instead of
//! removing the row, so the identity key stays stable for the row's
//! whole life.

use chrono::Utc;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::dialect;
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A catalog item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Engine-assigned identity key. Immutable once created.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Optional long-form description.
    pub description: Option<String>,
    /// Page-size hint for listings of this item's children.
    pub page_size: i64,
    /// Whether visibility is limited to specific stores.
    pub limited_to_stores: bool,
    /// Whether access-control rules apply.
    pub subject_to_acl: bool,
    /// Whether the item is publicly visible.
    pub published: bool,
    /// Tombstone flag; a deleted item is never physically removed.
    pub deleted: bool,
    /// Sort order within listings.
    pub display_order: i64,
    /// Unix timestamp (UTC) when the item was created.
    pub created_on_utc: i64,
    /// Unix timestamp (UTC) when the item was last updated.
    pub updated_on_utc: i64,
}

/// Fields required to create a new [`Item`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub page_size: i64,
    pub limited_to_stores: bool,
    pub subject_to_acl: bool,
    pub published: bool,
    pub display_order: i64,
}

// ═══════════════════════════════════════════════════════════════════════
//  Store
// ═══════════════════════════════════════════════════════════════════════

/// SQLite-backed store for [`Item`] records.
#[derive(Clone)]
pub struct ItemStore {
    db: Database,
}

impl ItemStore {
    /// Create a store over an open database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new item; the identity key is assigned by the engine.
    #[instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create(&self, new: NewItem) -> StoreResult<Item> {
        if new.name.is_empty() {
            return Err(StoreError::InvalidArgument(
                "item name must not be empty".into(),
            ));
        }

        let now = Utc::now().timestamp();
        let id = self
            .db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO items (name, description, page_size, limited_to_stores, \
                     subject_to_acl, published, deleted, display_order, created_on_utc, updated_on_utc) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8)",
                    rusqlite::params![
                        new.name,
                        new.description,
                        new.page_size,
                        new.limited_to_stores,
                        new.subject_to_acl,
                        new.published,
                        new.display_order,
                        now,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!(id, "item created");
        self.get(id).await
    }

    /// Fetch an item by its identity key, tombstoned or not.
    pub async fn get(&self, id: i64) -> StoreResult<Item> {
        self.db
            .execute(move |conn| {
                conn.query_row(
                    &format!("{SELECT_ITEM} WHERE id = ?1"),
                    [id],
                    map_item,
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                        entity: "item",
                        id: id.to_string(),
                    },
                    other => other.into(),
                })
            })
            .await
    }

    /// Write every mutable column of `item` and bump `updated_on_utc`.
    ///
    /// The identity key and creation timestamp are never touched.
    pub async fn update(&self, item: Item) -> StoreResult<Item> {
        let id = item.id;
        let now = Utc::now().timestamp();
        let updated = self
            .db
            .execute(move |conn| {
                let n = conn.execute(
                    "UPDATE items SET name = ?2, description = ?3, page_size = ?4, \
                     limited_to_stores = ?5, subject_to_acl = ?6, published = ?7, \
                     deleted = ?8, display_order = ?9, updated_on_utc = ?10 \
                     WHERE id = ?1",
                    rusqlite::params![
                        item.id,
                        item.name,
                        item.description,
                        item.page_size,
                        item.limited_to_stores,
                        item.subject_to_acl,
                        item.published,
                        item.deleted,
                        item.display_order,
                        now,
                    ],
                )?;
                Ok(n)
            })
            .await?;

        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "item",
                id: id.to_string(),
            });
        }
        self.get(id).await
    }

    /// Flip the tombstone flag. The row remains physically present.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: i64) -> StoreResult<()> {
        self.set_tombstone(id, true).await
    }

    /// Clear the tombstone flag, bringing a deleted item back.
    #[instrument(skip(self))]
    pub async fn restore(&self, id: i64) -> StoreResult<()> {
        self.set_tombstone(id, false).await
    }

    /// Published, non-tombstoned items ordered by display order, paged.
    pub async fn list_published(&self, skip: i64, take: i64) -> StoreResult<Vec<Item>> {
        let sql = dialect::paging_clause(
            &format!(
                "{SELECT_ITEM} WHERE published = 1 AND deleted = 0 ORDER BY display_order, id"
            ),
            skip,
            take,
        )?;
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let items = stmt
                    .query_map([], map_item)?
                    .collect::<Result<Vec<Item>, _>>()?;
                Ok(items)
            })
            .await
    }

    async fn set_tombstone(&self, id: i64, deleted: bool) -> StoreResult<()> {
        let now = Utc::now().timestamp();
        let updated = self
            .db
            .execute(move |conn| {
                let n = conn.execute(
                    "UPDATE items SET deleted = ?2, updated_on_utc = ?3 WHERE id = ?1",
                    rusqlite::params![id, deleted, now],
                )?;
                Ok(n)
            })
            .await?;

        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "item",
                id: id.to_string(),
            });
        }
        debug!(id, deleted, "tombstone updated");
        Ok(())
    }
}

// ── row mapping ──────────────────────────────────────────────────────

const SELECT_ITEM: &str = "SELECT id, name, description, page_size, limited_to_stores, \
     subject_to_acl, published, deleted, display_order, created_on_utc, updated_on_utc FROM items";

fn map_item(row: &Row<'_>) -> Result<Item, rusqlite::Error> {
    Ok(Item {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        page_size: row.get(3)?,
        limited_to_stores: row.get(4)?,
        subject_to_acl: row.get(5)?,
        published: row.get(6)?,
        deleted: row.get(7)?,
        display_order: row.get(8)?,
        created_on_utc: row.get(9)?,
        updated_on_utc: row.get(10)?,
    })
}

// ── tests ────────────────────────────────────────────────────────────
