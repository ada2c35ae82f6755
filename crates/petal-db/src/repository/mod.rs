//! # Repository Module
//!
//! SQLite implementations of the petal-checkout persistence ports.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SqliteStore::begin() ──► SqliteTx { sqlx::Transaction }                │
//! │                                                                         │
//! │  impl CartStore      for SqliteTx   ← cart.rs                           │
//! │  impl CatalogStore   for SqliteTx   ← catalog.rs                        │
//! │  impl DiscountStore  for SqliteTx   ← discount.rs                       │
//! │  impl OrderStore     for SqliteTx   ← order.rs                          │
//! │  impl InventoryStore for SqliteTx   ← inventory.rs                      │
//! │                                                                         │
//! │  CatalogRepository / DiscountRepository                                 │
//! │    pool-level admin writes used by the seed tool and tests              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are read into `*Row` structs with `sqlx::FromRow` and converted to
//! domain types; enum text and JSON columns are parsed on the way out.

pub mod cart;
pub mod catalog;
pub mod discount;
pub mod inventory;
pub mod order;

use std::str::FromStr;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use petal_checkout::{Store, StoreResult, StoreTx};

use crate::error::{DbError, DbResult};

pub use catalog::CatalogRepository;
pub use discount::DiscountRepository;

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await.map_err(DbError::from)?;
        Ok(Box::new(SqliteTx { tx }))
    }
}

/// One open SQLite transaction. Rolled back on drop unless committed.
pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTx for SqliteTx {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(DbError::from)?;
        debug!("Transaction committed");
        Ok(())
    }
}

// =============================================================================
// Column Decoding
// =============================================================================

pub(crate) fn parse_enum<T>(column: &'static str, raw: &str) -> DbResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e| DbError::decode(column, e))
}

pub(crate) fn parse_json<T: DeserializeOwned>(column: &'static str, raw: &str) -> DbResult<T> {
    serde_json::from_str(raw).map_err(|e| DbError::decode(column, e))
}

pub(crate) fn to_json<T: serde::Serialize>(column: &'static str, value: &T) -> DbResult<String> {
    serde_json::to_string(value).map_err(|e| DbError::decode(column, e))
}
