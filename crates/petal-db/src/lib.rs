//! # petal-db: SQLite Adapter for the Petal Storefront
//!
//! Implements the `petal-checkout` persistence ports over SQLite with sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Petal Data Flow                                  │
//! │                                                                         │
//! │  CartManager::add_item / OrderService::create_order                    │
//! │       │  store.begin()                                                  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     petal-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  SqliteStore  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │───►│  SqliteTx     │    │  (embedded)  │  │   │
//! │  │   │               │    │  (ports)      │    │ 001_init.sql │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (petal.db, WAL)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Port implementations and admin repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use petal_checkout::{CartManager, StorefrontConfig};
//! use petal_db::{Database, DbConfig};
//!
//! let config = StorefrontConfig::load_or_default(None);
//! let db = Database::new(DbConfig::from_settings(&config.database)).await?;
//!
//! let carts = CartManager::new(Arc::new(db.store()), &config);
//! let cart = carts.get_or_create("session-abc", None).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{CatalogRepository, DiscountRepository, SqliteStore, SqliteTx};
