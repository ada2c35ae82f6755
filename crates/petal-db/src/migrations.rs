//! # Database Migrations
//!
//! ```text
//! Startup
//!   │
//!   ▼
//! _sqlx_migrations present? ── no ──► create it
//!   │
//!   ▼
//! embedded vs applied
//!   ├── 001_initial_schema.sql ✓ (already applied)
//!   └── 00N_next.sql           ⬜ (pending, runs now)
//! ```
//!
//! New schema changes go in a new `migrations/sqlite/NNN_description.sql`.
//! Applied files are never edited.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded at compile time from `migrations/sqlite/`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(embedded = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}
