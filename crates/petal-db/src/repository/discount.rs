//! Discount codes and the per-cart redemption ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use petal_checkout::store::DiscountStore;
use petal_checkout::StoreResult;
use petal_core::validation::normalize_discount_code;
use petal_core::Discount;

use super::{parse_enum, SqliteTx};
use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct DiscountRow {
    id: String,
    code: String,
    discount_type: String,
    value: i64,
    min_spend_cents: Option<i64>,
    max_uses: Option<i64>,
    used_count: i64,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    active: bool,
}

impl TryFrom<DiscountRow> for Discount {
    type Error = DbError;

    fn try_from(row: DiscountRow) -> DbResult<Self> {
        Ok(Discount {
            discount_type: parse_enum("discounts.discount_type", &row.discount_type)?,
            id: row.id,
            code: row.code,
            value: row.value,
            min_spend_cents: row.min_spend_cents,
            max_uses: row.max_uses,
            used_count: row.used_count,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            active: row.active,
        })
    }
}

const DISCOUNT_COLUMNS: &str = "id, code, discount_type, value, min_spend_cents, max_uses, \
     used_count, valid_from, valid_until, active";

// =============================================================================
// Port
// =============================================================================

#[async_trait]
impl DiscountStore for SqliteTx {
    async fn find_discount_by_code(&mut self, code: &str) -> StoreResult<Option<Discount>> {
        let sql = format!("SELECT {DISCOUNT_COLUMNS} FROM discounts WHERE code = ?");
        let row: Option<DiscountRow> = sqlx::query_as(&sql)
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Discount::try_from).transpose()?)
    }

    async fn increment_discount_usage(&mut self, discount_id: &str) -> StoreResult<bool> {
        // the cap is enforced in the same statement as the increment
        let result = sqlx::query(
            r#"
            UPDATE discounts SET used_count = used_count + 1
            WHERE id = ? AND (max_uses IS NULL OR used_count < max_uses)
            "#,
        )
        .bind(discount_id)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM discounts WHERE id = ?")
            .bind(discount_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        match exists {
            Some(_) => Ok(false),
            None => Err(DbError::not_found("Discount", discount_id).into()),
        }
    }

    async fn has_redemption(&mut self, discount_id: &str, cart_id: &str) -> StoreResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM discount_redemptions WHERE discount_id = ? AND cart_id = ?",
        )
        .bind(discount_id)
        .bind(cart_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(found.is_some())
    }

    async fn insert_redemption(
        &mut self,
        discount_id: &str,
        cart_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO discount_redemptions (discount_id, cart_id, redeemed_at) \
             VALUES (?, ?, ?)",
        )
        .bind(discount_id)
        .bind(cart_id)
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn transfer_redemptions(&mut self, from_cart: &str, to_cart: &str) -> StoreResult<()> {
        sqlx::query("UPDATE OR IGNORE discount_redemptions SET cart_id = ? WHERE cart_id = ?")
            .bind(to_cart)
            .bind(from_cart)
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::from)?;

        // rows left behind duplicated one the target already holds
        sqlx::query("DELETE FROM discount_redemptions WHERE cart_id = ?")
            .bind(from_cart)
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(())
    }
}

// =============================================================================
// Admin Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    /// Inserts or replaces a discount. The code is stored upper-case.
    /// `used_count` is kept for an existing row.
    pub async fn upsert(&self, discount: &Discount) -> DbResult<()> {
        let code = normalize_discount_code(&discount.code)
            .map_err(|e| DbError::decode("discounts.code", e))?;

        sqlx::query(
            r#"
            INSERT INTO discounts (
                id, code, discount_type, value, min_spend_cents, max_uses,
                used_count, valid_from, valid_until, active
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                code = excluded.code,
                discount_type = excluded.discount_type,
                value = excluded.value,
                min_spend_cents = excluded.min_spend_cents,
                max_uses = excluded.max_uses,
                valid_from = excluded.valid_from,
                valid_until = excluded.valid_until,
                active = excluded.active
            "#,
        )
        .bind(&discount.id)
        .bind(&code)
        .bind(discount.discount_type.as_str())
        .bind(discount.value)
        .bind(discount.min_spend_cents)
        .bind(discount.max_uses)
        .bind(discount.used_count)
        .bind(discount.valid_from)
        .bind(discount.valid_until)
        .bind(discount.active)
        .execute(&self.pool)
        .await?;

        debug!(code = %code, "Discount saved");
        Ok(())
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Discount>> {
        let code = normalize_discount_code(code).map_err(|e| DbError::decode("discounts.code", e))?;
        let sql = format!("SELECT {DISCOUNT_COLUMNS} FROM discounts WHERE code = ?");
        let row: Option<DiscountRow> = sqlx::query_as(&sql)
            .bind(&code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Discount::try_from).transpose()
    }
}
