//! Carts and cart lines.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use petal_checkout::store::CartStore;
use petal_checkout::StoreResult;
use petal_core::composite::{composites_to_json, parse_composites_str};
use petal_core::{Cart, CartItem};

use super::{parse_enum, SqliteTx};
use crate::error::{DbError, DbResult};

const CART_COLUMNS: &str = "id, session_id, user_id, status, discount_code, discount_cents, \
     shipping_discount_cents, last_activity_at, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, cart_id, variant_id, product_id, quantity, price_cents, composites, created_at, updated_at";

#[derive(Debug, FromRow)]
struct CartRow {
    id: String,
    session_id: Option<String>,
    user_id: Option<String>,
    status: String,
    discount_code: Option<String>,
    discount_cents: i64,
    shipping_discount_cents: i64,
    last_activity_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
    type Error = DbError;

    fn try_from(row: CartRow) -> DbResult<Self> {
        Ok(Cart {
            status: parse_enum("carts.status", &row.status)?,
            id: row.id,
            session_id: row.session_id,
            user_id: row.user_id,
            discount_code: row.discount_code,
            discount_cents: row.discount_cents,
            shipping_discount_cents: row.shipping_discount_cents,
            last_activity_at: row.last_activity_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CartItemRow {
    id: String,
    cart_id: String,
    variant_id: String,
    product_id: String,
    quantity: i64,
    price_cents: i64,
    composites: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        CartItem {
            composites: parse_composites_str(&row.composites),
            id: row.id,
            cart_id: row.cart_id,
            variant_id: row.variant_id,
            product_id: row.product_id,
            quantity: row.quantity,
            price_cents: row.price_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn carts(rows: Vec<CartRow>) -> DbResult<Vec<Cart>> {
    rows.into_iter().map(Cart::try_from).collect()
}

impl SqliteTx {
    async fn fetch_carts(&mut self, filter: &str, key: &str) -> DbResult<Vec<Cart>> {
        let sql = format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE {filter} AND status = 'active' \
             ORDER BY created_at ASC"
        );
        let rows: Vec<CartRow> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_all(&mut *self.tx)
            .await?;
        carts(rows)
    }
}

#[async_trait]
impl CartStore for SqliteTx {
    async fn find_cart(&mut self, cart_id: &str) -> StoreResult<Option<Cart>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM carts WHERE id = ?");
        let row: Option<CartRow> = sqlx::query_as(&sql)
            .bind(cart_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Cart::try_from).transpose()?)
    }

    async fn find_active_carts_by_session(&mut self, session_id: &str) -> StoreResult<Vec<Cart>> {
        Ok(self.fetch_carts("session_id = ?", session_id).await?)
    }

    async fn find_active_carts_by_user(&mut self, user_id: &str) -> StoreResult<Vec<Cart>> {
        Ok(self.fetch_carts("user_id = ?", user_id).await?)
    }

    async fn find_stale_carts(&mut self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Cart>> {
        let sql = format!(
            "SELECT {CART_COLUMNS} FROM carts \
             WHERE status = 'active' AND last_activity_at < ? ORDER BY created_at ASC"
        );
        let rows: Vec<CartRow> = sqlx::query_as(&sql)
            .bind(cutoff)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(carts(rows)?)
    }

    async fn insert_cart(&mut self, cart: &Cart) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (
                id, session_id, user_id, status, discount_code, discount_cents,
                shipping_discount_cents, last_activity_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&cart.id)
        .bind(&cart.session_id)
        .bind(&cart.user_id)
        .bind(cart.status.as_str())
        .bind(&cart.discount_code)
        .bind(cart.discount_cents)
        .bind(cart.shipping_discount_cents)
        .bind(cart.last_activity_at)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn update_cart(&mut self, cart: &Cart) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE carts SET
                session_id = ?, user_id = ?, status = ?, discount_code = ?,
                discount_cents = ?, shipping_discount_cents = ?,
                last_activity_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&cart.session_id)
        .bind(&cart.user_id)
        .bind(cart.status.as_str())
        .bind(&cart.discount_code)
        .bind(cart.discount_cents)
        .bind(cart.shipping_discount_cents)
        .bind(cart.last_activity_at)
        .bind(cart.updated_at)
        .bind(&cart.id)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart", &cart.id).into());
        }
        Ok(())
    }

    async fn delete_cart(&mut self, cart_id: &str) -> StoreResult<u64> {
        // lines and redemptions go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM carts WHERE id = ?")
            .bind(cart_id)
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }

    async fn list_cart_items(&mut self, cart_id: &str) -> StoreResult<Vec<CartItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = ? ORDER BY created_at ASC, id ASC"
        );
        let rows: Vec<CartItemRow> = sqlx::query_as(&sql)
            .bind(cart_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(CartItem::from).collect())
    }

    async fn find_cart_item(&mut self, item_id: &str) -> StoreResult<Option<CartItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM cart_items WHERE id = ?");
        let row: Option<CartItemRow> = sqlx::query_as(&sql)
            .bind(item_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(CartItem::from))
    }

    async fn insert_cart_item(&mut self, item: &CartItem) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (
                id, cart_id, variant_id, product_id, quantity, price_cents,
                composites, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.cart_id)
        .bind(&item.variant_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.price_cents)
        .bind(composites_to_json(&item.composites))
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn update_cart_item(&mut self, item: &CartItem) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE cart_items SET
                cart_id = ?, quantity = ?, composites = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&item.cart_id)
        .bind(item.quantity)
        .bind(composites_to_json(&item.composites))
        .bind(item.updated_at)
        .bind(&item.id)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartItem", &item.id).into());
        }
        Ok(())
    }

    async fn delete_cart_item(&mut self, item_id: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ?")
            .bind(item_id)
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }

    async fn delete_cart_items(&mut self, cart_id: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
            .bind(cart_id)
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }
}
