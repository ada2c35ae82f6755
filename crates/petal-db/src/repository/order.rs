//! Orders, their snapshots, status history, payments and refunds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use petal_checkout::store::OrderStore;
use petal_checkout::StoreResult;
use petal_core::composite::{composites_to_json, parse_composites_str};
use petal_core::{
    Order, OrderAddress, OrderItem, OrderStatus, OrderStatusHistory, PaymentTransaction, Refund,
};

use super::{parse_enum, SqliteTx};
use crate::error::{DbError, DbResult};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    user_id: Option<String>,
    cart_id: Option<String>,
    status: String,
    email: String,
    first_name: String,
    last_name: String,
    subtotal_cents: i64,
    tax_cents: i64,
    shipping_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    discount_code: Option<String>,
    payment_intent_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DbError;

    fn try_from(row: OrderRow) -> DbResult<Self> {
        Ok(Order {
            status: parse_enum("orders.status", &row.status)?,
            id: row.id,
            user_id: row.user_id,
            cart_id: row.cart_id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            subtotal_cents: row.subtotal_cents,
            tax_cents: row.tax_cents,
            shipping_cents: row.shipping_cents,
            discount_cents: row.discount_cents,
            total_cents: row.total_cents,
            discount_code: row.discount_code,
            payment_intent_ref: row.payment_intent_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: String,
    order_id: String,
    product_id: String,
    variant_id: String,
    product_name: String,
    variant_name: String,
    quantity: i64,
    price_cents: i64,
    composites: String,
    created_at: DateTime<Utc>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            composites: parse_composites_str(&row.composites),
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            variant_id: row.variant_id,
            product_name: row.product_name,
            variant_name: row.variant_name,
            quantity: row.quantity,
            price_cents: row.price_cents,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AddressRow {
    id: String,
    order_id: String,
    address_type: String,
    email: String,
    first_name: String,
    last_name: String,
    address1: String,
    address2: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    phone: Option<String>,
}

impl TryFrom<AddressRow> for OrderAddress {
    type Error = DbError;

    fn try_from(row: AddressRow) -> DbResult<Self> {
        Ok(OrderAddress {
            address_type: parse_enum("order_addresses.address_type", &row.address_type)?,
            id: row.id,
            order_id: row.order_id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            address1: row.address1,
            address2: row.address2,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: row.country,
            phone: row.phone,
        })
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    id: String,
    order_id: String,
    status: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for OrderStatusHistory {
    type Error = DbError;

    fn try_from(row: HistoryRow) -> DbResult<Self> {
        Ok(OrderStatusHistory {
            status: parse_enum("order_status_history.status", &row.status)?,
            id: row.id,
            order_id: row.order_id,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: String,
    order_id: String,
    amount_cents: i64,
    method: String,
    status: String,
    intent_ref: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentTransaction {
    type Error = DbError;

    fn try_from(row: PaymentRow) -> DbResult<Self> {
        Ok(PaymentTransaction {
            status: parse_enum("payment_transactions.status", &row.status)?,
            id: row.id,
            order_id: row.order_id,
            amount_cents: row.amount_cents,
            method: row.method,
            intent_ref: row.intent_ref,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RefundRow {
    id: String,
    order_id: String,
    transaction_id: String,
    amount_cents: i64,
    reason: Option<String>,
    refund_ref: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RefundRow> for Refund {
    fn from(row: RefundRow) -> Self {
        Refund {
            id: row.id,
            order_id: row.order_id,
            transaction_id: row.transaction_id,
            amount_cents: row.amount_cents,
            reason: row.reason,
            refund_ref: row.refund_ref,
            created_at: row.created_at,
        }
    }
}

const ORDER_COLUMNS: &str = "id, user_id, cart_id, status, email, first_name, last_name, \
     subtotal_cents, tax_cents, shipping_cents, discount_cents, total_cents, discount_code, \
     payment_intent_ref, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, order_id, amount_cents, method, status, intent_ref, created_at";

fn convert<R, T>(rows: Vec<R>) -> DbResult<Vec<T>>
where
    T: TryFrom<R, Error = DbError>,
{
    rows.into_iter().map(T::try_from).collect()
}

impl SqliteTx {
    async fn fetch_orders(&mut self, filter: &str, key: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE {filter} ORDER BY created_at DESC, rowid DESC"
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_all(&mut *self.tx)
            .await?;
        convert(rows)
    }
}

// =============================================================================
// Port
// =============================================================================

#[async_trait]
impl OrderStore for SqliteTx {
    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, cart_id, status, email, first_name, last_name,
                subtotal_cents, tax_cents, shipping_cents, discount_cents, total_cents,
                discount_code, payment_intent_ref, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(&order.cart_id)
        .bind(order.status.as_str())
        .bind(&order.email)
        .bind(&order.first_name)
        .bind(&order.last_name)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.shipping_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(&order.discount_code)
        .bind(&order.payment_intent_ref)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, variant_id, product_name, variant_name,
                quantity, price_cents, composites, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.variant_id)
        .bind(&item.product_name)
        .bind(&item.variant_name)
        .bind(item.quantity)
        .bind(item.price_cents)
        .bind(composites_to_json(&item.composites))
        .bind(item.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn insert_order_address(&mut self, address: &OrderAddress) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_addresses (
                id, order_id, address_type, email, first_name, last_name,
                address1, address2, city, state, postal_code, country, phone
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&address.id)
        .bind(&address.order_id)
        .bind(address.address_type.as_str())
        .bind(&address.email)
        .bind(&address.first_name)
        .bind(&address.last_name)
        .bind(&address.address1)
        .bind(&address.address2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(&address.phone)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn insert_status_history(&mut self, entry: &OrderStatusHistory) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO order_status_history (id, order_id, status, note, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.order_id)
        .bind(entry.status.as_str())
        .bind(&entry.note)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn find_order(&mut self, order_id: &str) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Order::try_from).transpose()?)
    }

    async fn update_order_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(at)
            .bind(order_id)
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }

    async fn list_orders_by_user(&mut self, user_id: &str) -> StoreResult<Vec<Order>> {
        Ok(self.fetch_orders("user_id = ?", user_id).await?)
    }

    async fn list_orders_by_status(&mut self, status: OrderStatus) -> StoreResult<Vec<Order>> {
        Ok(self.fetch_orders("status = ?", status.as_str()).await?)
    }

    async fn list_order_items(&mut self, order_id: &str) -> StoreResult<Vec<OrderItem>> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT id, order_id, product_id, variant_id, product_name, variant_name, \
             quantity, price_cents, composites, created_at \
             FROM order_items WHERE order_id = ? ORDER BY rowid ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn list_order_addresses(&mut self, order_id: &str) -> StoreResult<Vec<OrderAddress>> {
        let rows: Vec<AddressRow> = sqlx::query_as(
            "SELECT id, order_id, address_type, email, first_name, last_name, address1, \
             address2, city, state, postal_code, country, phone \
             FROM order_addresses WHERE order_id = ? ORDER BY rowid ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(convert(rows)?)
    }

    async fn list_status_history(&mut self, order_id: &str) -> StoreResult<Vec<OrderStatusHistory>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT id, order_id, status, note, created_at FROM order_status_history \
             WHERE order_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(convert(rows)?)
    }

    async fn insert_payment_transaction(&mut self, payment: &PaymentTransaction) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_transactions (
                id, order_id, amount_cents, method, status, intent_ref, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.amount_cents)
        .bind(&payment.method)
        .bind(payment.status.as_str())
        .bind(&payment.intent_ref)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn find_payment_transaction(
        &mut self,
        transaction_id: &str,
    ) -> StoreResult<Option<PaymentTransaction>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payment_transactions WHERE id = ?");
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(transaction_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(PaymentTransaction::try_from).transpose()?)
    }

    async fn list_payment_transactions(
        &mut self,
        order_id: &str,
    ) -> StoreResult<Vec<PaymentTransaction>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment_transactions \
             WHERE order_id = ? ORDER BY created_at ASC, rowid ASC"
        );
        let rows: Vec<PaymentRow> = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(convert(rows)?)
    }

    async fn insert_refund(&mut self, refund: &Refund) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refunds (
                id, order_id, transaction_id, amount_cents, reason, refund_ref, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&refund.id)
        .bind(&refund.order_id)
        .bind(&refund.transaction_id)
        .bind(refund.amount_cents)
        .bind(&refund.reason)
        .bind(&refund.refund_ref)
        .bind(refund.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn list_refunds(&mut self, order_id: &str) -> StoreResult<Vec<Refund>> {
        let rows: Vec<RefundRow> = sqlx::query_as(
            "SELECT id, order_id, transaction_id, amount_cents, reason, refund_ref, created_at \
             FROM refunds WHERE order_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(rows.into_iter().map(Refund::from).collect())
    }
}
