//! # Persistence Ports
//!
//! The services never name a database. They open a transaction through
//! [`Store::begin`] and issue every read and write through the returned
//! [`StoreTx`].
//!
//! ## Transaction Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  let mut tx = store.begin().await?;                                     │
//! │                                                                         │
//! │  tx.find_cart(..)          ─┐                                           │
//! │  tx.find_variant(..)        │  all reads and writes see one snapshot    │
//! │  tx.insert_cart_item(..)    │                                           │
//! │  tx.update_cart(..)        ─┘                                           │
//! │                                                                         │
//! │  tx.commit().await?;       ← everything becomes visible at once         │
//! │                                                                         │
//! │  Dropping `tx` without commit rolls everything back.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The port is split by aggregate so adapters can keep one file per table
//! group. [`StoreTx`] is the union of all of them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use petal_core::{
    Cart, CartItem, Discount, InventoryTransaction, Order, OrderAddress, OrderItem, OrderStatus,
    OrderStatusHistory, PaymentTransaction, Product, ProductVariant, Refund,
};

// =============================================================================
// Store Error
// =============================================================================

/// Failure reported by a persistence adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Uniqueness, foreign-key or check constraint rejected the write.
    #[error("Constraint violated: {0}")]
    Conflict(String),

    #[error("Storage failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Store
// =============================================================================

/// Entry point to a persistence adapter.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a transaction.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
}

/// One open transaction over every aggregate.
#[async_trait]
pub trait StoreTx:
    CartStore + CatalogStore + DiscountStore + OrderStore + InventoryStore + Send
{
    /// Makes all writes visible. Dropping without commit rolls back.
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

// =============================================================================
// Carts
// =============================================================================

#[async_trait]
pub trait CartStore: Send {
    async fn find_cart(&mut self, cart_id: &str) -> StoreResult<Option<Cart>>;

    /// Active carts for a session, oldest first.
    async fn find_active_carts_by_session(&mut self, session_id: &str) -> StoreResult<Vec<Cart>>;

    /// Active carts for a user, oldest first.
    async fn find_active_carts_by_user(&mut self, user_id: &str) -> StoreResult<Vec<Cart>>;

    /// Active carts whose last activity is before `cutoff`.
    async fn find_stale_carts(&mut self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Cart>>;

    async fn insert_cart(&mut self, cart: &Cart) -> StoreResult<()>;

    async fn update_cart(&mut self, cart: &Cart) -> StoreResult<()>;

    /// Deletes the cart and, by cascade, its items. Returns rows affected.
    async fn delete_cart(&mut self, cart_id: &str) -> StoreResult<u64>;

    /// Lines of a cart in insertion order.
    async fn list_cart_items(&mut self, cart_id: &str) -> StoreResult<Vec<CartItem>>;

    async fn find_cart_item(&mut self, item_id: &str) -> StoreResult<Option<CartItem>>;

    async fn insert_cart_item(&mut self, item: &CartItem) -> StoreResult<()>;

    async fn update_cart_item(&mut self, item: &CartItem) -> StoreResult<()>;

    async fn delete_cart_item(&mut self, item_id: &str) -> StoreResult<u64>;

    async fn delete_cart_items(&mut self, cart_id: &str) -> StoreResult<u64>;
}

// =============================================================================
// Catalogue
// =============================================================================

#[async_trait]
pub trait CatalogStore: Send {
    async fn find_variant(&mut self, variant_id: &str) -> StoreResult<Option<ProductVariant>>;

    async fn find_product(&mut self, product_id: &str) -> StoreResult<Option<Product>>;

    /// Overwrites the reconciled on-hand figure.
    async fn set_variant_stock(&mut self, variant_id: &str, stock_quantity: i64) -> StoreResult<()>;
}

// =============================================================================
// Discounts
// =============================================================================

#[async_trait]
pub trait DiscountStore: Send {
    /// Looks up by normalised (upper-case) code.
    async fn find_discount_by_code(&mut self, code: &str) -> StoreResult<Option<Discount>>;

    /// Increments `used_count` unless `max_uses` is already reached.
    ///
    /// Returns `false` when the cap prevented the increment.
    async fn increment_discount_usage(&mut self, discount_id: &str) -> StoreResult<bool>;

    async fn has_redemption(&mut self, discount_id: &str, cart_id: &str) -> StoreResult<bool>;

    async fn insert_redemption(
        &mut self,
        discount_id: &str,
        cart_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Moves every redemption of `from_cart` onto `to_cart`, dropping any
    /// that `to_cart` already holds.
    async fn transfer_redemptions(&mut self, from_cart: &str, to_cart: &str) -> StoreResult<()>;
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
pub trait OrderStore: Send {
    async fn insert_order(&mut self, order: &Order) -> StoreResult<()>;

    async fn insert_order_item(&mut self, item: &OrderItem) -> StoreResult<()>;

    async fn insert_order_address(&mut self, address: &OrderAddress) -> StoreResult<()>;

    async fn insert_status_history(&mut self, entry: &OrderStatusHistory) -> StoreResult<()>;

    async fn find_order(&mut self, order_id: &str) -> StoreResult<Option<Order>>;

    async fn update_order_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Newest first.
    async fn list_orders_by_user(&mut self, user_id: &str) -> StoreResult<Vec<Order>>;

    /// Newest first.
    async fn list_orders_by_status(&mut self, status: OrderStatus) -> StoreResult<Vec<Order>>;

    async fn list_order_items(&mut self, order_id: &str) -> StoreResult<Vec<OrderItem>>;

    async fn list_order_addresses(&mut self, order_id: &str) -> StoreResult<Vec<OrderAddress>>;

    /// Oldest first.
    async fn list_status_history(&mut self, order_id: &str) -> StoreResult<Vec<OrderStatusHistory>>;

    async fn insert_payment_transaction(&mut self, payment: &PaymentTransaction) -> StoreResult<()>;

    async fn find_payment_transaction(
        &mut self,
        transaction_id: &str,
    ) -> StoreResult<Option<PaymentTransaction>>;

    async fn list_payment_transactions(
        &mut self,
        order_id: &str,
    ) -> StoreResult<Vec<PaymentTransaction>>;

    async fn insert_refund(&mut self, refund: &Refund) -> StoreResult<()>;

    async fn list_refunds(&mut self, order_id: &str) -> StoreResult<Vec<Refund>>;
}

// =============================================================================
// Inventory Ledger
// =============================================================================

#[async_trait]
pub trait InventoryStore: Send {
    async fn insert_inventory_transaction(&mut self, entry: &InventoryTransaction) -> StoreResult<()>;

    /// Σ quantity over unreconciled ledger rows for the variant.
    async fn unreconciled_balance(&mut self, variant_id: &str) -> StoreResult<i64>;

    /// Marks every unreconciled row for the variant as reconciled.
    async fn mark_reconciled(&mut self, variant_id: &str) -> StoreResult<u64>;
}
