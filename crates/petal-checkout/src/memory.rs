//! # In-Memory Store
//!
//! A [`Store`] adapter over plain collections, used by the service tests
//! and for demos without a database.
//!
//! ## Transaction Model
//! ```text
//! begin()  ── lock state ──► clone into `working`
//!              │
//!              ▼
//!          reads / writes touch `working` only
//!              │
//!    commit() ─┴─► write `working` back, release lock
//!    drop()   ───► discard `working`, release lock
//! ```
//!
//! The lock is held for the lifetime of the transaction, so transactions
//! are fully serialised.
//!
//! ## Fault Injection
//! [`MemoryStore::inject_fault`] makes a named write step (or every read)
//! fail until [`MemoryStore::clear_faults`] is called.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use petal_core::{
    Cart, CartItem, CartStatus, Discount, InventoryTransaction, Order, OrderAddress, OrderItem,
    OrderStatus, OrderStatusHistory, PaymentTransaction, Product, ProductVariant, Refund,
};

use crate::store::{
    CartStore, CatalogStore, DiscountStore, InventoryStore, OrderStore, Store, StoreError,
    StoreResult, StoreTx,
};

/// Steps that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Begin,
    Commit,
    /// Every `find_*` / `list_*` call.
    Reads,
    UpdateCart,
    InsertCartItem,
    InsertOrder,
    InsertOrderItem,
    InsertStatusHistory,
    InsertInventoryTransaction,
    InsertRefund,
}

/// Everything the store holds.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub products: BTreeMap<String, Product>,
    pub variants: BTreeMap<String, ProductVariant>,
    pub discounts: BTreeMap<String, Discount>,
    pub carts: Vec<Cart>,
    pub cart_items: Vec<CartItem>,
    /// (discount id, cart id) → redeemed at.
    pub redemptions: BTreeMap<(String, String), DateTime<Utc>>,
    pub orders: Vec<Order>,
    pub order_items: Vec<OrderItem>,
    pub order_addresses: Vec<OrderAddress>,
    pub status_history: Vec<OrderStatusHistory>,
    pub payments: Vec<PaymentTransaction>,
    pub refunds: Vec<Refund>,
    pub inventory: Vec<InventoryTransaction>,
    faults: HashSet<Fault>,
}

impl MemoryState {
    fn check(&self, fault: Fault) -> StoreResult<()> {
        if self.faults.contains(&fault) {
            return Err(StoreError::Backend(format!("injected fault at {:?}", fault)));
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<()> {
        self.check(Fault::Reads)
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn inject_fault(&self, fault: Fault) {
        self.state.lock().await.faults.insert(fault);
    }

    pub async fn clear_faults(&self) {
        self.state.lock().await.faults.clear();
    }

    pub async fn insert_product(&self, product: Product) {
        self.state
            .lock()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    pub async fn insert_variant(&self, variant: ProductVariant) {
        self.state
            .lock()
            .await
            .variants
            .insert(variant.id.clone(), variant);
    }

    pub async fn insert_discount(&self, discount: Discount) {
        self.state
            .lock()
            .await
            .discounts
            .insert(discount.id.clone(), discount);
    }

    /// A copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        guard.check(Fault::Begin)?;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

/// An open in-memory transaction.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, working } = *self;
        working.check(Fault::Commit)?;
        *guard = working;
        Ok(())
    }
}

fn oldest_first(mut carts: Vec<Cart>) -> Vec<Cart> {
    carts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    carts
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

// =============================================================================
// Carts
// =============================================================================

#[async_trait]
impl CartStore for MemoryTx {
    async fn find_cart(&mut self, cart_id: &str) -> StoreResult<Option<Cart>> {
        self.working.read()?;
        Ok(self.working.carts.iter().find(|c| c.id == cart_id).cloned())
    }

    async fn find_active_carts_by_session(&mut self, session_id: &str) -> StoreResult<Vec<Cart>> {
        self.working.read()?;
        Ok(oldest_first(
            self.working
                .carts
                .iter()
                .filter(|c| c.is_active() && c.session_id.as_deref() == Some(session_id))
                .cloned()
                .collect(),
        ))
    }

    async fn find_active_carts_by_user(&mut self, user_id: &str) -> StoreResult<Vec<Cart>> {
        self.working.read()?;
        Ok(oldest_first(
            self.working
                .carts
                .iter()
                .filter(|c| c.is_active() && c.user_id.as_deref() == Some(user_id))
                .cloned()
                .collect(),
        ))
    }

    async fn find_stale_carts(&mut self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Cart>> {
        self.working.read()?;
        Ok(oldest_first(
            self.working
                .carts
                .iter()
                .filter(|c| c.status == CartStatus::Active && c.last_activity_at < cutoff)
                .cloned()
                .collect(),
        ))
    }

    async fn insert_cart(&mut self, cart: &Cart) -> StoreResult<()> {
        if self.working.carts.iter().any(|c| c.id == cart.id) {
            return Err(StoreError::Conflict(format!("cart {} already exists", cart.id)));
        }
        self.working.carts.push(cart.clone());
        Ok(())
    }

    async fn update_cart(&mut self, cart: &Cart) -> StoreResult<()> {
        self.working.check(Fault::UpdateCart)?;
        let slot = self
            .working
            .carts
            .iter_mut()
            .find(|c| c.id == cart.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Cart".to_string(),
                id: cart.id.clone(),
            })?;
        *slot = cart.clone();
        Ok(())
    }

    async fn delete_cart(&mut self, cart_id: &str) -> StoreResult<u64> {
        let before = self.working.carts.len();
        self.working.carts.retain(|c| c.id != cart_id);
        let removed = (before - self.working.carts.len()) as u64;
        if removed > 0 {
            self.working.cart_items.retain(|i| i.cart_id != cart_id);
            self.working.redemptions.retain(|(_, cart), _| cart != cart_id);
        }
        Ok(removed)
    }

    async fn list_cart_items(&mut self, cart_id: &str) -> StoreResult<Vec<CartItem>> {
        self.working.read()?;
        Ok(self
            .working
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn find_cart_item(&mut self, item_id: &str) -> StoreResult<Option<CartItem>> {
        self.working.read()?;
        Ok(self.working.cart_items.iter().find(|i| i.id == item_id).cloned())
    }

    async fn insert_cart_item(&mut self, item: &CartItem) -> StoreResult<()> {
        self.working.check(Fault::InsertCartItem)?;
        if item.quantity < 1 {
            return Err(StoreError::Conflict("cart item quantity must be >= 1".to_string()));
        }
        if self
            .working
            .cart_items
            .iter()
            .any(|i| i.cart_id == item.cart_id && i.variant_id == item.variant_id)
        {
            return Err(StoreError::Conflict(format!(
                "variant {} already in cart {}",
                item.variant_id, item.cart_id
            )));
        }
        self.working.cart_items.push(item.clone());
        Ok(())
    }

    async fn update_cart_item(&mut self, item: &CartItem) -> StoreResult<()> {
        if item.quantity < 1 {
            return Err(StoreError::Conflict("cart item quantity must be >= 1".to_string()));
        }
        let slot = self
            .working
            .cart_items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "CartItem".to_string(),
                id: item.id.clone(),
            })?;
        *slot = item.clone();
        Ok(())
    }

    async fn delete_cart_item(&mut self, item_id: &str) -> StoreResult<u64> {
        let before = self.working.cart_items.len();
        self.working.cart_items.retain(|i| i.id != item_id);
        Ok((before - self.working.cart_items.len()) as u64)
    }

    async fn delete_cart_items(&mut self, cart_id: &str) -> StoreResult<u64> {
        let before = self.working.cart_items.len();
        self.working.cart_items.retain(|i| i.cart_id != cart_id);
        Ok((before - self.working.cart_items.len()) as u64)
    }
}

// =============================================================================
// Catalogue
// =============================================================================

#[async_trait]
impl CatalogStore for MemoryTx {
    async fn find_variant(&mut self, variant_id: &str) -> StoreResult<Option<ProductVariant>> {
        self.working.read()?;
        Ok(self.working.variants.get(variant_id).cloned())
    }

    async fn find_product(&mut self, product_id: &str) -> StoreResult<Option<Product>> {
        self.working.read()?;
        Ok(self.working.products.get(product_id).cloned())
    }

    async fn set_variant_stock(&mut self, variant_id: &str, stock_quantity: i64) -> StoreResult<()> {
        if stock_quantity < 0 {
            return Err(StoreError::Conflict("stock_quantity must be >= 0".to_string()));
        }
        let variant = self
            .working
            .variants
            .get_mut(variant_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "ProductVariant".to_string(),
                id: variant_id.to_string(),
            })?;
        variant.stock_quantity = stock_quantity;
        Ok(())
    }
}

// =============================================================================
// Discounts
// =============================================================================

#[async_trait]
impl DiscountStore for MemoryTx {
    async fn find_discount_by_code(&mut self, code: &str) -> StoreResult<Option<Discount>> {
        self.working.read()?;
        Ok(self
            .working
            .discounts
            .values()
            .find(|d| d.code == code)
            .cloned())
    }

    async fn increment_discount_usage(&mut self, discount_id: &str) -> StoreResult<bool> {
        let discount = self
            .working
            .discounts
            .get_mut(discount_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Discount".to_string(),
                id: discount_id.to_string(),
            })?;
        if discount.max_uses.is_some_and(|max| discount.used_count >= max) {
            return Ok(false);
        }
        discount.used_count += 1;
        Ok(true)
    }

    async fn has_redemption(&mut self, discount_id: &str, cart_id: &str) -> StoreResult<bool> {
        self.working.read()?;
        Ok(self
            .working
            .redemptions
            .contains_key(&(discount_id.to_string(), cart_id.to_string())))
    }

    async fn insert_redemption(
        &mut self,
        discount_id: &str,
        cart_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.working
            .redemptions
            .entry((discount_id.to_string(), cart_id.to_string()))
            .or_insert(at);
        Ok(())
    }

    async fn transfer_redemptions(&mut self, from_cart: &str, to_cart: &str) -> StoreResult<()> {
        let moved: Vec<_> = self
            .working
            .redemptions
            .iter()
            .filter(|((_, cart), _)| cart == from_cart)
            .map(|((discount, _), at)| (discount.clone(), *at))
            .collect();

        self.working.redemptions.retain(|(_, cart), _| cart != from_cart);
        for (discount, at) in moved {
            self.working
                .redemptions
                .entry((discount, to_cart.to_string()))
                .or_insert(at);
        }
        Ok(())
    }
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
impl OrderStore for MemoryTx {
    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        self.working.check(Fault::InsertOrder)?;
        self.working.orders.push(order.clone());
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> StoreResult<()> {
        self.working.check(Fault::InsertOrderItem)?;
        self.working.order_items.push(item.clone());
        Ok(())
    }

    async fn insert_order_address(&mut self, address: &OrderAddress) -> StoreResult<()> {
        self.working.order_addresses.push(address.clone());
        Ok(())
    }

    async fn insert_status_history(&mut self, entry: &OrderStatusHistory) -> StoreResult<()> {
        self.working.check(Fault::InsertStatusHistory)?;
        self.working.status_history.push(entry.clone());
        Ok(())
    }

    async fn find_order(&mut self, order_id: &str) -> StoreResult<Option<Order>> {
        self.working.read()?;
        Ok(self.working.orders.iter().find(|o| o.id == order_id).cloned())
    }

    async fn update_order_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        match self.working.orders.iter_mut().find(|o| o.id == order_id) {
            Some(order) => {
                order.status = status;
                order.updated_at = at;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn list_orders_by_user(&mut self, user_id: &str) -> StoreResult<Vec<Order>> {
        self.working.read()?;
        Ok(newest_first(
            self.working
                .orders
                .iter()
                .filter(|o| o.user_id.as_deref() == Some(user_id))
                .cloned()
                .collect(),
        ))
    }

    async fn list_orders_by_status(&mut self, status: OrderStatus) -> StoreResult<Vec<Order>> {
        self.working.read()?;
        Ok(newest_first(
            self.working
                .orders
                .iter()
                .filter(|o| o.status == status)
                .cloned()
                .collect(),
        ))
    }

    async fn list_order_items(&mut self, order_id: &str) -> StoreResult<Vec<OrderItem>> {
        self.working.read()?;
        Ok(self
            .working
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_order_addresses(&mut self, order_id: &str) -> StoreResult<Vec<OrderAddress>> {
        self.working.read()?;
        Ok(self
            .working
            .order_addresses
            .iter()
            .filter(|a| a.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_status_history(&mut self, order_id: &str) -> StoreResult<Vec<OrderStatusHistory>> {
        self.working.read()?;
        Ok(self
            .working
            .status_history
            .iter()
            .filter(|h| h.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_payment_transaction(&mut self, payment: &PaymentTransaction) -> StoreResult<()> {
        if !self.working.orders.iter().any(|o| o.id == payment.order_id) {
            return Err(StoreError::Conflict(format!(
                "order {} does not exist",
                payment.order_id
            )));
        }
        self.working.payments.push(payment.clone());
        Ok(())
    }

    async fn find_payment_transaction(
        &mut self,
        transaction_id: &str,
    ) -> StoreResult<Option<PaymentTransaction>> {
        self.working.read()?;
        Ok(self
            .working
            .payments
            .iter()
            .find(|p| p.id == transaction_id)
            .cloned())
    }

    async fn list_payment_transactions(
        &mut self,
        order_id: &str,
    ) -> StoreResult<Vec<PaymentTransaction>> {
        self.working.read()?;
        Ok(self
            .working
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_refund(&mut self, refund: &Refund) -> StoreResult<()> {
        self.working.check(Fault::InsertRefund)?;
        self.working.refunds.push(refund.clone());
        Ok(())
    }

    async fn list_refunds(&mut self, order_id: &str) -> StoreResult<Vec<Refund>> {
        self.working.read()?;
        Ok(self
            .working
            .refunds
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Inventory Ledger
// =============================================================================

#[async_trait]
impl InventoryStore for MemoryTx {
    async fn insert_inventory_transaction(&mut self, entry: &InventoryTransaction) -> StoreResult<()> {
        self.working.check(Fault::InsertInventoryTransaction)?;
        self.working.inventory.push(entry.clone());
        Ok(())
    }

    async fn unreconciled_balance(&mut self, variant_id: &str) -> StoreResult<i64> {
        self.working.read()?;
        Ok(self
            .working
            .inventory
            .iter()
            .filter(|t| t.variant_id == variant_id && !t.reconciled)
            .map(|t| t.quantity)
            .sum())
    }

    async fn mark_reconciled(&mut self, variant_id: &str) -> StoreResult<u64> {
        let mut count = 0;
        for entry in self
            .working
            .inventory
            .iter_mut()
            .filter(|t| t.variant_id == variant_id && !t.reconciled)
        {
            entry.reconciled = true;
            count += 1;
        }
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
