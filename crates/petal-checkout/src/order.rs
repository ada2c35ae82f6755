//! # Order Service
//!
//! Turns a validated checkout into an order, drives the order status state
//! machine and records payments and refunds.
//!
//! ## Creation Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NewOrder::validate()                (before any write)                 │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌───────────────────── one transaction ────────────────────────────┐   │
//! │  │ 1. order row            status = pending_payment                 │   │
//! │  │ 2. order items          invalid lines dropped; none left = fail  │   │
//! │  │ 3. shipping address                                              │   │
//! │  │ 4. status history       "Order created"                          │   │
//! │  │ 5. inventory ledger     stock re-checked, −qty per bound variant │   │
//! │  │ 6. origin cart          marked converted                         │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! │        │ commit                                                         │
//! │        ▼                                                                │
//! │  OrderNotifier::send_order_confirmation   (failure logged, ignored)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Changes
//! [`OrderService::update_status`] is the only path that writes
//! `Order.status`; it always appends a history row in the same
//! transaction.
//!
//! ## Reads
//! Read operations never fail: storage errors are logged and turned into
//! `None` or an empty list.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use petal_core::order::NewOrder;
use petal_core::stock;
use petal_core::validation::{validate_id, validate_positive_amount};
use petal_core::{
    new_id, AddressType, CartStatus, InventoryKind, InventoryTransaction, Money, Order,
    OrderAddress, OrderItem, OrderStatus, OrderStatusHistory, PaymentStatus, PaymentTransaction,
    Refund,
};

use crate::error::{OrderError, OrderResult};
use crate::notify::OrderNotifier;
use crate::stock::ledger_available;
use crate::store::{Store, StoreResult, StoreTx};

/// An order with its lines and addresses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub addresses: Vec<OrderAddress>,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn OrderNotifier>,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn OrderNotifier>) -> Self {
        OrderService { store, notifier }
    }

    async fn begin(&self, operation: &'static str) -> OrderResult<Box<dyn StoreTx>> {
        self.store.begin().await.map_err(OrderError::storage(operation))
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates an order from a checkout.
    ///
    /// ## Errors
    /// - `OrderValidationError` for the first failing precondition
    /// - `NoValidItems` when every line fails the item checks
    /// - `StockError` when a bound variant cannot cover its line
    /// - `Failed` when any write fails; nothing is persisted
    pub async fn create_order(&self, input: NewOrder) -> OrderResult<OrderView> {
        input.validate()?;
        debug!(
            user_id = ?input.user_id,
            cart_id = ?input.cart_id,
            items = input.items.len(),
            "Creating order"
        );

        let now = Utc::now();
        let mut tx = self.begin("create_order").await?;
        let address = &input.shipping.address;

        let order = Order {
            id: new_id(),
            user_id: input.user_id.clone(),
            cart_id: input.cart_id.clone(),
            status: OrderStatus::PendingPayment,
            email: address.email.trim().to_string(),
            first_name: address.first_name.trim().to_string(),
            last_name: address.last_name.trim().to_string(),
            subtotal_cents: input.subtotal_cents,
            tax_cents: input.tax_cents,
            shipping_cents: input.shipping.amount_cents,
            discount_cents: input.discount().cents(),
            total_cents: input.total()?.cents(),
            discount_code: input.discount_code.clone(),
            payment_intent_ref: input.payment_intent_ref.clone(),
            created_at: now,
            updated_at: now,
        };
        tx.insert_order(&order)
            .await
            .map_err(OrderError::storage("insert_order"))?;

        let mut items = Vec::with_capacity(input.items.len());
        for line in input.valid_items() {
            let item = OrderItem {
                id: new_id(),
                order_id: order.id.clone(),
                product_id: line.product_id.clone(),
                variant_id: line.variant_id.clone(),
                product_name: line.product_name.clone(),
                variant_name: line.variant_name.clone(),
                quantity: line.quantity,
                price_cents: line.price_cents,
                composites: line.composites.clone(),
                created_at: now,
            };
            tx.insert_order_item(&item)
                .await
                .map_err(OrderError::storage("insert_order_item"))?;
            items.push(item);
        }
        if items.is_empty() {
            warn!(order_id = %order.id, "All order lines were invalid");
            return Err(OrderError::NoValidItems);
        }

        let shipping_address = OrderAddress {
            id: new_id(),
            order_id: order.id.clone(),
            address_type: AddressType::Shipping,
            email: order.email.clone(),
            first_name: order.first_name.clone(),
            last_name: order.last_name.clone(),
            address1: address.address1.clone(),
            address2: address.address2.clone(),
            city: address.city.clone(),
            state: address.state.clone().unwrap_or_default(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
            phone: address.phone.clone(),
        };
        tx.insert_order_address(&shipping_address)
            .await
            .map_err(OrderError::storage("insert_order_address"))?;

        tx.insert_status_history(&OrderStatusHistory {
            id: new_id(),
            order_id: order.id.clone(),
            status: OrderStatus::PendingPayment,
            note: Some("Order created".to_string()),
            created_at: now,
        })
        .await
        .map_err(OrderError::storage("insert_status_history"))?;

        for item in &items {
            record_sale(&mut *tx, &order.id, item, now).await?;
        }

        if let Some(cart_id) = &order.cart_id {
            convert_cart(&mut *tx, cart_id, now).await?;
        }

        tx.commit()
            .await
            .map_err(OrderError::storage("create_order"))?;

        info!(
            order_id = %order.id,
            total = %order.total(),
            items = items.len(),
            "Order created"
        );

        let view = OrderView {
            order,
            items,
            addresses: vec![shipping_address],
        };

        if let Err(err) = self.notifier.send_order_confirmation(&view).await {
            warn!(order_id = %view.order.id, error = %err, "Order confirmation not sent");
        }

        Ok(view)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Moves an order to `status` and appends a history row.
    pub async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        note: Option<String>,
    ) -> OrderResult<Order> {
        validate_id("order id", order_id)?;
        debug!(order_id = %order_id, status = %status, "Updating order status");

        let mut tx = self.begin("update_status").await?;
        let order = apply_status(&mut *tx, order_id, status, note, Utc::now()).await?;
        tx.commit()
            .await
            .map_err(OrderError::storage("update_status"))?;

        Ok(order)
    }

    // =========================================================================
    // Payments & Refunds
    // =========================================================================

    /// Records a payment attempt. A provider reference is generated when
    /// none is supplied.
    pub async fn create_payment_transaction(
        &self,
        order_id: &str,
        amount: Money,
        method: &str,
        intent_ref: Option<String>,
        status: PaymentStatus,
    ) -> OrderResult<PaymentTransaction> {
        validate_id("order id", order_id)?;
        validate_id("payment method", method)?;
        validate_positive_amount("payment amount", amount.cents())?;

        let mut tx = self.begin("create_payment_transaction").await?;
        load_order(&mut *tx, order_id).await?;

        let payment = PaymentTransaction {
            id: new_id(),
            order_id: order_id.to_string(),
            amount_cents: amount.cents(),
            method: method.to_string(),
            status,
            intent_ref: intent_ref
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| format!("pi_{}", Uuid::new_v4().simple())),
            created_at: Utc::now(),
        };
        tx.insert_payment_transaction(&payment)
            .await
            .map_err(OrderError::storage("insert_payment_transaction"))?;
        tx.commit()
            .await
            .map_err(OrderError::storage("create_payment_transaction"))?;

        info!(
            order_id = %order_id,
            transaction_id = %payment.id,
            amount = %amount,
            status = %payment.status,
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Records a refund against a payment and moves the order to
    /// `refunded`. The history note carries the reason.
    ///
    /// ## Errors
    /// - `InvalidInput` for a non-positive amount
    /// - `TransactionNotFound` when the payment is missing or belongs to
    ///   another order
    /// - `InvalidRefund` for a failed or cancelled payment, or an amount
    ///   above what is left to refund on it
    /// - `InvalidTransition` when the order is already terminal
    pub async fn create_refund(
        &self,
        order_id: &str,
        transaction_id: &str,
        amount: Money,
        reason: Option<String>,
        refund_ref: Option<String>,
    ) -> OrderResult<Refund> {
        validate_id("order id", order_id)?;
        validate_id("transaction id", transaction_id)?;
        validate_positive_amount("refund amount", amount.cents())?;
        debug!(order_id = %order_id, transaction_id = %transaction_id, amount = %amount, "Creating refund");

        let now = Utc::now();
        let mut tx = self.begin("create_refund").await?;

        let payment = tx
            .find_payment_transaction(transaction_id)
            .await
            .map_err(OrderError::storage("find_payment_transaction"))?
            .filter(|p| p.order_id == order_id)
            .ok_or_else(|| OrderError::TransactionNotFound {
                transaction_id: transaction_id.to_string(),
            })?;

        if matches!(payment.status, PaymentStatus::Failed | PaymentStatus::Cancelled) {
            return Err(OrderError::InvalidRefund {
                reason: format!("payment {} is {}", payment.id, payment.status),
            });
        }

        let refunded: Money = tx
            .list_refunds(order_id)
            .await
            .map_err(OrderError::storage("list_refunds"))?
            .iter()
            .filter(|r| r.transaction_id == payment.id)
            .map(|r| Money::from_cents(r.amount_cents))
            .sum();
        let refundable = Money::from_cents(payment.amount_cents) - refunded;
        if amount > refundable {
            return Err(OrderError::InvalidRefund {
                reason: format!("amount {} exceeds refundable {}", amount, refundable),
            });
        }

        let refund = Refund {
            id: new_id(),
            order_id: order_id.to_string(),
            transaction_id: payment.id.clone(),
            amount_cents: amount.cents(),
            reason: reason.clone(),
            refund_ref,
            created_at: now,
        };
        tx.insert_refund(&refund)
            .await
            .map_err(OrderError::storage("insert_refund"))?;

        let note = reason.unwrap_or_else(|| "Refund issued".to_string());
        apply_status(&mut *tx, order_id, OrderStatus::Refunded, Some(note), now).await?;

        tx.commit()
            .await
            .map_err(OrderError::storage("create_refund"))?;

        info!(order_id = %order_id, refund_id = %refund.id, amount = %amount, "Refund recorded");
        Ok(refund)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_by_id(&self, order_id: &str) -> Option<Order> {
        let mut tx = self.read_tx("get_by_id").await?;
        degrade("get_by_id", tx.find_order(order_id).await).flatten()
    }

    /// Newest first.
    pub async fn get_by_user_id(&self, user_id: &str) -> Vec<Order> {
        let Some(mut tx) = self.read_tx("get_by_user_id").await else {
            return Vec::new();
        };
        degrade("get_by_user_id", tx.list_orders_by_user(user_id).await).unwrap_or_default()
    }

    /// Newest first.
    pub async fn get_by_status(&self, status: OrderStatus) -> Vec<Order> {
        let Some(mut tx) = self.read_tx("get_by_status").await else {
            return Vec::new();
        };
        degrade("get_by_status", tx.list_orders_by_status(status).await).unwrap_or_default()
    }

    /// Oldest first.
    pub async fn get_status_history(&self, order_id: &str) -> Vec<OrderStatusHistory> {
        let Some(mut tx) = self.read_tx("get_status_history").await else {
            return Vec::new();
        };
        degrade("get_status_history", tx.list_status_history(order_id).await).unwrap_or_default()
    }

    pub async fn get_payment_transactions(&self, order_id: &str) -> Vec<PaymentTransaction> {
        let Some(mut tx) = self.read_tx("get_payment_transactions").await else {
            return Vec::new();
        };
        degrade(
            "get_payment_transactions",
            tx.list_payment_transactions(order_id).await,
        )
        .unwrap_or_default()
    }

    pub async fn get_refunds(&self, order_id: &str) -> Vec<Refund> {
        let Some(mut tx) = self.read_tx("get_refunds").await else {
            return Vec::new();
        };
        degrade("get_refunds", tx.list_refunds(order_id).await).unwrap_or_default()
    }

    /// The order with its items and addresses.
    pub async fn get_order_view(&self, order_id: &str) -> Option<OrderView> {
        let mut tx = self.read_tx("get_order_view").await?;
        degrade("get_order_view", load_view(&mut *tx, order_id).await).flatten()
    }

    async fn read_tx(&self, operation: &'static str) -> Option<Box<dyn StoreTx>> {
        degrade(operation, self.store.begin().await)
    }
}

/// Storage failures on read paths are logged and reported as `None`.
fn degrade<T>(operation: &'static str, result: StoreResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(operation, error = %err, "Order read degraded");
            None
        }
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

async fn load_order(tx: &mut dyn StoreTx, order_id: &str) -> OrderResult<Order> {
    tx.find_order(order_id)
        .await
        .map_err(OrderError::storage("find_order"))?
        .ok_or_else(|| OrderError::NotFound {
            order_id: order_id.to_string(),
        })
}

async fn load_view(tx: &mut dyn StoreTx, order_id: &str) -> StoreResult<Option<OrderView>> {
    let Some(order) = tx.find_order(order_id).await? else {
        return Ok(None);
    };
    let items = tx.list_order_items(order_id).await?;
    let addresses = tx.list_order_addresses(order_id).await?;
    Ok(Some(OrderView {
        order,
        items,
        addresses,
    }))
}

/// Checks the transition, writes the status and appends history.
async fn apply_status(
    tx: &mut dyn StoreTx,
    order_id: &str,
    status: OrderStatus,
    note: Option<String>,
    now: DateTime<Utc>,
) -> OrderResult<Order> {
    let mut order = load_order(tx, order_id).await?;
    let from = order.status;
    order.status = from.transition(status)?;
    order.updated_at = now;

    let updated = tx
        .update_order_status(order_id, status, now)
        .await
        .map_err(OrderError::storage("update_order_status"))?;
    if updated == 0 {
        return Err(OrderError::NotFound {
            order_id: order_id.to_string(),
        });
    }

    tx.insert_status_history(&OrderStatusHistory {
        id: new_id(),
        order_id: order_id.to_string(),
        status,
        note,
        created_at: now,
    })
    .await
    .map_err(OrderError::storage("insert_status_history"))?;

    info!(order_id = %order_id, from = %from, to = %status, "Order status changed");
    Ok(order)
}

/// Re-checks derived stock for a bound variant and writes the decrement.
/// Earlier lines of the same order are already in the ledger, so repeated
/// variants are checked cumulatively.
async fn record_sale(
    tx: &mut dyn StoreTx,
    order_id: &str,
    item: &OrderItem,
    now: DateTime<Utc>,
) -> OrderResult<()> {
    let variant = tx
        .find_variant(&item.variant_id)
        .await
        .map_err(OrderError::storage("find_variant"))?;
    let Some(variant) = variant else {
        debug!(variant_id = %item.variant_id, "Order line not bound to a variant");
        return Ok(());
    };

    let available = ledger_available(tx, &variant)
        .await
        .map_err(OrderError::storage("stock_level"))?;
    stock::check_availability(&variant.id, available, item.quantity, 0)?;

    tx.insert_inventory_transaction(&InventoryTransaction {
        id: new_id(),
        variant_id: variant.id.clone(),
        order_id: Some(order_id.to_string()),
        quantity: -item.quantity,
        kind: InventoryKind::Sale,
        reconciled: false,
        created_at: now,
    })
    .await
    .map_err(OrderError::storage("insert_inventory_transaction"))
}

async fn convert_cart(tx: &mut dyn StoreTx, cart_id: &str, now: DateTime<Utc>) -> OrderResult<()> {
    let cart = tx
        .find_cart(cart_id)
        .await
        .map_err(OrderError::storage("find_cart"))?;
    match cart {
        Some(mut cart) if cart.is_active() => {
            cart.status = CartStatus::Converted;
            cart.updated_at = now;
            tx.update_cart(&cart)
                .await
                .map_err(OrderError::storage("convert_cart"))?;
            debug!(cart_id = %cart_id, "Cart converted");
        }
        _ => debug!(cart_id = %cart_id, "Origin cart not active; left unchanged"),
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Fault, MemoryStore};
    use crate::notify::{LoggingNotifier, NotifyError};
    use crate::testing::{new_order, order_item, seed_variant, variant};
    use async_trait::async_trait;
    use petal_core::OrderValidationError;

    struct FailingNotifier;

    #[async_trait]
    impl OrderNotifier for FailingNotifier {
        async fn send_order_confirmation(&self, _order: &OrderView) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("smtp down".to_string()))
        }
    }

    async fn setup() -> (MemoryStore, OrderService) {
        let store = MemoryStore::new();
        seed_variant(&store, variant("v-1", 50, 10)).await;
        let service = OrderService::new(Arc::new(store.clone()), Arc::new(LoggingNotifier));
        (store, service)
    }

    #[tokio::test]
    async fn test_create_order_writes_everything() {
        let (store, service) = setup().await;

        let view = service
            .create_order(new_order(vec![order_item("v-1", 2, 50)], 100))
            .await
            .unwrap();

        assert_eq!(view.order.total_cents, 115);
        assert_eq!(view.order.status, OrderStatus::PendingPayment);
        assert_eq!(view.order.email, "ada@example.com");
        assert_eq!(view.addresses[0].state, "");
        assert_eq!(view.addresses[0].address_type, AddressType::Shipping);

        let state = store.snapshot().await;
        assert_eq!(state.orders.len(), 1);
        assert_eq!(state.order_items.len(), 1);
        assert_eq!(state.order_addresses.len(), 1);
        assert_eq!(state.status_history.len(), 1);
        assert_eq!(state.status_history[0].note.as_deref(), Some("Order created"));
        assert_eq!(state.inventory.len(), 1);
        assert_eq!(state.inventory[0].quantity, -2);
        assert_eq!(state.inventory[0].order_id.as_deref(), Some(view.order.id.as_str()));
        // on-hand figure untouched until reconciliation
        assert_eq!(state.variants["v-1"].stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_empty_items_rejected() {
        let (store, service) = setup().await;
        let err = service.create_order(new_order(vec![], 100)).await.unwrap_err();

        assert!(matches!(err, OrderError::Validation(OrderValidationError::NoItems)));
        assert_eq!(err.to_string(), "Order must have at least one item");
        assert!(store.snapshot().await.orders.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_total_rejected_without_writes() {
        let (store, service) = setup().await;
        let mut input = new_order(vec![order_item("v-1", 1, 50)], i64::MAX);
        input.tax_cents = 10;
        let err = service.create_order(input).await.unwrap_err();

        assert!(matches!(
            err,
            OrderError::Validation(OrderValidationError::AmountOutOfRange)
        ));
        let state = store.snapshot().await;
        assert!(state.orders.is_empty());
        assert!(state.inventory.is_empty());
    }

    #[tokio::test]
    async fn test_all_invalid_lines_roll_back() {
        let (store, service) = setup().await;
        let mut bad = order_item("v-1", 1, 50);
        bad.product_name = String::new();

        let err = service.create_order(new_order(vec![bad], 100)).await.unwrap_err();
        assert!(matches!(err, OrderError::NoValidItems));
        assert!(store.snapshot().await.orders.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_lines_are_dropped() {
        let (_store, service) = setup().await;
        let mut bad = order_item("v-1", 0, 50);
        bad.variant_name = "zero".to_string();

        let view = service
            .create_order(new_order(vec![order_item("v-1", 1, 50), bad], 100))
            .await
            .unwrap();
        assert_eq!(view.items.len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_failure_leaves_nothing() {
        let (store, service) = setup().await;
        store.inject_fault(Fault::InsertInventoryTransaction).await;

        let err = service
            .create_order(new_order(vec![order_item("v-1", 1, 50)], 50))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Failed { .. }));

        let state = store.snapshot().await;
        assert!(state.orders.is_empty());
        assert!(state.order_items.is_empty());
        assert!(state.order_addresses.is_empty());
        assert!(state.status_history.is_empty());
        assert!(state.inventory.is_empty());
    }

    #[tokio::test]
    async fn test_stock_rechecked_across_lines() {
        let (store, service) = setup().await;
        let err = service
            .create_order(new_order(
                vec![order_item("v-1", 6, 50), order_item("v-1", 5, 50)],
                550,
            ))
            .await
            .unwrap_err();

        match err {
            OrderError::Stock(e) => {
                assert_eq!(e.requested, 5);
                assert_eq!(e.available, 4);
            }
            other => panic!("expected stock error, got {other:?}"),
        }
        assert!(store.snapshot().await.inventory.is_empty());
    }

    #[tokio::test]
    async fn test_unbound_variant_writes_no_ledger_row() {
        let (store, service) = setup().await;
        service
            .create_order(new_order(vec![order_item("gift-card", 1, 2000)], 2000))
            .await
            .unwrap();
        assert!(store.snapshot().await.inventory.is_empty());
    }

    #[tokio::test]
    async fn test_notifier_failure_keeps_order() {
        let store = MemoryStore::new();
        seed_variant(&store, variant("v-1", 50, 10)).await;
        let service = OrderService::new(Arc::new(store.clone()), Arc::new(FailingNotifier));

        let view = service
            .create_order(new_order(vec![order_item("v-1", 1, 50)], 50))
            .await
            .unwrap();
        assert!(service.get_by_id(&view.order.id).await.is_some());
    }

    #[tokio::test]
    async fn test_origin_cart_converted() {
        let (store, service) = setup().await;
        let cart = petal_core::Cart::new(Some("sess".to_string()), None, Utc::now());
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_cart(&cart).await.unwrap();
            tx.commit().await.unwrap();
        }

        let mut input = new_order(vec![order_item("v-1", 1, 50)], 50);
        input.cart_id = Some(cart.id.clone());
        service.create_order(input).await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.carts[0].status, CartStatus::Converted);
    }

    #[tokio::test]
    async fn test_status_machine() {
        let (_store, service) = setup().await;
        let view = service
            .create_order(new_order(vec![order_item("v-1", 1, 50)], 50))
            .await
            .unwrap();
        let id = view.order.id.clone();

        service.update_status(&id, OrderStatus::Paid, None).await.unwrap();
        service
            .update_status(&id, OrderStatus::Shipped, Some("Tracking 1Z".to_string()))
            .await
            .unwrap();

        let err = service
            .update_status(&id, OrderStatus::Paid, None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition(_)));

        let history = service.get_status_history(&id).await;
        let statuses: Vec<_> = history.iter().map(|h| h.status).collect();
        assert_eq!(
            statuses,
            vec![OrderStatus::PendingPayment, OrderStatus::Paid, OrderStatus::Shipped]
        );
        assert_eq!(service.get_by_id(&id).await.unwrap().status, OrderStatus::Shipped);

        assert!(matches!(
            service.update_status("missing", OrderStatus::Paid, None).await,
            Err(OrderError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_payment_and_refund() {
        let (_store, service) = setup().await;
        let view = service
            .create_order(new_order(vec![order_item("v-1", 1, 50)], 50))
            .await
            .unwrap();
        let id = view.order.id.clone();

        let payment = service
            .create_payment_transaction(&id, Money::from_cents(65), "card", None, PaymentStatus::Succeeded)
            .await
            .unwrap();
        assert!(payment.intent_ref.starts_with("pi_"));

        let err = service
            .create_refund(&id, &payment.id, Money::from_cents(100), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidRefund { .. }));

        let refund = service
            .create_refund(&id, &payment.id, Money::from_cents(65), Some("Wilted".to_string()), None)
            .await
            .unwrap();
        assert_eq!(refund.amount_cents, 65);

        let order = service.get_by_id(&id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
        let history = service.get_status_history(&id).await;
        assert_eq!(history.last().unwrap().note.as_deref(), Some("Wilted"));
        assert_eq!(service.get_refunds(&id).await.len(), 1);
        assert_eq!(service.get_payment_transactions(&id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_refund_failure_rolls_back_status() {
        let (store, service) = setup().await;
        let view = service
            .create_order(new_order(vec![order_item("v-1", 1, 50)], 50))
            .await
            .unwrap();
        let id = view.order.id.clone();
        let payment = service
            .create_payment_transaction(&id, Money::from_cents(65), "card", Some("pi_abc".to_string()), PaymentStatus::Succeeded)
            .await
            .unwrap();
        assert_eq!(payment.intent_ref, "pi_abc");

        store.inject_fault(Fault::InsertStatusHistory).await;
        assert!(service
            .create_refund(&id, &payment.id, Money::from_cents(10), None, None)
            .await
            .is_err());
        store.clear_faults().await;

        let state = store.snapshot().await;
        assert!(state.refunds.is_empty());
        assert_eq!(state.orders[0].status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_refund_rejects_foreign_or_failed_payment() {
        let (_store, service) = setup().await;
        let first = service
            .create_order(new_order(vec![order_item("v-1", 1, 50)], 50))
            .await
            .unwrap();
        let second = service
            .create_order(new_order(vec![order_item("v-1", 1, 50)], 50))
            .await
            .unwrap();

        let failed = service
            .create_payment_transaction(&first.order.id, Money::from_cents(65), "card", None, PaymentStatus::Failed)
            .await
            .unwrap();

        assert!(matches!(
            service
                .create_refund(&second.order.id, &failed.id, Money::from_cents(10), None, None)
                .await,
            Err(OrderError::TransactionNotFound { .. })
        ));
        assert!(matches!(
            service
                .create_refund(&first.order.id, &failed.id, Money::from_cents(10), None, None)
                .await,
            Err(OrderError::InvalidRefund { .. })
        ));
    }

    #[tokio::test]
    async fn test_reads_degrade_on_storage_failure() {
        let (store, service) = setup().await;
        let view = service
            .create_order(new_order(vec![order_item("v-1", 1, 50)], 50))
            .await
            .unwrap();

        assert_eq!(service.get_by_user_id("user-1").await.len(), 1);
        assert_eq!(service.get_by_status(OrderStatus::PendingPayment).await.len(), 1);
        assert_eq!(service.get_order_view(&view.order.id).await.unwrap().items.len(), 1);

        store.inject_fault(Fault::Reads).await;
        assert!(service.get_by_id(&view.order.id).await.is_none());
        assert!(service.get_by_user_id("user-1").await.is_empty());
        assert!(service.get_status_history(&view.order.id).await.is_empty());
        assert!(service.get_order_view(&view.order.id).await.is_none());

        store.inject_fault(Fault::Begin).await;
        assert!(service.get_by_status(OrderStatus::PendingPayment).await.is_empty());
    }
}
