//! Cart and order flows against an in-memory SQLite database.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};

use petal_checkout::{
    CartManager, CheckoutError, Inventory, LoggingNotifier, OrderError, OrderService,
    StockValidator, Store, StorefrontConfig,
};
use petal_core::order::{NewOrder, NewOrderItem, ShippingAddress, ShippingDetails};
use petal_core::{
    CartStatus, Discount, DiscountType, Money, OrderStatus, PaymentStatus, Product, ProductVariant,
};
use petal_db::{Database, DbConfig};

// =============================================================================
// Fixtures
// =============================================================================

async fn setup() -> Database {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database");

    let catalog = db.catalog();
    catalog
        .upsert_product(&Product {
            id: "p-1".to_string(),
            name: "Garden Roses".to_string(),
            slug: "garden-roses".to_string(),
            images: vec!["https://cdn.example.com/roses.jpg".to_string()],
        })
        .await
        .unwrap();
    catalog.upsert_variant(&variant("v-1", 2500, 10)).await.unwrap();
    catalog.upsert_variant(&variant("v-2", 1000, 3)).await.unwrap();

    db.discounts()
        .upsert(&discount("save10", DiscountType::Fixed, 1000, Some(1)))
        .await
        .unwrap();
    db.discounts()
        .upsert(&discount("tenpct", DiscountType::Percentage, 10, None))
        .await
        .unwrap();

    db
}

fn variant(id: &str, price_cents: i64, stock_quantity: i64) -> ProductVariant {
    ProductVariant {
        id: id.to_string(),
        product_id: "p-1".to_string(),
        sku: format!("ROSES-{}", id.to_uppercase()),
        name: format!("Bunch {}", id),
        price_cents,
        locale_prices: BTreeMap::from([("en-GB".to_string(), price_cents - 500)]),
        stock_quantity,
        attributes: BTreeMap::from([("stem".to_string(), "long".to_string())]),
    }
}

fn discount(code: &str, kind: DiscountType, value: i64, max_uses: Option<i64>) -> Discount {
    Discount {
        id: format!("d-{}", code),
        code: code.to_string(),
        discount_type: kind,
        value,
        min_spend_cents: None,
        max_uses,
        used_count: 0,
        valid_from: Utc::now() - Duration::days(1),
        valid_until: None,
        active: true,
    }
}

fn new_order(cart_id: Option<String>, quantity: i64) -> NewOrder {
    NewOrder {
        user_id: Some("user-1".to_string()),
        cart_id,
        items: vec![NewOrderItem {
            product_id: "p-1".to_string(),
            variant_id: "v-1".to_string(),
            product_name: "Garden Roses".to_string(),
            variant_name: "Bunch v-1".to_string(),
            quantity,
            price_cents: 2500,
            composites: Vec::new(),
        }],
        subtotal_cents: 2500 * quantity,
        tax_cents: 250,
        shipping: ShippingDetails {
            amount_cents: 500,
            address: ShippingAddress {
                email: " ada@example.com ".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                address1: "1 Garden Row".to_string(),
                address2: None,
                city: "London".to_string(),
                state: None,
                postal_code: "N1 9GU".to_string(),
                country: "GB".to_string(),
                phone: None,
            },
        },
        discount_cents: None,
        discount_code: None,
        payment_intent_ref: Some("pi_test".to_string()),
    }
}

fn services(db: &Database) -> (Arc<dyn Store>, CartManager, OrderService) {
    let store: Arc<dyn Store> = Arc::new(db.store());
    let config = StorefrontConfig::default();
    let carts = CartManager::new(store.clone(), &config);
    let orders = OrderService::new(store.clone(), Arc::new(LoggingNotifier));
    (store, carts, orders)
}

async fn count(db: &Database, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(db.pool())
        .await
        .unwrap()
}

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
async fn test_cart_lines_and_discount_round_trip_through_sqlite() {
    let db = setup().await;
    let (_, carts, _) = services(&db);

    let cart = carts.get_or_create("session-1", None).await.unwrap();
    carts.add_item(&cart.cart_id, "v-1", 1, Vec::new()).await.unwrap();
    carts.add_item(&cart.cart_id, "v-1", 1, Vec::new()).await.unwrap();
    let view = carts.apply_discount(&cart.cart_id, "SAVE10").await.unwrap();

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 2);
    assert_eq!(view.items[0].product_slug, "garden-roses");
    assert_eq!(view.items[0].attributes.get("stem").map(String::as_str), Some("long"));
    assert_eq!(view.subtotal.cents(), 5000);
    assert_eq!(view.discount.cents(), 1000);
    assert_eq!(view.total.cents(), 4000);
    assert_eq!(count(&db, "cart_items").await, 1);

    let summary = carts.summarize(&cart.cart_id).await.unwrap();
    assert_eq!(summary, view);
}

#[tokio::test]
async fn test_reapplying_a_code_on_the_same_cart_counts_once() {
    let db = setup().await;
    let (_, carts, _) = services(&db);

    let cart = carts.get_or_create("session-1", None).await.unwrap();
    carts.add_item(&cart.cart_id, "v-1", 1, Vec::new()).await.unwrap();
    carts.apply_discount(&cart.cart_id, "save10").await.unwrap();
    carts.apply_discount(&cart.cart_id, "save10").await.unwrap();

    let stored = db.discounts().get_by_code("save10").await.unwrap().unwrap();
    assert_eq!(stored.used_count, 1);
    assert_eq!(count(&db, "discount_redemptions").await, 1);

    // the single use is spent, so another cart is refused
    let other = carts.get_or_create("session-2", None).await.unwrap();
    carts.add_item(&other.cart_id, "v-1", 1, Vec::new()).await.unwrap();
    let err = carts.apply_discount(&other.cart_id, "save10").await.unwrap_err();
    assert!(matches!(err, CheckoutError::Discount(_)));
}

#[tokio::test]
async fn test_stock_is_checked_against_cumulative_quantity() {
    let db = setup().await;
    let (_, carts, _) = services(&db);

    let cart = carts.get_or_create("session-1", None).await.unwrap();
    carts.add_item(&cart.cart_id, "v-2", 2, Vec::new()).await.unwrap();
    let err = carts
        .add_item(&cart.cart_id, "v-2", 2, Vec::new())
        .await
        .unwrap_err();

    match err {
        CheckoutError::Stock(e) => {
            assert_eq!(e.requested, 4);
            assert_eq!(e.available, 3);
        }
        other => panic!("expected stock error, got {other:?}"),
    }

    let view = carts.summarize(&cart.cart_id).await.unwrap();
    assert_eq!(view.items[0].quantity, 2);
}

#[tokio::test]
async fn test_merge_on_login_folds_session_cart_into_user_cart() {
    let db = setup().await;
    let (_, carts, _) = services(&db);

    let user_cart = carts.get_or_create("device-a", Some("user-1")).await.unwrap();
    carts.add_item(&user_cart.cart_id, "v-1", 1, Vec::new()).await.unwrap();

    let anon = carts.get_or_create("device-b", None).await.unwrap();
    carts.add_item(&anon.cart_id, "v-1", 2, Vec::new()).await.unwrap();
    carts.add_item(&anon.cart_id, "v-2", 1, Vec::new()).await.unwrap();
    carts.apply_discount(&anon.cart_id, "tenpct").await.unwrap();

    let merged = carts.merge_on_login("device-b", "user-1").await.unwrap();
    assert_eq!(merged.cart_id, user_cart.cart_id);
    assert_eq!(merged.user_id.as_deref(), Some("user-1"));
    assert_eq!(merged.item_count, 4);
    assert_eq!(merged.discount_code.as_deref(), Some("TENPCT"));
    // 3 x 2500 + 1000
    assert_eq!(merged.subtotal.cents(), 8500);
    assert_eq!(merged.discount.cents(), 850);

    assert_eq!(count(&db, "carts").await, 1);
    let redemptions: Vec<String> =
        sqlx::query_scalar("SELECT cart_id FROM discount_redemptions")
            .fetch_all(db.pool())
            .await
            .unwrap();
    assert_eq!(redemptions, vec![user_cart.cart_id.clone()]);

    let again = carts.merge_on_login("device-b", "user-1").await.unwrap();
    assert_eq!(again, merged);
}

#[tokio::test]
async fn test_abandon_stale_marks_idle_carts() {
    let db = setup().await;
    let (_, carts, _) = services(&db);

    let cart = carts.get_or_create("session-1", None).await.unwrap();
    let abandoned = carts
        .abandon_stale(Utc::now() + Duration::hours(73))
        .await
        .unwrap();
    assert_eq!(abandoned, 1);

    let status: String = sqlx::query_scalar("SELECT status FROM carts WHERE id = ?")
        .bind(&cart.cart_id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(status, CartStatus::Abandoned.as_str());
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn test_create_order_writes_rows_and_ledger() {
    let db = setup().await;
    let (store, carts, orders) = services(&db);

    let cart = carts.get_or_create("session-1", Some("user-1")).await.unwrap();
    carts.add_item(&cart.cart_id, "v-1", 3, Vec::new()).await.unwrap();

    let view = orders
        .create_order(new_order(Some(cart.cart_id.clone()), 3))
        .await
        .unwrap();

    assert_eq!(view.order.status, OrderStatus::PendingPayment);
    assert_eq!(view.order.email, "ada@example.com");
    assert_eq!(view.order.total_cents, 7500 + 250 + 500);
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.addresses.len(), 1);
    assert_eq!(view.addresses[0].state, "");

    let ledger: Vec<(i64, String)> =
        sqlx::query_as("SELECT quantity, kind FROM inventory_transactions")
            .fetch_all(db.pool())
            .await
            .unwrap();
    assert_eq!(ledger, vec![(-3, "sale".to_string())]);

    let cart_status: String = sqlx::query_scalar("SELECT status FROM carts WHERE id = ?")
        .bind(&cart.cart_id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(cart_status, CartStatus::Converted.as_str());

    let inventory = Inventory::new(store, StockValidator::new(5));
    assert_eq!(inventory.available("v-1").await.unwrap(), 7);

    let history = orders.get_status_history(&view.order.id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].note.as_deref(), Some("Order created"));

    let loaded = orders.get_order_view(&view.order.id).await.unwrap();
    assert_eq!(loaded.order.id, view.order.id);
    assert_eq!(loaded.order.total_cents, view.order.total_cents);
    assert_eq!(loaded.items[0].variant_id, "v-1");
    assert_eq!(loaded.addresses[0].city, "London");
    assert_eq!(orders.get_by_user_id("user-1").await.len(), 1);
}

#[tokio::test]
async fn test_second_order_sees_first_orders_ledger() {
    let db = setup().await;
    let (_, _, orders) = services(&db);

    orders.create_order(new_order(None, 6)).await.unwrap();
    let err = orders.create_order(new_order(None, 5)).await.unwrap_err();

    match err {
        OrderError::Stock(e) => {
            assert_eq!(e.requested, 5);
            assert_eq!(e.available, 4);
        }
        other => panic!("expected stock error, got {other:?}"),
    }
    assert_eq!(count(&db, "orders").await, 1);
}

#[tokio::test]
async fn test_ledger_failure_leaves_no_order_rows() {
    let db = setup().await;
    let (_, _, orders) = services(&db);

    sqlx::query(
        "CREATE TRIGGER ledger_offline BEFORE INSERT ON inventory_transactions \
         BEGIN SELECT RAISE(ABORT, 'ledger offline'); END;",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let err = orders.create_order(new_order(None, 1)).await.unwrap_err();
    assert!(matches!(err, OrderError::Failed { .. }));

    for table in [
        "orders",
        "order_items",
        "order_addresses",
        "order_status_history",
        "inventory_transactions",
    ] {
        assert_eq!(count(&db, table).await, 0, "{table} should be empty");
    }
}

#[tokio::test]
async fn test_payment_refund_and_reconcile() {
    let db = setup().await;
    let (store, _, orders) = services(&db);

    let view = orders.create_order(new_order(None, 2)).await.unwrap();
    let order_id = view.order.id.clone();

    let paid = orders
        .update_status(&order_id, OrderStatus::Paid, None)
        .await
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);

    let payment = orders
        .create_payment_transaction(
            &order_id,
            Money::from_cents(5750),
            "card",
            None,
            PaymentStatus::Succeeded,
        )
        .await
        .unwrap();
    assert!(payment.intent_ref.starts_with("pi_"));

    let err = orders
        .create_refund(&order_id, &payment.id, Money::from_cents(6000), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidRefund { .. }));

    orders
        .create_refund(
            &order_id,
            &payment.id,
            Money::from_cents(5750),
            Some("Wilted on arrival".to_string()),
            None,
        )
        .await
        .unwrap();

    let order = orders.get_by_id(&order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);
    assert_eq!(orders.get_refunds(&order_id).await.len(), 1);
    assert_eq!(orders.get_payment_transactions(&order_id).await.len(), 1);

    let history = orders.get_status_history(&order_id).await;
    let statuses: Vec<OrderStatus> = history.iter().map(|h| h.status).collect();
    assert_eq!(
        statuses,
        vec![OrderStatus::PendingPayment, OrderStatus::Paid, OrderStatus::Refunded]
    );
    assert_eq!(history[2].note.as_deref(), Some("Wilted on arrival"));

    let inventory = Inventory::new(store, StockValidator::new(5));
    let reconciled = inventory.reconcile("v-1").await.unwrap();
    assert_eq!(reconciled.stock_quantity, 8);
    assert_eq!(inventory.available("v-1").await.unwrap(), 8);
    assert_eq!(
        db.catalog().get_variant("v-1").await.unwrap().unwrap().stock_quantity,
        8
    );
}
