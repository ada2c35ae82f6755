//! Fixtures shared by the service tests.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};

use petal_core::order::{NewOrder, NewOrderItem, ShippingAddress, ShippingDetails};
use petal_core::{Discount, DiscountType, Product, ProductVariant};

use crate::memory::MemoryStore;

pub fn product(id: &str) -> Product {
    Product {
        id: id.to_string(),
        name: "Garden Roses".to_string(),
        slug: "garden-roses".to_string(),
        images: vec![
            "https://cdn.example.com/roses-1.jpg".to_string(),
            "https://cdn.example.com/roses-2.jpg".to_string(),
        ],
    }
}

pub fn variant(id: &str, price_cents: i64, stock_quantity: i64) -> ProductVariant {
    ProductVariant {
        id: id.to_string(),
        product_id: "p-1".to_string(),
        sku: format!("SKU-{}", id.to_uppercase()),
        name: format!("Bunch {}", id),
        price_cents,
        locale_prices: BTreeMap::new(),
        stock_quantity,
        attributes: BTreeMap::from([("stem".to_string(), "long".to_string())]),
    }
}

/// Seeds the variant and its product `p-1`.
pub async fn seed_variant(store: &MemoryStore, variant: ProductVariant) {
    store.insert_product(product(&variant.product_id)).await;
    store.insert_variant(variant).await;
}

pub fn discount(code: &str, kind: DiscountType, value: i64) -> Discount {
    Discount {
        id: format!("d-{}", code.to_lowercase()),
        code: code.to_string(),
        discount_type: kind,
        value,
        min_spend_cents: None,
        max_uses: None,
        used_count: 0,
        valid_from: Utc::now() - Duration::days(1),
        valid_until: None,
        active: true,
    }
}

pub fn shipping_address() -> ShippingAddress {
    ShippingAddress {
        email: "ada@example.com".to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        address1: "1 Garden Row".to_string(),
        address2: None,
        city: "London".to_string(),
        state: None,
        postal_code: "N1 9GU".to_string(),
        country: "GB".to_string(),
        phone: None,
    }
}

pub fn order_item(variant_id: &str, quantity: i64, price_cents: i64) -> NewOrderItem {
    NewOrderItem {
        product_id: "p-1".to_string(),
        variant_id: variant_id.to_string(),
        product_name: "Garden Roses".to_string(),
        variant_name: format!("Bunch {}", variant_id),
        quantity,
        price_cents,
        composites: Vec::new(),
    }
}

pub fn new_order(items: Vec<NewOrderItem>, subtotal_cents: i64) -> NewOrder {
    NewOrder {
        user_id: Some("user-1".to_string()),
        cart_id: None,
        items,
        subtotal_cents,
        tax_cents: 10,
        shipping: ShippingDetails {
            amount_cents: 5,
            address: shipping_address(),
        },
        discount_cents: Some(0),
        discount_code: None,
        payment_intent_ref: None,
    }
}
