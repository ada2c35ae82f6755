//! # Domain Types
//!
//! Core domain types used throughout the storefront.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Cart       │   │ ProductVariant  │   │    Discount     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  session_id     │   │  sku            │   │  code (unique)  │       │
//! │  │  user_id?       │   │  price_cents    │   │  type / value   │       │
//! │  │  status         │   │  stock_quantity │   │  used_count     │       │
//! │  │  discount_code? │   │  attributes     │   │  valid window   │       │
//! │  └────────┬────────┘   └─────────────────┘   └─────────────────┘       │
//! │           │ owns                                                        │
//! │  ┌────────▼────────┐   ┌─────────────────────────────────────────┐     │
//! │  │    CartItem     │   │                 Order                   │     │
//! │  │  price frozen   │   │  OrderItem[] (snapshots)                │     │
//! │  │  composites[]   │   │  OrderAddress[] (shipping / billing)    │     │
//! │  └─────────────────┘   │  OrderStatusHistory[] (append-only)     │     │
//! │                        │  PaymentTransaction[] / Refund[]        │     │
//! │                        └─────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Identifiers are opaque strings (UUID v4 in practice). Monetary fields
//! carry the `_cents` suffix and are exposed as [`Money`] through accessors.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;

/// Generates a new opaque identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Status enums are persisted as lowercase snake_case text.
macro_rules! text_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Returns the persisted text form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ValidationError::invalid_format(
                        $field,
                        format!("unknown value '{}'", other),
                    )),
                }
            }
        }
    };
}

// =============================================================================
// Cart
// =============================================================================

/// Lifecycle of a cart row.
///
/// `no-cart` is the absence of a row, not a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    #[default]
    Active,
    /// Folded into another cart on login.
    Merged,
    /// An order was created from it.
    Converted,
    /// Swept after a period of inactivity.
    Abandoned,
}

text_enum!(CartStatus, "cart status", {
    Active => "active",
    Merged => "merged",
    Converted => "converted",
    Abandoned => "abandoned",
});

/// One shopper's in-progress selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: String,
    /// Anonymous-session correlation key.
    pub session_id: Option<String>,
    /// Set once the shopper authenticates.
    pub user_id: Option<String>,
    pub status: CartStatus,
    pub discount_code: Option<String>,
    /// Reduction applied to the subtotal.
    pub discount_cents: i64,
    /// Reduction signalled to shipping; never subtracted from the subtotal.
    pub shipping_discount_cents: i64,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new active cart keyed to the given identities.
    pub fn new(session_id: Option<String>, user_id: Option<String>, now: DateTime<Utc>) -> Self {
        Cart {
            id: new_id(),
            session_id,
            user_id,
            status: CartStatus::Active,
            discount_code: None,
            discount_cents: 0,
            shipping_discount_cents: 0,
            last_activity_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == CartStatus::Active
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    /// Bumps `updated_at` and `last_activity_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.last_activity_at = now;
    }

    /// Detaches any discount code and zeroes both discount amounts.
    pub fn clear_discount(&mut self) {
        self.discount_code = None;
        self.discount_cents = 0;
        self.shipping_discount_cents = 0;
    }
}

/// A sub-item of a bundled or kitted cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeItem {
    pub variant_id: String,
    pub name: String,
    pub quantity: i64,
}

/// One line within a cart.
///
/// ## Price Freezing
/// `price_cents` is captured when the line is first added and is not
/// re-read from the catalogue on every view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub variant_id: String,
    /// Denormalised from the variant for convenience.
    pub product_id: String,
    /// Always >= 1; a line that would drop to zero is deleted instead.
    pub quantity: i64,
    pub price_cents: i64,
    pub composites: Vec<CompositeItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Catalogue
// =============================================================================

/// The product a variant belongs to. Only what the cart view needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub slug: String,
    /// Image URLs in display order.
    pub images: Vec<String>,
}

impl Product {
    /// The first image, used as the cart thumbnail.
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A purchasable SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    /// Base price in minor units.
    pub price_cents: i64,
    /// Optional per-locale price overrides (e.g. "en-GB" -> 1899).
    pub locale_prices: BTreeMap<String, i64>,
    /// On-hand count as of the last ledger reconciliation. Never negative.
    pub stock_quantity: i64,
    /// Variant-specific traits (stem type, colour, ...).
    pub attributes: BTreeMap<String, String>,
}

impl ProductVariant {
    /// Price for a locale, falling back to the base price.
    pub fn price_for(&self, locale: Option<&str>) -> Money {
        locale
            .and_then(|l| self.locale_prices.get(l))
            .map(|cents| Money::from_cents(*cents))
            .unwrap_or_else(|| Money::from_cents(self.price_cents))
    }
}

// =============================================================================
// Discount
// =============================================================================

/// How a discount's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `value` is a whole percentage of the subtotal.
    Percentage,
    /// `value` is an amount in minor units.
    Fixed,
    /// `value` is an amount taken off the shipping cost.
    Shipping,
}

text_enum!(DiscountType, "discount type", {
    Percentage => "percentage",
    Fixed => "fixed",
    Shipping => "shipping",
});

/// A promotional code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub id: String,
    /// Unique, stored upper-case.
    pub code: String,
    pub discount_type: DiscountType,
    pub value: i64,
    pub min_spend_cents: Option<i64>,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub active: bool,
}

// =============================================================================
// Order
// =============================================================================

/// Order state machine.
///
/// ```text
/// pending_payment ──► paid ──► processing ──► shipped ──► delivered
///        │              │           │             │
///        └──────────────┴─────┬─────┴─────────────┘
///                             ▼
///                  cancelled | refunded   (side exits)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

text_enum!(OrderStatus, "order status", {
    PendingPayment => "pending_payment",
    Paid => "paid",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

/// An immutable record of a completed checkout.
///
/// Contact fields are snapshotted from the shipping address, not the
/// user profile. `total_cents` is computed once at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: Option<String>,
    pub cart_id: Option<String>,
    pub status: OrderStatus,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub discount_code: Option<String>,
    pub payment_intent_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line of an order. Product data is frozen at checkout time so later
/// catalogue edits never rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub variant_id: String,
    pub product_name: String,
    pub variant_name: String,
    pub quantity: i64,
    pub price_cents: i64,
    pub composites: Vec<CompositeItem>,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.price_cents).multiply_quantity(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    Shipping,
    Billing,
}

text_enum!(AddressType, "address type", {
    Shipping => "shipping",
    Billing => "billing",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAddress {
    pub id: String,
    pub order_id: String,
    pub address_type: AddressType,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    /// Empty string when the caller omitted it.
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

/// Append-only audit row written on every status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusHistory {
    pub id: String,
    pub order_id: String,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

text_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Succeeded => "succeeded",
    Failed => "failed",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: String,
    pub order_id: String,
    pub amount_cents: i64,
    /// Free-form method name ("card", "paypal", ...).
    pub method: String,
    pub status: PaymentStatus,
    /// Payment-provider intent reference; generated when not supplied.
    pub intent_ref: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub order_id: String,
    pub transaction_id: String,
    pub amount_cents: i64,
    pub reason: Option<String>,
    pub refund_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Inventory Ledger
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryKind {
    /// Decrement recorded by an order.
    Sale,
    /// Manual correction (positive or negative).
    Adjustment,
}

text_enum!(InventoryKind, "inventory kind", {
    Sale => "sale",
    Adjustment => "adjustment",
});

/// A stock movement. Stock levels are derived from these rows; the
/// variant's `stock_quantity` is only the last reconciled figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: String,
    pub variant_id: String,
    pub order_id: Option<String>,
    /// Negative for decrements.
    pub quantity: i64,
    pub kind: InventoryKind,
    pub reconciled: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_round_trip() {
        assert_eq!(OrderStatus::PendingPayment.as_str(), "pending_payment");
        assert_eq!("pending_payment".parse::<OrderStatus>().unwrap(), OrderStatus::PendingPayment);
        assert_eq!("converted".parse::<CartStatus>().unwrap(), CartStatus::Converted);
        assert!("bogus".parse::<DiscountType>().is_err());
    }

    #[test]
    fn test_cart_touch_and_clear_discount() {
        let created = Utc::now();
        let mut cart = Cart::new(Some("sess".to_string()), None, created);
        cart.discount_code = Some("SPRING10".to_string());
        cart.discount_cents = 500;

        let later = created + chrono::Duration::minutes(5);
        cart.touch(later);
        cart.clear_discount();

        assert_eq!(cart.updated_at, later);
        assert_eq!(cart.last_activity_at, later);
        assert_eq!(cart.created_at, created);
        assert!(cart.discount_code.is_none());
        assert!(cart.discount().is_zero());
    }

    #[test]
    fn test_variant_locale_price() {
        let variant = ProductVariant {
            id: "v".to_string(),
            product_id: "p".to_string(),
            sku: "ROSE-RED-12".to_string(),
            name: "Dozen, red".to_string(),
            price_cents: 4500,
            locale_prices: BTreeMap::from([("en-GB".to_string(), 3900)]),
            stock_quantity: 10,
            attributes: BTreeMap::new(),
        };
        assert_eq!(variant.price_for(Some("en-GB")).cents(), 3900);
        assert_eq!(variant.price_for(Some("fr-FR")).cents(), 4500);
        assert_eq!(variant.price_for(None).cents(), 4500);
    }
}
