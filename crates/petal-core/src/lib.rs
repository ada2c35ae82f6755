//! # petal-core: Pure Business Logic for the Petal Storefront
//!
//! This crate holds the rules that make the cart-to-order flow consistent.
//! Everything in here is a pure function over plain data.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Petal Storefront Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Storefront UI / API (not in this workspace)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ session id / user id                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            petal-checkout (CartManager, OrderService)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ petal-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │ pricing  │ │  stock   │ │ discount │ │  order   │          │   │
//! │  │   │ Summary  │ │  rules   │ │  rules   │ │ rules +  │          │   │
//! │  │   │          │ │          │ │          │ │ statuses │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  petal-db (SQLite adapter)                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Cart, ProductVariant, Discount, Order, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Cart summary calculator
//! - [`stock`] - Stock availability rule and stock status classification
//! - [`discount`] - Discount validation and amount computation
//! - [`order`] - Order input validation, totals and the status state machine
//! - [`composite`] - Bundled/kitted line items and their legacy JSON shapes
//! - [`error`] - Domain error types
//! - [`validation`] - Primitive input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use petal_core::money::Money;
//! use petal_core::pricing::{summarize, PricedLine};
//!
//! let lines = [PricedLine::new(Money::from_cents(2500), 2)];
//! let summary = summarize(lines, Money::from_cents(1000)).unwrap();
//!
//! assert_eq!(summary.subtotal.cents(), 5000);
//! assert_eq!(summary.total.cents(), 4000);
//! assert_eq!(summary.item_count, 2);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod composite;
pub mod discount;
pub mod error;
pub mod money;
pub mod order;
pub mod pricing;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{
    DiscountError, OrderValidationError, PricingError, StatusTransitionError, StockError,
    ValidationError,
};
pub use money::{Money, MoneyFormat};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single line in a cart.
///
/// Prevents accidental over-ordering (typing 1000 instead of 10).
/// Overridable through the storefront configuration.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;
