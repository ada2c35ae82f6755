//! # Error Types
//!
//! Domain-specific error types for petal-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  petal-core errors (this file)                                         │
//! │  ├── ValidationError       - Primitive input failures (ids, qty)      │
//! │  ├── StockError            - Requested more than available            │
//! │  ├── DiscountError         - Code unknown or not applicable           │
//! │  ├── OrderValidationError  - One variant per order precondition       │
//! │  ├── PricingError          - Malformed summary input                  │
//! │  └── StatusTransitionError - Illegal order status move                │
//! │                                                                         │
//! │  petal-checkout errors                                                 │
//! │  └── CartError / VariantError / CheckoutError / OrderError             │
//! │                                                                         │
//! │  petal-db errors                                                       │
//! │  └── DbError  - converted to StoreError at the port boundary          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, counts)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised synchronously before any storage access. Always caller-fixable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be a positive integer")]
    MustBePositive { field: String },

    /// Invalid format (e.g., unknown status name).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Stock Error
// =============================================================================

/// Requested quantity exceeds what the variant can supply.
///
/// ## User Workflow
/// ```text
/// Add to Cart (qty: 5, already in cart: 2)
///      │
///      ▼
/// Check stock: available=6
///      │
///      ▼
/// StockError { requested: 7, available: 6 }
///      │
///      ▼
/// UI shows: "Only 6 left in stock"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
pub struct StockError {
    pub variant_id: String,
    /// Total quantity that would be held after the operation.
    pub requested: i64,
    pub available: i64,
}

// =============================================================================
// Discount Error
// =============================================================================

/// Reasons a discount code cannot be applied.
///
/// Every variant is user-correctable, so messages are written for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountError {
    #[error("Discount code {code} was not found")]
    NotFound { code: String },

    #[error("Discount code {code} is not active")]
    Inactive { code: String },

    #[error("Discount code {code} is not valid yet")]
    NotYetValid { code: String },

    #[error("Discount code {code} has expired")]
    Expired { code: String },

    #[error("Discount code {code} has reached its usage limit")]
    MaxUsesReached { code: String },

    /// `formatted_min` is rendered with the storefront currency symbol.
    #[error("A minimum spend of {formatted_min} is required for code {code}")]
    BelowMinimumSpend {
        code: String,
        min_spend: i64,
        subtotal: i64,
        formatted_min: String,
    },
}

// =============================================================================
// Order Validation Error
// =============================================================================

/// Order preconditions, checked in this order before any write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderValidationError {
    #[error("Order must have at least one item")]
    NoItems,

    #[error("Order subtotal must be greater than zero")]
    NonPositiveSubtotal,

    #[error("Tax amount cannot be negative")]
    NegativeTax,

    #[error("Shipping amount cannot be negative")]
    NegativeShipping,

    #[error("Discount amount cannot be negative")]
    NegativeDiscount,

    #[error("Shipping email is required")]
    MissingEmail,

    #[error("Shipping first and last name are required")]
    MissingName,

    #[error("Shipping address is incomplete: {field} is required")]
    IncompleteAddress { field: &'static str },

    /// `subtotal + tax + shipping − discount` does not fit in an i64.
    #[error("Order amounts are out of range")]
    AmountOutOfRange,
}

// =============================================================================
// Pricing Error
// =============================================================================

/// Rejected input to the cart summary calculator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("Discount amount cannot be negative: {0}")]
    NegativeDiscount(i64),

    #[error("Line {index} is malformed: price {price}, quantity {quantity}")]
    InvalidLine { index: usize, price: i64, quantity: i64 },

    #[error("Cart amounts are out of range")]
    Overflow,
}

// =============================================================================
// Status Transition Error
// =============================================================================

/// An order status change that the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Order cannot move from {from} to {to}")]
pub struct StatusTransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_error_message() {
        let err = StockError {
            variant_id: "v-1".to_string(),
            requested: 7,
            available: 6,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for variant v-1: requested 7, available 6"
        );
    }

    #[test]
    fn test_order_validation_messages() {
        assert_eq!(
            OrderValidationError::NoItems.to_string(),
            "Order must have at least one item"
        );
        assert_eq!(
            OrderValidationError::IncompleteAddress { field: "city" }.to_string(),
            "Shipping address is incomplete: city is required"
        );
    }

    #[test]
    fn test_transition_error_message() {
        let err = StatusTransitionError {
            from: OrderStatus::Delivered,
            to: OrderStatus::Paid,
        };
        assert_eq!(err.to_string(), "Order cannot move from delivered to paid");
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("cart id").to_string(), "cart id is required");
        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be a positive integer");
    }
}
