//! # Service Errors
//!
//! Typed errors returned by the cart and order services.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Caller                                                                 │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  CartManager::add_item ──► CheckoutError                                │
//! │    │                        ├── Validation  (bad id / quantity)        │
//! │    │                        ├── Cart        (not found / store failed) │
//! │    │                        ├── Variant     (unknown variant)          │
//! │    │                        ├── Stock       (requested > available)    │
//! │    │                        └── Discount    (code rejected)            │
//! │    │                                                                    │
//! │  OrderService::create_order ──► OrderError                              │
//! │                                                                         │
//! │  Raw StoreError never escapes a public operation: it is wrapped in     │
//! │  CartError::Failed / OrderError::Failed with the operation name.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error exposes an [`ErrorCode`] so a storefront can branch on the
//! reason (out of stock, invalid code, below minimum spend) without
//! parsing messages.

use serde::Serialize;
use thiserror::Error;

use petal_core::{
    DiscountError, OrderValidationError, StatusTransitionError, StockError, ValidationError,
};

use crate::store::StoreError;

// =============================================================================
// Error Codes
// =============================================================================

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    CartNotFound,
    CartItemNotFound,
    VariantNotFound,
    InsufficientStock,
    DiscountNotFound,
    DiscountInactive,
    DiscountNotYetValid,
    DiscountExpired,
    DiscountExhausted,
    BelowMinimumSpend,
    OrderNotFound,
    InvalidStatusTransition,
    InvalidRefund,
    TransactionNotFound,
    /// Persistence failure, not caller-fixable.
    StorageError,
}

fn discount_code(err: &DiscountError) -> ErrorCode {
    match err {
        DiscountError::NotFound { .. } => ErrorCode::DiscountNotFound,
        DiscountError::Inactive { .. } => ErrorCode::DiscountInactive,
        DiscountError::NotYetValid { .. } => ErrorCode::DiscountNotYetValid,
        DiscountError::Expired { .. } => ErrorCode::DiscountExpired,
        DiscountError::MaxUsesReached { .. } => ErrorCode::DiscountExhausted,
        DiscountError::BelowMinimumSpend { .. } => ErrorCode::BelowMinimumSpend,
    }
}

// =============================================================================
// Cart / Variant
// =============================================================================

#[derive(Debug, Error)]
pub enum CartError {
    #[error("Cart not found: {cart_id}")]
    NotFound { cart_id: String },

    #[error("Cart item not found: {item_id}")]
    ItemNotFound { item_id: String },

    /// A storage failure during a cart operation.
    #[error("Cart operation '{operation}' failed")]
    Failed {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum VariantError {
    #[error("Product variant not found: {variant_id}")]
    NotFound { variant_id: String },
}

// =============================================================================
// Checkout Error
// =============================================================================

/// Errors from [`CartManager`](crate::cart::CartManager),
/// [`DiscountEngine`](crate::discount::DiscountEngine) and
/// [`StockValidator`](crate::stock::StockValidator).
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Variant(#[from] VariantError),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error(transparent)]
    Discount(#[from] DiscountError),
}

impl CheckoutError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CheckoutError::Validation(_) => ErrorCode::ValidationError,
            CheckoutError::Cart(CartError::NotFound { .. }) => ErrorCode::CartNotFound,
            CheckoutError::Cart(CartError::ItemNotFound { .. }) => ErrorCode::CartItemNotFound,
            CheckoutError::Cart(CartError::Failed { .. }) => ErrorCode::StorageError,
            CheckoutError::Variant(_) => ErrorCode::VariantNotFound,
            CheckoutError::Stock(_) => ErrorCode::InsufficientStock,
            CheckoutError::Discount(err) => discount_code(err),
        }
    }

    /// Wraps a storage failure for the named cart operation.
    pub(crate) fn storage(operation: &'static str) -> impl FnOnce(StoreError) -> CheckoutError {
        move |source| CheckoutError::Cart(CartError::Failed { operation, source })
    }
}

pub type CheckoutResult<T> = Result<T, CheckoutError>;

// =============================================================================
// Order Error
// =============================================================================

#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Validation(#[from] OrderValidationError),

    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    /// Every submitted line failed the item checks.
    #[error("Order has no valid items")]
    NoValidItems,

    #[error("Order not found: {order_id}")]
    NotFound { order_id: String },

    #[error(transparent)]
    InvalidTransition(#[from] StatusTransitionError),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("Invalid refund: {reason}")]
    InvalidRefund { reason: String },

    #[error("Payment transaction not found: {transaction_id}")]
    TransactionNotFound { transaction_id: String },

    #[error("Order operation '{operation}' failed")]
    Failed {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl OrderError {
    pub fn code(&self) -> ErrorCode {
        match self {
            OrderError::Validation(_) | OrderError::InvalidInput(_) | OrderError::NoValidItems => {
                ErrorCode::ValidationError
            }
            OrderError::NotFound { .. } => ErrorCode::OrderNotFound,
            OrderError::InvalidTransition(_) => ErrorCode::InvalidStatusTransition,
            OrderError::Stock(_) => ErrorCode::InsufficientStock,
            OrderError::InvalidRefund { .. } => ErrorCode::InvalidRefund,
            OrderError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
            OrderError::Failed { .. } => ErrorCode::StorageError,
        }
    }

    pub(crate) fn storage(operation: &'static str) -> impl FnOnce(StoreError) -> OrderError {
        move |source| OrderError::Failed { operation, source }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err = CheckoutError::from(StockError {
            variant_id: "v".to_string(),
            requested: 3,
            available: 1,
        });
        assert_eq!(err.code(), ErrorCode::InsufficientStock);

        let err = CheckoutError::from(DiscountError::BelowMinimumSpend {
            code: "BIG".to_string(),
            min_spend: 5000,
            subtotal: 100,
            formatted_min: "$50.00".to_string(),
        });
        assert_eq!(err.code(), ErrorCode::BelowMinimumSpend);

        let err = OrderError::from(OrderValidationError::NoItems);
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.to_string(), "Order must have at least one item");
    }

    #[test]
    fn test_storage_failure_hides_backend_detail() {
        let err = CheckoutError::storage("add_item")(StoreError::Backend("disk I/O".to_string()));
        assert_eq!(err.to_string(), "Cart operation 'add_item' failed");
        assert_eq!(err.code(), ErrorCode::StorageError);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::InsufficientStock).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_STOCK\"");
    }
}
