//! # Validation Module
//!
//! Primitive input checks run by every public service operation before it
//! touches storage.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure)                                           │
//! │  ├── Non-empty identifiers                                             │
//! │  └── Positive, bounded quantities                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Services (petal-checkout)                                    │
//! │  └── Existence / stock / discount rules inside a transaction          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 1), CHECK (stock_quantity >= 0)                │
//! │  └── UNIQUE (cart_id, variant_id), foreign keys                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates an opaque identifier is present.
///
/// ```rust
/// use petal_core::validation::validate_id;
///
/// assert!(validate_id("cart id", "8c1b6f4e").is_ok());
/// assert!(validate_id("cart id", "  ").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed `max`
pub fn validate_quantity(qty: i64, max: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > max {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max,
        });
    }

    Ok(())
}

/// Validates a monetary amount is strictly positive.
pub fn validate_positive_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates the cart has room for another distinct line.
pub fn validate_cart_size(current_lines: usize, max: usize) -> ValidationResult<()> {
    if current_lines >= max {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: max as i64,
        });
    }
    Ok(())
}

/// Trims and upper-cases a discount code. Codes are case-insensitive.
pub fn normalize_discount_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ValidationError::required("discount code"));
    }
    Ok(code.to_uppercase())
}

// =============================================================================
// Unit Tests
// =============================================================================
