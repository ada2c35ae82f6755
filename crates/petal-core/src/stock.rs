//! # Stock Rules
//!
//! Availability is the reconciled on-hand figure plus every unreconciled
//! ledger movement. A request is satisfiable when the quantity already in
//! the cart plus the newly requested quantity fits within it.

use serde::{Deserialize, Serialize};

use crate::error::StockError;

/// Default count below which a variant reads as "low stock".
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Coarse availability shown next to a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn classify(available: i64, low_threshold: i64) -> Self {
        if available <= 0 {
            StockStatus::OutOfStock
        } else if available < low_threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

/// On-hand count adjusted by unreconciled ledger movements.
#[inline]
pub fn available_stock(on_hand: i64, ledger_balance: i64) -> i64 {
    on_hand + ledger_balance
}

/// Checks that `already_reserved + requested` fits within `available`.
///
/// ```rust
/// use petal_core::stock::check_availability;
///
/// assert!(check_availability("v-1", 5, 3, 2).is_ok());
/// let err = check_availability("v-1", 5, 4, 2).unwrap_err();
/// assert_eq!(err.requested, 6);
/// ```
pub fn check_availability(
    variant_id: &str,
    available: i64,
    requested: i64,
    already_reserved: i64,
) -> Result<(), StockError> {
    let total = already_reserved + requested;
    if total > available {
        return Err(StockError {
            variant_id: variant_id.to_string(),
            requested: total,
            available: available.max(0),
        });
    }
    Ok(())
}
