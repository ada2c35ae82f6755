//! # Pricing Calculator
//!
//! Turns cart lines plus a pre-computed discount into the totals shown to
//! the shopper.
//!
//! ```text
//! subtotal   = Σ price × quantity
//! total      = max(0, subtotal − discount)
//! item_count = Σ quantity
//! ```
//!
//! Tax and shipping are deliberately absent here; they are supplied by
//! the caller at order time.

use serde::{Deserialize, Serialize};

use crate::error::PricingError;
use crate::money::Money;
use crate::types::CartItem;

/// A line as the calculator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub price: Money,
    pub quantity: i64,
}

impl PricedLine {
    pub fn new(price: Money, quantity: i64) -> Self {
        PricedLine { price, quantity }
    }
}

impl From<&CartItem> for PricedLine {
    fn from(item: &CartItem) -> Self {
        PricedLine::new(item.price(), item.quantity)
    }
}

/// Computed cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub item_count: i64,
}

/// Computes subtotal, total and item count.
///
/// An empty input yields all zeros. The total is floored at zero when the
/// discount exceeds the subtotal.
///
/// ## Errors
/// - `PricingError::NegativeDiscount` when `discount` < 0
/// - `PricingError::InvalidLine` when a price or quantity is negative
/// - `PricingError::Overflow` when a line or the subtotal leaves the i64 range
pub fn summarize<I>(lines: I, discount: Money) -> Result<Summary, PricingError>
where
    I: IntoIterator<Item = PricedLine>,
{
    if discount.is_negative() {
        return Err(PricingError::NegativeDiscount(discount.cents()));
    }

    let mut subtotal = Money::zero();
    let mut item_count = 0i64;

    for (index, line) in lines.into_iter().enumerate() {
        if line.price.is_negative() || line.quantity < 0 {
            return Err(PricingError::InvalidLine {
                index,
                price: line.price.cents(),
                quantity: line.quantity,
            });
        }
        subtotal = line
            .price
            .checked_mul(line.quantity)
            .and_then(|line_total| subtotal.checked_add(line_total))
            .ok_or(PricingError::Overflow)?;
        item_count = item_count
            .checked_add(line.quantity)
            .ok_or(PricingError::Overflow)?;
    }

    Ok(Summary {
        subtotal,
        discount,
        total: (subtotal - discount).non_negative(),
        item_count,
    })
}

/// Convenience wrapper over cart rows.
pub fn summarize_items(items: &[CartItem], discount: Money) -> Result<Summary, PricingError> {
    summarize(items.iter().map(PricedLine::from), discount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, qty: i64) -> PricedLine {
        PricedLine::new(Money::from_cents(price), qty)
    }

    #[test]
    fn test_fixed_discount_summary() {
        let summary = summarize([line(2500, 2)], Money::from_cents(1000)).unwrap();
        assert_eq!(summary.subtotal.cents(), 5000);
        assert_eq!(summary.discount.cents(), 1000);
        assert_eq!(summary.total.cents(), 4000);
        assert_eq!(summary.item_count, 2);
    }

    #[test]
    fn test_empty_cart_is_zero() {
        let summary = summarize(Vec::new(), Money::zero()).unwrap();
        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn test_total_floors_at_zero() {
        let summary = summarize([line(500, 1)], Money::from_cents(900)).unwrap();
        assert_eq!(summary.total, Money::zero());
    }

    #[test]
    fn test_multiple_lines() {
        let summary = summarize([line(1200, 3), line(450, 2)], Money::zero()).unwrap();
        assert_eq!(summary.subtotal.cents(), 4500);
        assert_eq!(summary.total.cents(), 4500);
        assert_eq!(summary.item_count, 5);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            summarize([line(100, 1)], Money::from_cents(-1)),
            Err(PricingError::NegativeDiscount(-1))
        );
        assert!(matches!(
            summarize([line(100, 1), line(-5, 1)], Money::zero()),
            Err(PricingError::InvalidLine { index: 1, .. })
        ));
    }

    #[test]
    fn test_huge_lines_are_rejected() {
        assert_eq!(
            summarize([line(i64::MAX / 2, 3)], Money::zero()),
            Err(PricingError::Overflow)
        );
        assert_eq!(
            summarize([line(i64::MAX, 1), line(1, 1)], Money::zero()),
            Err(PricingError::Overflow)
        );
    }
}
