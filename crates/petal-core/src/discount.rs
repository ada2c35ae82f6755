//! # Discount Rules
//!
//! Pure applicability checks and amount computation for promotional codes.
//!
//! ## Applicability
//! ```text
//! active? ──no──► Inactive
//!   │
//! now >= valid_from? ──no──► NotYetValid
//!   │
//! now <= valid_until? ──no──► Expired
//!   │
//! used_count < max_uses? ──no──► MaxUsesReached
//!   │
//! subtotal >= min_spend? ──no──► BelowMinimumSpend
//!   │
//!   ▼
//!  Ok
//! ```
//!
//! ## Amounts
//! | Type         | Effect                                        |
//! |--------------|-----------------------------------------------|
//! | `percentage` | round(subtotal × value / 100), capped         |
//! | `fixed`      | value, capped at subtotal                     |
//! | `shipping`   | value, taken off shipping, never the subtotal |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DiscountError;
use crate::money::{Money, MoneyFormat};
use crate::types::{Discount, DiscountType};

/// What applying a discount does to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum DiscountEffect {
    /// Reduces the merchandise subtotal.
    Subtotal(Money),
    /// Signal amount for the shipping calculation.
    Shipping(Money),
}

impl DiscountEffect {
    pub fn subtotal_reduction(&self) -> Money {
        match self {
            DiscountEffect::Subtotal(amount) => *amount,
            DiscountEffect::Shipping(_) => Money::zero(),
        }
    }

    pub fn shipping_reduction(&self) -> Money {
        match self {
            DiscountEffect::Subtotal(_) => Money::zero(),
            DiscountEffect::Shipping(amount) => *amount,
        }
    }
}

/// Checks whether `discount` may be applied to a cart with `subtotal` at `now`.
///
/// The first failing rule wins, in the order shown in the module docs.
pub fn validate(
    discount: &Discount,
    subtotal: Money,
    now: DateTime<Utc>,
    money_format: &MoneyFormat,
) -> Result<(), DiscountError> {
    let code = discount.code.clone();

    if !discount.active {
        return Err(DiscountError::Inactive { code });
    }

    if now < discount.valid_from {
        return Err(DiscountError::NotYetValid { code });
    }

    if let Some(until) = discount.valid_until {
        if now > until {
            return Err(DiscountError::Expired { code });
        }
    }

    if let Some(max_uses) = discount.max_uses {
        if discount.used_count >= max_uses {
            return Err(DiscountError::MaxUsesReached { code });
        }
    }

    if let Some(min_spend) = discount.min_spend_cents {
        if subtotal.cents() < min_spend {
            return Err(DiscountError::BelowMinimumSpend {
                code,
                min_spend,
                subtotal: subtotal.cents(),
                formatted_min: money_format.format(Money::from_cents(min_spend)),
            });
        }
    }

    Ok(())
}

/// Computes the effect of `discount` on a cart with `subtotal`.
///
/// Subtotal reductions never exceed the subtotal, so a total can never be
/// pushed below zero by a discount.
///
/// ```rust
/// use petal_core::discount::{compute_amount, DiscountEffect};
/// # use petal_core::{Discount, DiscountType, Money};
/// # let discount = Discount {
/// #     id: "d".into(), code: "TEN".into(), discount_type: DiscountType::Percentage,
/// #     value: 10, min_spend_cents: None, max_uses: None, used_count: 0,
/// #     valid_from: chrono::Utc::now(), valid_until: None, active: true,
/// # };
/// let effect = compute_amount(&discount, Money::from_cents(10000));
/// assert_eq!(effect, DiscountEffect::Subtotal(Money::from_cents(1000)));
/// ```
pub fn compute_amount(discount: &Discount, subtotal: Money) -> DiscountEffect {
    let subtotal = subtotal.non_negative();
    let value = discount.value.max(0);

    match discount.discount_type {
        DiscountType::Percentage => {
            DiscountEffect::Subtotal(subtotal.percentage(value).min(subtotal))
        }
        DiscountType::Fixed => DiscountEffect::Subtotal(Money::from_cents(value).min(subtotal)),
        DiscountType::Shipping => DiscountEffect::Shipping(Money::from_cents(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn discount(kind: DiscountType, value: i64) -> Discount {
        Discount {
            id: "d-1".to_string(),
            code: "SPRING".to_string(),
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

    #[test]
    fn test_percentage_amount() {
        let d = discount(DiscountType::Percentage, 10);
        let effect = compute_amount(&d, Money::from_cents(10000));
        assert_eq!(effect.subtotal_reduction().cents(), 1000);
        assert!(effect.shipping_reduction().is_zero());
    }

    #[test]
    fn test_fixed_amount_capped() {
        let d = discount(DiscountType::Fixed, 1500);
        assert_eq!(compute_amount(&d, Money::from_cents(10000)).subtotal_reduction().cents(), 1500);
        assert_eq!(compute_amount(&d, Money::from_cents(900)).subtotal_reduction().cents(), 900);
    }

    #[test]
    fn test_shipping_is_a_signal() {
        let d = discount(DiscountType::Shipping, 499);
        let effect = compute_amount(&d, Money::from_cents(100));
        assert_eq!(effect, DiscountEffect::Shipping(Money::from_cents(499)));
        assert!(effect.subtotal_reduction().is_zero());
    }

    #[test]
    fn test_validate_rules_in_order() {
        let now = Utc::now();
        let fmt = MoneyFormat::default();
        let subtotal = Money::from_cents(5000);

        let mut d = discount(DiscountType::Fixed, 500);
        assert!(validate(&d, subtotal, now, &fmt).is_ok());

        d.active = false;
        d.valid_until = Some(now - Duration::hours(1));
        assert!(matches!(validate(&d, subtotal, now, &fmt), Err(DiscountError::Inactive { .. })));

        d.active = true;
        assert!(matches!(validate(&d, subtotal, now, &fmt), Err(DiscountError::Expired { .. })));

        d.valid_until = None;
        d.valid_from = now + Duration::hours(1);
        assert!(matches!(validate(&d, subtotal, now, &fmt), Err(DiscountError::NotYetValid { .. })));

        d.valid_from = now - Duration::hours(1);
        d.max_uses = Some(3);
        d.used_count = 3;
        assert!(matches!(validate(&d, subtotal, now, &fmt), Err(DiscountError::MaxUsesReached { .. })));
    }

    #[test]
    fn test_minimum_spend_message_uses_format() {
        let mut d = discount(DiscountType::Fixed, 500);
        d.min_spend_cents = Some(7500);

        let err = validate(&d, Money::from_cents(5000), Utc::now(), &MoneyFormat::new("£")).unwrap_err();
        assert_eq!(err.to_string(), "A minimum spend of £75.00 is required for code SPRING");

        assert!(validate(&d, Money::from_cents(7500), Utc::now(), &MoneyFormat::default()).is_ok());
    }
}
