//! # Order Rules
//!
//! Validation of a proposed order, the total formula and the order status
//! state machine.
//!
//! ## Total Formula
//! ```text
//! total = subtotal + tax + shipping − discount
//! ```
//! Computed once when the order is created and stored; never recomputed.

use serde::{Deserialize, Serialize};

use crate::error::{OrderValidationError, StatusTransitionError};
use crate::money::Money;
use crate::types::{CompositeItem, OrderStatus};

// =============================================================================
// Order Input
// =============================================================================

/// A line submitted for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub variant_id: String,
    pub product_name: String,
    pub variant_name: String,
    pub quantity: i64,
    pub price_cents: i64,
    #[serde(default)]
    pub composites: Vec<CompositeItem>,
}

impl NewOrderItem {
    /// Lines failing this check are dropped before insertion.
    pub fn is_valid(&self) -> bool {
        !self.product_id.trim().is_empty()
            && !self.variant_id.trim().is_empty()
            && !self.product_name.trim().is_empty()
            && !self.variant_name.trim().is_empty()
            && self.quantity > 0
            && self.price_cents >= 0
    }
}

/// Shipping address as supplied at checkout. Contact fields are copied
/// onto the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    /// Defaults to an empty string when omitted.
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub amount_cents: i64,
    pub address: ShippingAddress,
}

/// Everything needed to create an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: Option<String>,
    /// Origin cart; marked converted when the order commits.
    pub cart_id: Option<String>,
    pub items: Vec<NewOrderItem>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping: ShippingDetails,
    pub discount_cents: Option<i64>,
    pub discount_code: Option<String>,
    pub payment_intent_ref: Option<String>,
}

impl NewOrder {
    /// Checks the order preconditions. The first failing rule wins:
    ///
    /// 1. items non-empty
    /// 2. subtotal > 0
    /// 3. tax >= 0
    /// 4. shipping >= 0
    /// 5. discount >= 0 (when present)
    /// 6. shipping email present
    /// 7. shipping first and last name present
    /// 8. address1, city, postal code and country present
    ///
    /// A total outside the i64 range is rejected with `AmountOutOfRange`
    /// right after the amount rules.
    pub fn validate(&self) -> Result<(), OrderValidationError> {
        if self.items.is_empty() {
            return Err(OrderValidationError::NoItems);
        }
        if self.subtotal_cents <= 0 {
            return Err(OrderValidationError::NonPositiveSubtotal);
        }
        if self.tax_cents < 0 {
            return Err(OrderValidationError::NegativeTax);
        }
        if self.shipping.amount_cents < 0 {
            return Err(OrderValidationError::NegativeShipping);
        }
        if self.discount_cents.is_some_and(|d| d < 0) {
            return Err(OrderValidationError::NegativeDiscount);
        }
        self.total()?;

        let address = &self.shipping.address;
        if is_blank(&address.email) {
            return Err(OrderValidationError::MissingEmail);
        }
        if is_blank(&address.first_name) || is_blank(&address.last_name) {
            return Err(OrderValidationError::MissingName);
        }

        let required = [
            ("address1", &address.address1),
            ("city", &address.city),
            ("postal code", &address.postal_code),
            ("country", &address.country),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| is_blank(value)) {
            return Err(OrderValidationError::IncompleteAddress { field: *field });
        }

        Ok(())
    }

    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents.unwrap_or(0))
    }

    /// `subtotal + tax + shipping − discount`.
    pub fn total(&self) -> Result<Money, OrderValidationError> {
        Money::from_cents(self.subtotal_cents)
            .checked_add(Money::from_cents(self.tax_cents))
            .and_then(|sum| sum.checked_add(Money::from_cents(self.shipping.amount_cents)))
            .and_then(|sum| sum.checked_sub(self.discount()))
            .ok_or(OrderValidationError::AmountOutOfRange)
    }

    /// Items that pass [`NewOrderItem::is_valid`].
    pub fn valid_items(&self) -> impl Iterator<Item = &NewOrderItem> {
        self.items.iter().filter(|item| item.is_valid())
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

// =============================================================================
// Status State Machine
// =============================================================================

impl OrderStatus {
    /// Position along the fulfilment line, `None` for side exits.
    fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::PendingPayment => Some(0),
            OrderStatus::Paid => Some(1),
            OrderStatus::Processing => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled | OrderStatus::Refunded => None,
        }
    }

    /// `delivered`, `cancelled` and `refunded` accept no further moves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Forward moves may skip steps. Side exits are reachable from any
    /// non-terminal status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }

    pub fn transition(self, next: OrderStatus) -> Result<OrderStatus, StatusTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError {
                from: self,
                to: next,
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> NewOrderItem {
        NewOrderItem {
            product_id: "p-1".to_string(),
            variant_id: "v-1".to_string(),
            product_name: "Garden Roses".to_string(),
            variant_name: "Dozen, blush".to_string(),
            quantity: 1,
            price_cents: 100,
            composites: Vec::new(),
        }
    }

    fn order() -> NewOrder {
        NewOrder {
            items: vec![item()],
            subtotal_cents: 100,
            tax_cents: 10,
            shipping: ShippingDetails {
                amount_cents: 5,
                address: ShippingAddress {
                    email: "ada@example.com".to_string(),
                    first_name: "Ada".to_string(),
                    last_name: "Lovelace".to_string(),
                    address1: "1 Garden Row".to_string(),
                    city: "London".to_string(),
                    postal_code: "N1 9GU".to_string(),
                    country: "GB".to_string(),
                    ..Default::default()
                },
            },
            discount_cents: Some(0),
            ..Default::default()
        }
    }

    #[test]
    fn test_total_formula() {
        let order = order();
        assert!(order.validate().is_ok());
        assert_eq!(order.total().unwrap().cents(), 115);
    }

    #[test]
    fn test_first_failing_rule_wins() {
        let mut o = order();
        o.items.clear();
        o.tax_cents = -1;
        assert_eq!(o.validate(), Err(OrderValidationError::NoItems));

        let mut o = order();
        o.subtotal_cents = 0;
        o.tax_cents = -1;
        assert_eq!(o.validate(), Err(OrderValidationError::NonPositiveSubtotal));

        let mut o = order();
        o.shipping.amount_cents = -5;
        assert_eq!(o.validate(), Err(OrderValidationError::NegativeShipping));

        let mut o = order();
        o.discount_cents = Some(-1);
        assert_eq!(o.validate(), Err(OrderValidationError::NegativeDiscount));

        let mut o = order();
        o.shipping.address.email = " ".to_string();
        o.shipping.address.city.clear();
        assert_eq!(o.validate(), Err(OrderValidationError::MissingEmail));

        let mut o = order();
        o.shipping.address.last_name.clear();
        assert_eq!(o.validate(), Err(OrderValidationError::MissingName));

        let mut o = order();
        o.shipping.address.postal_code.clear();
        assert_eq!(
            o.validate(),
            Err(OrderValidationError::IncompleteAddress { field: "postal code" })
        );
    }

    #[test]
    fn test_oversized_amounts_are_rejected() {
        let mut o = order();
        o.subtotal_cents = i64::MAX;
        o.tax_cents = 10;
        assert_eq!(o.total(), Err(OrderValidationError::AmountOutOfRange));
        assert_eq!(o.validate(), Err(OrderValidationError::AmountOutOfRange));

        let mut o = order();
        o.subtotal_cents = i64::MAX - 100;
        o.tax_cents = 50;
        o.shipping.amount_cents = 40;
        o.discount_cents = Some(30);
        assert_eq!(o.total().unwrap().cents(), i64::MAX - 40);
        assert!(o.validate().is_ok());
    }

    #[test]
    fn test_state_is_optional() {
        let mut o = order();
        o.shipping.address.state = None;
        assert!(o.validate().is_ok());
    }

    #[test]
    fn test_item_validity_filter() {
        let mut o = order();
        let mut bad = item();
        bad.variant_name.clear();
        let mut zero = item();
        zero.quantity = 0;
        o.items = vec![bad, zero, item()];
        assert_eq!(o.valid_items().count(), 1);
    }

    #[test]
    fn test_status_transitions() {
        use OrderStatus::*;

        assert!(PendingPayment.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Shipped));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(Shipped.can_transition_to(Refunded));

        assert!(!Paid.can_transition_to(PendingPayment));
        assert!(!Paid.can_transition_to(Paid));
        assert!(!Delivered.can_transition_to(Refunded));
        assert!(!Cancelled.can_transition_to(Paid));
        assert!(!Refunded.can_transition_to(Cancelled));

        assert_eq!(
            Delivered.transition(Paid),
            Err(StatusTransitionError {
                from: Delivered,
                to: Paid
            })
        );
    }
}
