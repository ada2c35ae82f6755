//! # Discount Engine
//!
//! Resolves codes, validates them against a cart and records usage.
//!
//! ## Usage Accounting
//! ```text
//! apply(cart, code)
//!   │
//!   ├── redemption (discount, cart) exists? ──yes──► no increment
//!   │                                                 (cap check skipped:
//!   │                                                  this cart already
//!   │                                                  holds a use)
//!   │
//!   └── no ──► increment used_count (guarded by max_uses)
//!              insert redemption
//! ```
//! Usage is consumed on the first application to a cart and never
//! released, even if the code is later removed or the cart abandoned.
//! Both writes share the caller's transaction with the cart update.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use petal_core::discount::{self, DiscountEffect};
use petal_core::validation::normalize_discount_code;
use petal_core::{Cart, Discount, DiscountError, Money, MoneyFormat};

use crate::error::{CheckoutError, CheckoutResult};
use crate::store::StoreTx;

#[derive(Debug, Clone, Default)]
pub struct DiscountEngine {
    money_format: MoneyFormat,
}

impl DiscountEngine {
    pub fn new(money_format: MoneyFormat) -> Self {
        DiscountEngine { money_format }
    }

    /// Looks a code up, case-insensitively.
    ///
    /// ## Errors
    /// - `ValidationError` for a blank code
    /// - `DiscountError::NotFound` for an unknown code
    pub async fn resolve(&self, tx: &mut dyn StoreTx, code: &str) -> CheckoutResult<Discount> {
        let code = normalize_discount_code(code)?;
        let found = tx
            .find_discount_by_code(&code)
            .await
            .map_err(CheckoutError::storage("resolve_discount"))?;

        found.ok_or_else(|| DiscountError::NotFound { code }.into())
    }

    /// Applicability of `discount` to a cart with `subtotal` at `now`.
    pub fn validate(
        &self,
        discount: &Discount,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<(), DiscountError> {
        discount::validate(discount, subtotal, now, &self.money_format)
    }

    pub fn compute_amount(&self, discount: &Discount, subtotal: Money) -> DiscountEffect {
        discount::compute_amount(discount, subtotal)
    }

    /// Validates, records usage and writes the code and amounts onto `cart`.
    ///
    /// The caller persists `cart` in the same transaction.
    pub async fn apply(
        &self,
        tx: &mut dyn StoreTx,
        cart: &mut Cart,
        discount: &Discount,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> CheckoutResult<DiscountEffect> {
        let redeemed = tx
            .has_redemption(&discount.id, &cart.id)
            .await
            .map_err(CheckoutError::storage("apply_discount"))?;

        self.check(discount, subtotal, now, redeemed)?;

        if !redeemed {
            let counted = tx
                .increment_discount_usage(&discount.id)
                .await
                .map_err(CheckoutError::storage("apply_discount"))?;
            if !counted {
                return Err(DiscountError::MaxUsesReached {
                    code: discount.code.clone(),
                }
                .into());
            }
            tx.insert_redemption(&discount.id, &cart.id, now)
                .await
                .map_err(CheckoutError::storage("apply_discount"))?;
            info!(code = %discount.code, cart_id = %cart.id, "Discount usage recorded");
        }

        let effect = self.compute_amount(discount, subtotal);
        set_effect(cart, &discount.code, effect);
        Ok(effect)
    }

    /// Recomputes the attached discount against a new subtotal. A code that
    /// no longer applies is detached. Usage is left as is.
    pub async fn refresh(
        &self,
        tx: &mut dyn StoreTx,
        cart: &mut Cart,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> CheckoutResult<()> {
        let Some(code) = cart.discount_code.clone() else {
            return Ok(());
        };

        let found = tx
            .find_discount_by_code(&code)
            .await
            .map_err(CheckoutError::storage("refresh_discount"))?;

        let Some(discount) = found else {
            debug!(code = %code, cart_id = %cart.id, "Attached discount no longer exists");
            cart.clear_discount();
            return Ok(());
        };

        let redeemed = tx
            .has_redemption(&discount.id, &cart.id)
            .await
            .map_err(CheckoutError::storage("refresh_discount"))?;

        match self.check(&discount, subtotal, now, redeemed) {
            Ok(()) => set_effect(cart, &discount.code, self.compute_amount(&discount, subtotal)),
            Err(reason) => {
                info!(code = %code, cart_id = %cart.id, %reason, "Detaching discount");
                cart.clear_discount();
            }
        }
        Ok(())
    }

    /// A cart that already redeemed the code keeps it past the usage cap.
    fn check(
        &self,
        discount: &Discount,
        subtotal: Money,
        now: DateTime<Utc>,
        redeemed: bool,
    ) -> Result<(), DiscountError> {
        if redeemed && discount.max_uses.is_some() {
            let uncapped = Discount {
                max_uses: None,
                ..discount.clone()
            };
            return self.validate(&uncapped, subtotal, now);
        }
        self.validate(discount, subtotal, now)
    }
}

fn set_effect(cart: &mut Cart, code: &str, effect: DiscountEffect) {
    cart.discount_code = Some(code.to_string());
    cart.discount_cents = effect.subtotal_reduction().cents();
    cart.shipping_discount_cents = effect.shipping_reduction().cents();
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::Store;
    use crate::testing::discount;
    use petal_core::DiscountType;

    async fn store_with(d: Discount) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_discount(d).await;
        store
    }

    fn cart() -> Cart {
        Cart::new(Some("sess".to_string()), None, Utc::now())
    }

    #[tokio::test]
    async fn test_resolve_is_case_insensitive() {
        let store = store_with(discount("SPRING10", DiscountType::Percentage, 10)).await;
        let engine = DiscountEngine::default();
        let mut tx = store.begin().await.unwrap();

        let found = engine.resolve(&mut *tx, "  spring10 ").await.unwrap();
        assert_eq!(found.code, "SPRING10");

        let err = engine.resolve(&mut *tx, "NOPE").await.unwrap_err();
        assert!(matches!(err, CheckoutError::Discount(DiscountError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_apply_counts_once_per_cart() {
        let store = store_with(discount("SPRING10", DiscountType::Percentage, 10)).await;
        let engine = DiscountEngine::default();
        let mut cart = cart();

        let mut tx = store.begin().await.unwrap();
        let d = engine.resolve(&mut *tx, "SPRING10").await.unwrap();
        let now = Utc::now();
        engine
            .apply(&mut *tx, &mut cart, &d, Money::from_cents(10000), now)
            .await
            .unwrap();
        engine
            .apply(&mut *tx, &mut cart, &d, Money::from_cents(10000), now)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(cart.discount_cents, 1000);
        let state = store.snapshot().await;
        assert_eq!(state.discounts["d-spring10"].used_count, 1);
    }

    #[tokio::test]
    async fn test_cap_reached_by_other_carts() {
        let mut d = discount("ONCE", DiscountType::Fixed, 500);
        d.max_uses = Some(1);
        let store = store_with(d).await;
        let engine = DiscountEngine::default();

        let mut first = cart();
        let mut second = cart();
        let mut tx = store.begin().await.unwrap();
        let d = engine.resolve(&mut *tx, "ONCE").await.unwrap();
        engine
            .apply(&mut *tx, &mut first, &d, Money::from_cents(5000), Utc::now())
            .await
            .unwrap();

        let d = engine.resolve(&mut *tx, "ONCE").await.unwrap();
        let err = engine
            .apply(&mut *tx, &mut second, &d, Money::from_cents(5000), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Discount(DiscountError::MaxUsesReached { .. })));

        // the cart holding the only use may still re-apply it
        engine
            .apply(&mut *tx, &mut first, &d, Money::from_cents(6000), Utc::now())
            .await
            .unwrap();
        assert_eq!(first.discount_cents, 500);
    }

    #[tokio::test]
    async fn test_refresh_detaches_below_minimum() {
        let mut d = discount("BIGSPEND", DiscountType::Fixed, 1000);
        d.min_spend_cents = Some(5000);
        let store = store_with(d).await;
        let engine = DiscountEngine::default();
        let mut cart = cart();

        let mut tx = store.begin().await.unwrap();
        let d = engine.resolve(&mut *tx, "BIGSPEND").await.unwrap();
        engine
            .apply(&mut *tx, &mut cart, &d, Money::from_cents(6000), Utc::now())
            .await
            .unwrap();

        engine
            .refresh(&mut *tx, &mut cart, Money::from_cents(5500), Utc::now())
            .await
            .unwrap();
        assert_eq!(cart.discount_cents, 1000);

        engine
            .refresh(&mut *tx, &mut cart, Money::from_cents(4000), Utc::now())
            .await
            .unwrap();
        assert!(cart.discount_code.is_none());
        assert_eq!(cart.discount_cents, 0);
    }

    #[tokio::test]
    async fn test_shipping_discount_kept_apart() {
        let store = store_with(discount("FREESHIP", DiscountType::Shipping, 799)).await;
        let engine = DiscountEngine::default();
        let mut cart = cart();

        let mut tx = store.begin().await.unwrap();
        let d = engine.resolve(&mut *tx, "freeship").await.unwrap();
        engine
            .apply(&mut *tx, &mut cart, &d, Money::from_cents(3000), Utc::now())
            .await
            .unwrap();

        assert_eq!(cart.discount_cents, 0);
        assert_eq!(cart.shipping_discount_cents, 799);
    }
}
