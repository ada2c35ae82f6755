//! # Stock Validator
//!
//! Checks a requested quantity against the derived stock level of a
//! variant. Performs no writes; callers run it inside the same
//! transaction as the mutation that depends on it.
//!
//! ```text
//! available = variant.stock_quantity + Σ unreconciled ledger rows
//! ok        = already_reserved + requested <= available
//! ```

use tracing::debug;

use petal_core::stock::{self, StockStatus};
use petal_core::validation::validate_id;
use petal_core::ProductVariant;

use crate::error::{CheckoutError, CheckoutResult, VariantError};
use crate::store::{StoreResult, StoreTx};

/// A variant together with its derived availability.
#[derive(Debug, Clone, PartialEq)]
pub struct StockLevel {
    pub variant: ProductVariant,
    pub available: i64,
}

/// Derived availability for a variant already loaded in `tx`.
pub async fn ledger_available(tx: &mut dyn StoreTx, variant: &ProductVariant) -> StoreResult<i64> {
    let balance = tx.unreconciled_balance(&variant.id).await?;
    Ok(stock::available_stock(variant.stock_quantity, balance))
}

#[derive(Debug, Clone, Copy)]
pub struct StockValidator {
    low_stock_threshold: i64,
}

impl Default for StockValidator {
    fn default() -> Self {
        StockValidator::new(stock::DEFAULT_LOW_STOCK_THRESHOLD)
    }
}

impl StockValidator {
    pub fn new(low_stock_threshold: i64) -> Self {
        StockValidator {
            low_stock_threshold,
        }
    }

    /// Loads the variant and its derived availability.
    ///
    /// ## Errors
    /// - `VariantError::NotFound` when the variant does not exist
    pub async fn level(&self, tx: &mut dyn StoreTx, variant_id: &str) -> CheckoutResult<StockLevel> {
        validate_id("variant id", variant_id)?;

        let variant = tx
            .find_variant(variant_id)
            .await
            .map_err(CheckoutError::storage("find_variant"))?
            .ok_or_else(|| VariantError::NotFound {
                variant_id: variant_id.to_string(),
            })?;

        let available = ledger_available(tx, &variant)
            .await
            .map_err(CheckoutError::storage("stock_level"))?;

        Ok(StockLevel { variant, available })
    }

    /// Succeeds when `already_reserved + requested` fits the derived stock.
    ///
    /// ## Errors
    /// - `VariantError::NotFound` when the variant does not exist
    /// - `StockError` carrying the requested total and the available count
    pub async fn check_availability(
        &self,
        tx: &mut dyn StoreTx,
        variant_id: &str,
        requested: i64,
        already_reserved: i64,
    ) -> CheckoutResult<StockLevel> {
        let level = self.level(tx, variant_id).await?;

        debug!(
            variant_id = %variant_id,
            requested = requested,
            already_reserved = already_reserved,
            available = level.available,
            "Checking stock"
        );

        stock::check_availability(variant_id, level.available, requested, already_reserved)?;
        Ok(level)
    }

    pub fn status(&self, available: i64) -> StockStatus {
        StockStatus::classify(available, self.low_stock_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::Store;
    use crate::testing::{seed_variant, variant};
    use chrono::Utc;
    use petal_core::{InventoryKind, InventoryTransaction};

    #[tokio::test]
    async fn test_check_within_stock() {
        let store = MemoryStore::new();
        seed_variant(&store, variant("v-1", 2500, 5)).await;

        let validator = StockValidator::default();
        let mut tx = store.begin().await.unwrap();

        let level = validator.check_availability(&mut *tx, "v-1", 3, 2).await.unwrap();
        assert_eq!(level.available, 5);

        let err = validator
            .check_availability(&mut *tx, "v-1", 4, 2)
            .await
            .unwrap_err();
        match err {
            CheckoutError::Stock(e) => {
                assert_eq!(e.requested, 6);
                assert_eq!(e.available, 5);
            }
            other => panic!("expected stock error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_variant() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = StockValidator::default()
            .check_availability(&mut *tx, "missing", 1, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Variant(VariantError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_ledger_reduces_availability() {
        let store = MemoryStore::new();
        seed_variant(&store, variant("v-1", 2500, 5)).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_inventory_transaction(&InventoryTransaction {
            id: "t-1".to_string(),
            variant_id: "v-1".to_string(),
            order_id: None,
            quantity: -4,
            kind: InventoryKind::Sale,
            reconciled: false,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

        let validator = StockValidator::default();
        let level = validator.level(&mut *tx, "v-1").await.unwrap();
        assert_eq!(level.available, 1);
        assert_eq!(validator.status(level.available), StockStatus::LowStock);
        assert!(validator.check_availability(&mut *tx, "v-1", 2, 0).await.is_err());
    }
}
