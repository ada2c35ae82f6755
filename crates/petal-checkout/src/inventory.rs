//! # Inventory Ledger
//!
//! Stock levels are derived, never written directly by checkout:
//!
//! ```text
//! available = stock_quantity (last reconciled) + Σ unreconciled ledger rows
//! ```
//!
//! Orders append `sale` rows. [`Inventory::adjust`] appends manual
//! corrections. [`Inventory::reconcile`] folds the open rows into
//! `stock_quantity` and closes them, in one transaction.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use petal_core::validation::validate_id;
use petal_core::{new_id, InventoryKind, InventoryTransaction, ProductVariant, StockError};

use crate::error::{CheckoutError, CheckoutResult};
use crate::stock::StockValidator;
use crate::store::Store;

#[derive(Clone)]
pub struct Inventory {
    store: Arc<dyn Store>,
    stock: StockValidator,
}

impl Inventory {
    pub fn new(store: Arc<dyn Store>, stock: StockValidator) -> Self {
        Inventory { store, stock }
    }

    /// Derived availability of a variant.
    pub async fn available(&self, variant_id: &str) -> CheckoutResult<i64> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(CheckoutError::storage("stock_level"))?;
        let level = self.stock.level(&mut *tx, variant_id).await?;
        Ok(level.available)
    }

    /// Appends a manual correction. The derived level may not go negative.
    pub async fn adjust(&self, variant_id: &str, delta: i64) -> CheckoutResult<i64> {
        validate_id("variant id", variant_id)?;
        debug!(variant_id = %variant_id, delta = delta, "Adjusting stock");

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(CheckoutError::storage("adjust_stock"))?;
        let level = self.stock.level(&mut *tx, variant_id).await?;

        let next = level.available + delta;
        if next < 0 {
            return Err(StockError {
                variant_id: variant_id.to_string(),
                requested: -delta,
                available: level.available,
            }
            .into());
        }

        tx.insert_inventory_transaction(&InventoryTransaction {
            id: new_id(),
            variant_id: variant_id.to_string(),
            order_id: None,
            quantity: delta,
            kind: InventoryKind::Adjustment,
            reconciled: false,
            created_at: Utc::now(),
        })
        .await
        .map_err(CheckoutError::storage("adjust_stock"))?;
        tx.commit()
            .await
            .map_err(CheckoutError::storage("adjust_stock"))?;

        info!(variant_id = %variant_id, delta = delta, available = next, "Stock adjusted");
        Ok(next)
    }

    /// Folds unreconciled ledger rows into `stock_quantity`.
    pub async fn reconcile(&self, variant_id: &str) -> CheckoutResult<ProductVariant> {
        validate_id("variant id", variant_id)?;

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(CheckoutError::storage("reconcile_stock"))?;
        let level = self.stock.level(&mut *tx, variant_id).await?;

        if level.available < 0 {
            return Err(StockError {
                variant_id: variant_id.to_string(),
                requested: level.variant.stock_quantity - level.available,
                available: level.variant.stock_quantity,
            }
            .into());
        }

        tx.set_variant_stock(variant_id, level.available)
            .await
            .map_err(CheckoutError::storage("reconcile_stock"))?;
        let closed = tx
            .mark_reconciled(variant_id)
            .await
            .map_err(CheckoutError::storage("reconcile_stock"))?;
        tx.commit()
            .await
            .map_err(CheckoutError::storage("reconcile_stock"))?;

        info!(
            variant_id = %variant_id,
            stock_quantity = level.available,
            rows = closed,
            "Stock reconciled"
        );

        Ok(ProductVariant {
            stock_quantity: level.available,
            ..level.variant
        })
    }
}
