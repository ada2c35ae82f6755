//! The inventory ledger.

use async_trait::async_trait;

use petal_checkout::store::InventoryStore;
use petal_checkout::StoreResult;
use petal_core::InventoryTransaction;

use super::SqliteTx;
use crate::error::DbError;

#[async_trait]
impl InventoryStore for SqliteTx {
    async fn insert_inventory_transaction(&mut self, entry: &InventoryTransaction) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_transactions (
                id, variant_id, order_id, quantity, kind, reconciled, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.variant_id)
        .bind(&entry.order_id)
        .bind(entry.quantity)
        .bind(entry.kind.as_str())
        .bind(entry.reconciled)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn unreconciled_balance(&mut self, variant_id: &str) -> StoreResult<i64> {
        let balance: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM inventory_transactions \
             WHERE variant_id = ? AND reconciled = 0",
        )
        .bind(variant_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(balance)
    }

    async fn mark_reconciled(&mut self, variant_id: &str) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE inventory_transactions SET reconciled = 1 WHERE variant_id = ? AND reconciled = 0",
        )
        .bind(variant_id)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }
}
