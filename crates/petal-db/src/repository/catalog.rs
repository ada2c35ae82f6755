//! Products and variants.
//!
//! Checkout only reads the catalogue (plus the reconciled stock figure);
//! [`CatalogRepository`] is the write side used by seeding and admin tools.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use petal_checkout::store::CatalogStore;
use petal_checkout::StoreResult;
use petal_core::{Product, ProductVariant};

use super::{parse_json, to_json, SqliteTx};
use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    name: String,
    slug: String,
    images: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> DbResult<Self> {
        Ok(Product {
            images: parse_json("products.images", &row.images)?,
            id: row.id,
            name: row.name,
            slug: row.slug,
        })
    }
}

#[derive(Debug, FromRow)]
struct VariantRow {
    id: String,
    product_id: String,
    sku: String,
    name: String,
    price_cents: i64,
    locale_prices: String,
    stock_quantity: i64,
    attributes: String,
}

impl TryFrom<VariantRow> for ProductVariant {
    type Error = DbError;

    fn try_from(row: VariantRow) -> DbResult<Self> {
        let locale_prices: BTreeMap<String, i64> =
            parse_json("product_variants.locale_prices", &row.locale_prices)?;
        let attributes: BTreeMap<String, String> =
            parse_json("product_variants.attributes", &row.attributes)?;
        Ok(ProductVariant {
            id: row.id,
            product_id: row.product_id,
            sku: row.sku,
            name: row.name,
            price_cents: row.price_cents,
            locale_prices,
            stock_quantity: row.stock_quantity,
            attributes,
        })
    }
}

const VARIANT_SELECT: &str = "SELECT id, product_id, sku, name, price_cents, locale_prices, \
     stock_quantity, attributes FROM product_variants WHERE id = ?";

const PRODUCT_SELECT: &str = "SELECT id, name, slug, images FROM products WHERE id = ?";

// =============================================================================
// Port
// =============================================================================

#[async_trait]
impl CatalogStore for SqliteTx {
    async fn find_variant(&mut self, variant_id: &str) -> StoreResult<Option<ProductVariant>> {
        let row: Option<VariantRow> = sqlx::query_as(VARIANT_SELECT)
            .bind(variant_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(ProductVariant::try_from).transpose()?)
    }

    async fn find_product(&mut self, product_id: &str) -> StoreResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(PRODUCT_SELECT)
            .bind(product_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Product::try_from).transpose()?)
    }

    async fn set_variant_stock(&mut self, variant_id: &str, stock_quantity: i64) -> StoreResult<()> {
        let result = sqlx::query("UPDATE product_variants SET stock_quantity = ? WHERE id = ?")
            .bind(stock_quantity)
            .bind(variant_id)
            .execute(&mut *self.tx)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductVariant", variant_id).into());
        }
        Ok(())
    }
}

// =============================================================================
// Admin Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Inserts or replaces a product.
    pub async fn upsert_product(&self, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, slug, images) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, slug = excluded.slug, images = excluded.images
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(to_json("products.images", &product.images)?)
        .execute(&self.pool)
        .await?;

        debug!(product_id = %product.id, "Product saved");
        Ok(())
    }

    /// Inserts or replaces a variant, including its reconciled stock figure.
    pub async fn upsert_variant(&self, variant: &ProductVariant) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_variants (
                id, product_id, sku, name, price_cents, locale_prices, stock_quantity, attributes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                product_id = excluded.product_id,
                sku = excluded.sku,
                name = excluded.name,
                price_cents = excluded.price_cents,
                locale_prices = excluded.locale_prices,
                stock_quantity = excluded.stock_quantity,
                attributes = excluded.attributes
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.sku)
        .bind(&variant.name)
        .bind(variant.price_cents)
        .bind(to_json("product_variants.locale_prices", &variant.locale_prices)?)
        .bind(variant.stock_quantity)
        .bind(to_json("product_variants.attributes", &variant.attributes)?)
        .execute(&self.pool)
        .await?;

        debug!(variant_id = %variant.id, sku = %variant.sku, "Variant saved");
        Ok(())
    }

    pub async fn get_variant(&self, variant_id: &str) -> DbResult<Option<ProductVariant>> {
        let row: Option<VariantRow> = sqlx::query_as(VARIANT_SELECT)
            .bind(variant_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ProductVariant::try_from).transpose()
    }

    pub async fn count_variants(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_variants")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
