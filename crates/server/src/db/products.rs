//! Product repository.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use storesync_core::{ExternalId, Product, ProductVariant};

use super::{StoreError, UpsertOutcome, map_unique_violation};

/// Internal row type for `PostgreSQL` queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    external_id: String,
    name: String,
    brand: String,
    category: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    description: String,
    image_url: String,
    images: Json<Vec<String>>,
    stock_quantity: i64,
    sku: Option<String>,
    barcode: Option<String>,
    tags: Json<BTreeSet<String>>,
    variants: Json<Vec<ProductVariant>>,
    is_new: bool,
    is_featured: bool,
    popularity: i32,
    added_at: Option<DateTime<Utc>>,
    platform_updated_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            external_id: ExternalId::new(row.external_id),
            name: row.name,
            brand: row.brand,
            category: row.category,
            price: row.price,
            compare_at_price: row.compare_at_price,
            description: row.description,
            image_url: row.image_url,
            images: row.images.0,
            stock_quantity: row.stock_quantity,
            sku: row.sku,
            barcode: row.barcode,
            tags: row.tags.0,
            variants: row.variants.0,
            is_new: row.is_new,
            is_featured: row.is_featured,
            popularity: row.popularity,
            added_at: row.added_at,
            platform_updated_at: row.platform_updated_at,
        }
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a product or overwrite the one with the same external ID.
    ///
    /// Every mutable column is replaced; `in_stock` is a generated column and
    /// follows `stock_quantity`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn upsert(&self, product: &Product) -> Result<UpsertOutcome, StoreError> {
        let inserted: bool = sqlx::query_scalar(
            r"
            INSERT INTO storesync.product (
                external_id, name, brand, category, price, compare_at_price,
                description, image_url, images, stock_quantity, sku, barcode,
                tags, variants, is_new, is_featured, popularity, added_at,
                platform_updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT (external_id) DO UPDATE SET
                name = EXCLUDED.name,
                brand = EXCLUDED.brand,
                category = EXCLUDED.category,
                price = EXCLUDED.price,
                compare_at_price = EXCLUDED.compare_at_price,
                description = EXCLUDED.description,
                image_url = EXCLUDED.image_url,
                images = EXCLUDED.images,
                stock_quantity = EXCLUDED.stock_quantity,
                sku = EXCLUDED.sku,
                barcode = EXCLUDED.barcode,
                tags = EXCLUDED.tags,
                variants = EXCLUDED.variants,
                is_new = EXCLUDED.is_new,
                is_featured = EXCLUDED.is_featured,
                popularity = EXCLUDED.popularity,
                added_at = EXCLUDED.added_at,
                platform_updated_at = EXCLUDED.platform_updated_at,
                updated_at = now()
            RETURNING (xmax = 0) AS inserted
            ",
        )
        .bind(product.external_id.as_str())
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.compare_at_price)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(Json(&product.images))
        .bind(product.stock_quantity)
        .bind(product.sku.as_deref())
        .bind(product.barcode.as_deref())
        .bind(Json(&product.tags))
        .bind(Json(&product.variants))
        .bind(product.is_new)
        .bind(product.is_featured)
        .bind(product.popularity)
        .bind(product.added_at)
        .bind(product.platform_updated_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &format!("product {}", product.external_id)))?;

        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    /// Get a product by external ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn get(&self, external_id: &ExternalId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT external_id, name, brand, category, price, compare_at_price,
                   description, image_url, images, stock_quantity, sku, barcode,
                   tags, variants, is_new, is_featured, popularity, added_at,
                   platform_updated_at
            FROM storesync.product
            WHERE external_id = $1
            ",
        )
        .bind(external_id.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Delete a product by external ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn delete(&self, external_id: &ExternalId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM storesync.product WHERE external_id = $1")
            .bind(external_id.as_str())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count mirrored products.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM storesync.product")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
