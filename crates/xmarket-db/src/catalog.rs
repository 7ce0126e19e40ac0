//! Postgres-backed [`CatalogSink`] over `product_groups` and `market_listings`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use xmarket_core::{
    build_records, validate_groups, CatalogSink, CrossMarketGroup, MarketListingRecord,
    ProductGroupRecord, SinkError, SinkReport, ENGINE_SOURCE,
};

use crate::{to_i32, DbError};

/// Advisory lock key serializing catalog writers. The value is arbitrary but
/// must stay stable across releases.
const CATALOG_LOCK_KEY: i64 = 0x786d_6b74_6361_7400;

/// A row from the `product_groups` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductGroupRow {
    pub id: String,
    pub source: String,
    pub comparison_key: String,
    pub title: String,
    pub search_term: String,
    pub market_count: i32,
    pub tier: String,
    pub min_price_usd: Decimal,
    pub max_price_usd: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Writes each run inside one transaction: either the previous engine rows
/// are fully replaced or nothing changes.
#[derive(Debug, Clone)]
pub struct PgCatalogSink {
    pool: PgPool,
}

impl PgCatalogSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn replace(
        &self,
        products: &[ProductGroupRecord],
        listings: &[MarketListingRecord],
    ) -> Result<SinkReport, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CATALOG_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM market_listings WHERE source = $1")
            .bind(ENGINE_SOURCE)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM product_groups WHERE source = $1")
            .bind(ENGINE_SOURCE)
            .execute(&mut *tx)
            .await?;

        for product in products {
            insert_product_group(&mut tx, product).await?;
        }
        for listing in listings {
            insert_market_listing(&mut tx, listing).await?;
        }

        tx.commit().await?;

        Ok(SinkReport {
            products_written: products.len(),
            listings_written: listings.len(),
        })
    }

    async fn count(&self) -> Result<SinkReport, DbError> {
        let (products, listings): (i64, i64) = sqlx::query_as(
            "SELECT \
                 (SELECT COUNT(*) FROM product_groups WHERE source = $1), \
                 (SELECT COUNT(*) FROM market_listings WHERE source = $1)",
        )
        .bind(ENGINE_SOURCE)
        .fetch_one(&self.pool)
        .await?;

        Ok(SinkReport {
            products_written: usize::try_from(products).unwrap_or(0),
            listings_written: usize::try_from(listings).unwrap_or(0),
        })
    }
}

impl CatalogSink for PgCatalogSink {
    async fn write_run(
        &self,
        search_term: &str,
        groups: &[CrossMarketGroup],
    ) -> Result<SinkReport, SinkError> {
        validate_groups(groups)?;
        let (products, listings) = build_records(search_term, groups);

        let report = self
            .replace(&products, &listings)
            .await
            .map_err(|e| SinkError::Backend(Box::new(e)))?;

        tracing::info!(
            products = report.products_written,
            listings = report.listings_written,
            "catalog replaced"
        );
        Ok(report)
    }

    async fn count_records(&self) -> Result<SinkReport, SinkError> {
        self.count()
            .await
            .map_err(|e| SinkError::Backend(Box::new(e)))
    }
}

async fn insert_product_group(
    tx: &mut Transaction<'_, Postgres>,
    product: &ProductGroupRecord,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO product_groups \
             (id, source, comparison_key, title, search_term, market_count, tier, \
              min_price_usd, max_price_usd) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(&product.id)
    .bind(ENGINE_SOURCE)
    .bind(&product.comparison_key)
    .bind(&product.title)
    .bind(&product.search_term)
    .bind(to_i32("market_count", product.market_count)?)
    .bind(product.tier.as_str())
    .bind(product.min_price_usd)
    .bind(product.max_price_usd)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_market_listing(
    tx: &mut Transaction<'_, Postgres>,
    listing: &MarketListingRecord,
) -> Result<(), DbError> {
    let image_url = (!listing.image_url.is_empty()).then_some(listing.image_url.as_str());

    sqlx::query(
        "INSERT INTO market_listings \
             (product_group_id, source, market_code, market_name, item_id, title, \
              original_price, original_currency, price_usd, image_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(&listing.product_group_id)
    .bind(ENGINE_SOURCE)
    .bind(&listing.market_code)
    .bind(&listing.market_name)
    .bind(&listing.item_id)
    .bind(&listing.title)
    .bind(listing.original_price)
    .bind(&listing.original_currency)
    .bind(listing.price_usd)
    .bind(image_url)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Returns engine-owned product groups, widest coverage first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_groups(pool: &PgPool) -> Result<Vec<ProductGroupRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductGroupRow>(
        "SELECT id, source, comparison_key, title, search_term, market_count, tier, \
                min_price_usd, max_price_usd, created_at \
         FROM product_groups \
         WHERE source = $1 \
         ORDER BY market_count DESC, id",
    )
    .bind(ENGINE_SOURCE)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
