//! Write contract for the catalog that consumes cross-market groups.
//!
//! A sink owns only the records this engine produced: each write replaces
//! the previous run's records and leaves every other row alone.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::report::{CrossMarketGroup, ExpansionTier, MIN_GROUP_MARKETS};

/// Tag stamped on every record the engine writes.
pub const ENGINE_SOURCE: &str = "xmarket";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkReport {
    pub products_written: usize,
    pub listings_written: usize,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("group \"{key}\" spans {market_count} market(s); at least 2 required")]
    InsufficientMarkets { key: String, market_count: usize },

    #[error("sink backend error: {0}")]
    Backend(#[source] BoxError),

    #[error(
        "sink write failed after committing {} product(s) and {} listing(s): {source}",
        .committed.products_written,
        .committed.listings_written
    )]
    Partial {
        committed: SinkReport,
        #[source]
        source: BoxError,
    },
}

/// One product-group row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductGroupRecord {
    pub id: String,
    pub comparison_key: String,
    pub title: String,
    pub search_term: String,
    pub market_count: usize,
    pub tier: ExpansionTier,
    pub min_price_usd: Decimal,
    pub max_price_usd: Decimal,
}

/// One (group, market) row: the cheapest listing that market offered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketListingRecord {
    pub product_group_id: String,
    pub market_code: String,
    pub market_name: String,
    pub item_id: String,
    pub title: String,
    pub original_price: Decimal,
    pub original_currency: String,
    pub price_usd: Decimal,
    pub image_url: String,
}

/// Deterministic product-group id derived from the comparison key.
#[must_use]
pub fn product_group_id(comparison_key: &str) -> String {
    let digest = Sha256::digest(comparison_key.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("xm-{hex}")
}

/// Checks every group against the sink-side market invariant.
///
/// # Errors
///
/// Returns [`SinkError::InsufficientMarkets`] for the first offending group.
pub fn validate_groups(groups: &[CrossMarketGroup]) -> Result<(), SinkError> {
    for group in groups {
        if group.markets.len() < MIN_GROUP_MARKETS {
            return Err(SinkError::InsufficientMarkets {
                key: group.key.clone(),
                market_count: group.markets.len(),
            });
        }
    }
    Ok(())
}

/// Expands groups into the rows a sink persists.
#[must_use]
pub fn build_records(
    search_term: &str,
    groups: &[CrossMarketGroup],
) -> (Vec<ProductGroupRecord>, Vec<MarketListingRecord>) {
    let mut products = Vec::with_capacity(groups.len());
    let mut listings = Vec::new();

    for group in groups {
        let id = product_group_id(&group.key);
        for grouped in group.cheapest_per_market() {
            listings.push(MarketListingRecord {
                product_group_id: id.clone(),
                market_code: grouped.market_code.clone(),
                market_name: grouped.market_name.clone(),
                item_id: grouped.listing.item_id.clone(),
                title: grouped.listing.title.clone(),
                original_price: grouped.listing.original_price,
                original_currency: grouped.listing.original_currency.clone(),
                price_usd: grouped.listing.price_usd,
                image_url: grouped.listing.image_url.clone(),
            });
        }
        products.push(ProductGroupRecord {
            id,
            comparison_key: group.key.clone(),
            title: group.representative_title.clone(),
            search_term: search_term.to_string(),
            market_count: group.market_count,
            tier: group.tier,
            min_price_usd: group.min_price_usd,
            max_price_usd: group.max_price_usd,
        });
    }

    (products, listings)
}

/// Persistent destination for a run's cross-market groups.
pub trait CatalogSink {
    /// Replaces the engine's previous records with `groups`.
    fn write_run(
        &self,
        search_term: &str,
        groups: &[CrossMarketGroup],
    ) -> impl Future<Output = Result<SinkReport, SinkError>> + Send;

    /// Counts the engine-owned records currently stored.
    fn count_records(&self) -> impl Future<Output = Result<SinkReport, SinkError>> + Send;
}

/// In-process sink used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    products: Vec<ProductGroupRecord>,
    listings: Vec<MarketListingRecord>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn products(&self) -> Vec<ProductGroupRecord> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .products
            .clone()
    }

    #[must_use]
    pub fn listings(&self) -> Vec<MarketListingRecord> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listings
            .clone()
    }
}

impl CatalogSink for MemorySink {
    async fn write_run(
        &self,
        search_term: &str,
        groups: &[CrossMarketGroup],
    ) -> Result<SinkReport, SinkError> {
        validate_groups(groups)?;
        let (products, listings) = build_records(search_term, groups);
        let report = SinkReport {
            products_written: products.len(),
            listings_written: listings.len(),
        };

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.products = products;
        state.listings = listings;
        Ok(report)
    }

    async fn count_records(&self) -> Result<SinkReport, SinkError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(SinkReport {
            products_written: state.products.len(),
            listings_written: state.listings.len(),
        })
    }
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod tests;
