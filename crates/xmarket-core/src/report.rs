use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::listing::CanonicalListing;

/// Minimum distinct markets for a group to count as cross-market.
pub const MIN_GROUP_MARKETS: usize = 2;

/// Distinct markets at which a group is labelled [`ExpansionTier::Global`].
pub const GLOBAL_TIER_MARKETS: usize = 4;

/// Coarse label for how widely a product is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionTier {
    /// Two or three markets.
    Multi,
    /// Four or more markets.
    Global,
}

impl ExpansionTier {
    #[must_use]
    pub fn for_market_count(count: usize) -> Self {
        if count >= GLOBAL_TIER_MARKETS {
            Self::Global
        } else {
            Self::Multi
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Multi => "multi",
            Self::Global => "global",
        }
    }
}

impl std::fmt::Display for ExpansionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedListing {
    pub listing: CanonicalListing,
    pub market_code: String,
    pub market_name: String,
}

/// Listings from at least two markets that share a comparison key.
///
/// Built fresh every run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossMarketGroup {
    pub key: String,
    /// Title of the first listing seen for this key.
    pub representative_title: String,
    pub market_count: usize,
    /// Distinct market codes, first-seen order.
    pub markets: Vec<String>,
    pub listing_count: usize,
    pub min_price_usd: Decimal,
    pub max_price_usd: Decimal,
    pub listings: Vec<GroupedListing>,
    pub tier: ExpansionTier,
}

impl CrossMarketGroup {
    #[must_use]
    pub fn price_spread(&self) -> Decimal {
        self.max_price_usd - self.min_price_usd
    }

    /// Cheapest listing per market, in `markets` order.
    #[must_use]
    pub fn cheapest_per_market(&self) -> Vec<&GroupedListing> {
        self.markets
            .iter()
            .filter_map(|code| {
                self.listings
                    .iter()
                    .filter(|g| &g.market_code == code)
                    .min_by_key(|g| g.listing.price_usd)
            })
            .collect()
    }
}

/// Per-market counts for a market that answered successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketTally {
    pub code: String,
    /// Items returned in this run's page.
    pub returned: usize,
    /// Matches the upstream reports in total.
    pub total_results: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointFailure {
    pub code: String,
    pub error: String,
}

/// Everything a caller learns from one search across all markets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub search_term: String,
    pub endpoints_attempted: usize,
    /// Market codes that answered successfully, configuration order.
    pub succeeded: Vec<String>,
    /// Counts for each succeeded market, same order as `succeeded`.
    pub tallies: Vec<MarketTally>,
    pub failures: Vec<EndpointFailure>,
    pub total_listings: usize,
    pub groups: Vec<CrossMarketGroup>,
    pub ran_at: DateTime<Utc>,
}

impl RunResult {
    #[must_use]
    pub fn failed_codes(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.code.as_str()).collect()
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// `true` when at least one market failed but not all of them.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() && !self.succeeded.is_empty()
    }
}
