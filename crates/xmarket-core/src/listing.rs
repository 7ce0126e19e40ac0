use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One item returned by one market, normalized and priced in the reference
/// currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalListing {
    /// Upstream item identifier; empty when the upstream omitted it.
    pub item_id: String,
    pub title: String,
    /// Price exactly as listed, in `original_currency`.
    pub original_price: Decimal,
    pub original_currency: String,
    /// Price converted into the reference currency, rounded to cents. Never negative.
    pub price_usd: Decimal,
    /// Condition label as shown by the market, e.g. `"New"` or `"Used"`.
    pub condition: String,
    pub seller: String,
    pub seller_feedback_score: i64,
    pub location: String,
    pub country: String,
    /// Shipping cost converted into the reference currency.
    pub shipping_cost: Decimal,
    pub image_url: String,
    pub category: String,
    pub watch_count: i64,
    pub market_code: String,
    pub market_name: String,
    /// Timestamp of the upstream response this listing came from.
    pub fetched_at: DateTime<Utc>,
    /// When the listing went live, if the upstream reported it.
    pub listed_at: Option<DateTime<Utc>>,
}

/// Response-level metadata for one market query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Total matches the upstream reports, not the number returned.
    pub total_results: u64,
    pub timestamp: DateTime<Utc>,
    pub api_version: String,
}

/// Result of querying one market. Exactly one variant holds per market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EndpointOutcome {
    Success {
        code: String,
        name: String,
        total_results: u64,
        listings: Vec<CanonicalListing>,
        metadata: ResponseMetadata,
    },
    Failure {
        code: String,
        error: String,
    },
}

impl EndpointOutcome {
    #[must_use]
    pub fn failure(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Failure {
            code: code.into(),
            error: error.into(),
        }
    }
}
