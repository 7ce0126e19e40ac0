//! Typed access to the upstream search API's loosely-structured JSON.
//!
//! ## Observed response shape
//!
//! ```json
//! {"findItemsAdvancedResponse": [{
//!     "ack": ["Success"],
//!     "version": ["1.13.0"],
//!     "timestamp": ["2024-05-01T12:00:00.000Z"],
//!     "paginationOutput": [{"totalEntries": ["2417"]}],
//!     "searchResult": [{"@count": "10", "item": [ ... ]}]
//! }]}
//! ```
//!
//! Every scalar is wrapped in a single-element array, including inside
//! items: `"title": ["Apple iPhone 13"]`. Money is an object carrying the
//! amount and currency: `{"@currencyId": "GBP", "__value__": "549.0"}`.
//!
//! Items are not deserialized into a fixed struct. Markets omit fields
//! freely (no `shippingInfo` for collection-only listings, no `sellerInfo`
//! on some regional sites), so every field is read through [`RawItem`]
//! accessors that fall back to a documented default instead of failing.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use xmarket_core::ResponseMetadata;

use crate::error::ScraperError;

/// Upstream operation issued for every market query.
pub const OPERATION: &str = "findItemsAdvanced";

/// One raw listing exactly as the upstream returned it.
#[derive(Debug, Clone)]
pub struct RawItem(Value);

impl RawItem {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Text at `path`; empty string when absent.
    #[must_use]
    pub fn text(&self, path: &[&str]) -> String {
        descend(&self.0, path)
            .and_then(scalar_string)
            .unwrap_or_default()
    }

    /// Integer at `path`; zero when absent or unparseable.
    #[must_use]
    pub fn integer(&self, path: &[&str]) -> i64 {
        descend(&self.0, path)
            .and_then(scalar_string)
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(0)
    }

    /// Money object at `path` as `(amount, currency)`. The currency is empty
    /// when the upstream omitted it; `None` when the amount is absent or
    /// unparseable.
    #[must_use]
    pub fn money(&self, path: &[&str]) -> Option<(Decimal, String)> {
        let node = descend(&self.0, path)?;
        let amount = match node {
            Value::Object(map) => map.get("__value__").and_then(scalar_string),
            other => scalar_string(other),
        }?;
        let amount = parse_decimal(&amount)?;
        let currency = node
            .get("@currencyId")
            .and_then(scalar_string)
            .unwrap_or_default();
        Some((amount, currency))
    }

    /// RFC 3339 timestamp at `path`; `None` when absent or malformed.
    #[must_use]
    pub fn timestamp(&self, path: &[&str]) -> Option<DateTime<Utc>> {
        descend(&self.0, path)
            .and_then(scalar_string)
            .and_then(|s| parse_timestamp(&s))
    }
}

/// One market's answer, after the envelope has been unwrapped.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub ack: String,
    /// First upstream error message, when the upstream sent one.
    pub error_message: Option<String>,
    pub metadata: ResponseMetadata,
    pub items: Vec<RawItem>,
}

impl SearchPage {
    /// Unwraps the `<operation>Response` envelope.
    ///
    /// `fetched_at` stands in for the response timestamp when the upstream
    /// omits it.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::MissingEnvelope`] if the envelope key is absent.
    pub fn from_envelope(
        body: &Value,
        market: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, ScraperError> {
        let envelope_key = format!("{OPERATION}Response");
        let envelope = body
            .get(&envelope_key)
            .and_then(first)
            .ok_or_else(|| ScraperError::MissingEnvelope {
                market: market.to_owned(),
                envelope: envelope_key.clone(),
            })?;

        let text = |path: &[&str]| descend(envelope, path).and_then(scalar_string);

        let ack = text(&["ack"]).unwrap_or_default();
        let error_message = text(&["errorMessage", "error", "message"]);

        let total_results = text(&["paginationOutput", "totalEntries"])
            .or_else(|| text(&["searchResult", "@count"]))
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0);

        let timestamp = text(&["timestamp"])
            .and_then(|s| parse_timestamp(&s))
            .unwrap_or(fetched_at);

        let items = descend(envelope, &["searchResult"])
            .and_then(|r| r.get("item"))
            .and_then(Value::as_array)
            .map(|arr| arr.iter().cloned().map(RawItem::new).collect())
            .unwrap_or_default();

        Ok(Self {
            ack,
            error_message,
            metadata: ResponseMetadata {
                total_results,
                timestamp,
                api_version: text(&["version"]).unwrap_or_default(),
            },
            items,
        })
    }

    /// `true` when the acknowledgement field reads `success` (any case).
    #[must_use]
    pub fn is_acknowledged(&self) -> bool {
        self.ack.trim().eq_ignore_ascii_case("success")
    }
}

/// Unwraps a single-element array; any other value is returned as is.
fn first(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

/// Walks `path` through nested objects, unwrapping single-element arrays
/// at every level.
fn descend<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = first(value)?;
    for key in path {
        current = first(current.get(key)?)?;
    }
    Some(current)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) => first(value).and_then(scalar_string),
        Value::Null | Value::Object(_) => None,
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
