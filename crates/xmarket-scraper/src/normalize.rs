//! Normalization from raw upstream items to [`xmarket_core::CanonicalListing`].
//!
//! Field access goes through [`crate::types::RawItem`]; this module only
//! decides defaults and converts money into the reference currency.
//!
//! | Field | Source path | Default |
//! |---|---|---|
//! | `item_id` | `itemId` | `""` |
//! | `title` | `title` | `""` |
//! | `original_price` | `sellingStatus.currentPrice` | `0` |
//! | `original_currency` | `currentPrice.@currencyId` | market currency |
//! | `condition` | `condition.conditionDisplayName` | `""` |
//! | `seller` | `sellerInfo.sellerUserName` | `""` |
//! | `seller_feedback_score` | `sellerInfo.feedbackScore` | `0` |
//! | `location` / `country` | `location` / `country` | `""` |
//! | `shipping_cost` | `shippingInfo.shippingServiceCost` | `0` |
//! | `image_url` | `galleryURL` | `""` |
//! | `category` | `primaryCategory.categoryName` | `""` |
//! | `watch_count` | `listingInfo.watchCount` | `0` |
//! | `listed_at` | `listingInfo.startTime` | `None` |

use rust_decimal::Decimal;
use xmarket_core::{CanonicalListing, CurrencyTable, MarketEndpoint, ResponseMetadata};

use crate::types::{RawItem, SearchPage};

/// Normalizes one raw item. Never fails: every missing or malformed field
/// resolves to its default so one bad item cannot sink the batch.
#[must_use]
pub fn normalize_item(
    item: &RawItem,
    market: &MarketEndpoint,
    metadata: &ResponseMetadata,
    rates: &CurrencyTable,
) -> CanonicalListing {
    let (original_price, original_currency, price_usd) =
        read_money(item, &["sellingStatus", "currentPrice"], &market.currency, rates);
    let (_, _, shipping_cost) = read_money(
        item,
        &["shippingInfo", "shippingServiceCost"],
        &original_currency,
        rates,
    );

    CanonicalListing {
        item_id: item.text(&["itemId"]),
        title: item.text(&["title"]),
        price_usd,
        original_price,
        original_currency,
        condition: item.text(&["condition", "conditionDisplayName"]),
        seller: item.text(&["sellerInfo", "sellerUserName"]),
        seller_feedback_score: item.integer(&["sellerInfo", "feedbackScore"]),
        location: item.text(&["location"]),
        country: item.text(&["country"]),
        shipping_cost,
        image_url: item.text(&["galleryURL"]),
        category: item.text(&["primaryCategory", "categoryName"]),
        watch_count: item.integer(&["listingInfo", "watchCount"]),
        market_code: market.code.clone(),
        market_name: market.name.clone(),
        fetched_at: metadata.timestamp,
        listed_at: item.timestamp(&["listingInfo", "startTime"]),
    }
}

/// Normalizes every item of a page, preserving upstream order.
#[must_use]
pub fn normalize_page(
    page: &SearchPage,
    market: &MarketEndpoint,
    rates: &CurrencyTable,
) -> Vec<CanonicalListing> {
    page.items
        .iter()
        .map(|item| normalize_item(item, market, &page.metadata, rates))
        .collect()
}

/// Reads a money field as `(amount, currency, converted)`. Negatives clamp
/// to zero, a missing currency becomes `fallback_currency`, and an amount
/// too large to convert is treated as malformed and zeroed.
fn read_money(
    item: &RawItem,
    path: &[&str],
    fallback_currency: &str,
    rates: &CurrencyTable,
) -> (Decimal, String, Decimal) {
    let Some((amount, currency)) = item.money(path) else {
        return (Decimal::ZERO, fallback_currency.to_owned(), Decimal::ZERO);
    };
    let currency = if currency.trim().is_empty() {
        fallback_currency.to_owned()
    } else {
        currency.trim().to_ascii_uppercase()
    };
    let amount = amount.max(Decimal::ZERO);

    match rates.convert(amount, &currency) {
        Some(converted) => (amount, currency, converted),
        None => {
            tracing::debug!(field = %path.join("."), %amount, %currency, "amount out of range; zeroed");
            (Decimal::ZERO, currency, Decimal::ZERO)
        }
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
