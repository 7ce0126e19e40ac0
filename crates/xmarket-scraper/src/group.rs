//! Cross-market grouping of canonical listings.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use xmarket_core::{
    CanonicalListing, CrossMarketGroup, ExpansionTier, GroupedListing, MIN_GROUP_MARKETS,
};

use crate::title::TitleNormalizer;

/// Buckets `listings` by comparison key and keeps buckets seen in at least
/// two distinct markets.
///
/// Output is ordered by market count, descending. The sort is stable, so
/// groups with equal counts keep the order in which their key was first
/// seen in `listings`.
#[must_use]
pub fn group_listings(
    listings: &[CanonicalListing],
    normalizer: &TitleNormalizer,
) -> Vec<CrossMarketGroup> {
    let mut bucket_index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<(String, Vec<&CanonicalListing>)> = Vec::new();

    for listing in listings {
        let key = normalizer.comparison_key(&listing.title);
        if key.is_empty() {
            continue;
        }
        match bucket_index.get(&key) {
            Some(&idx) => buckets[idx].1.push(listing),
            None => {
                bucket_index.insert(key.clone(), buckets.len());
                buckets.push((key, vec![listing]));
            }
        }
    }

    let mut groups: Vec<CrossMarketGroup> = buckets
        .into_iter()
        .filter_map(|(key, members)| build_group(key, &members))
        .collect();

    groups.sort_by(|a, b| b.market_count.cmp(&a.market_count));
    groups
}

fn build_group(key: String, members: &[&CanonicalListing]) -> Option<CrossMarketGroup> {
    let mut markets: Vec<String> = Vec::new();
    for listing in members {
        if !markets.contains(&listing.market_code) {
            markets.push(listing.market_code.clone());
        }
    }
    if markets.len() < MIN_GROUP_MARKETS {
        return None;
    }

    let min_price_usd = members.iter().map(|l| l.price_usd).min()?;
    let max_price_usd = members.iter().map(|l| l.price_usd).max()?;

    let listings = members
        .iter()
        .map(|&listing| GroupedListing {
            market_code: listing.market_code.clone(),
            market_name: listing.market_name.clone(),
            listing: listing.clone(),
        })
        .collect();

    Some(CrossMarketGroup {
        representative_title: members[0].title.clone(),
        market_count: markets.len(),
        tier: ExpansionTier::for_market_count(markets.len()),
        markets,
        listing_count: members.len(),
        min_price_usd,
        max_price_usd,
        listings,
        key,
    })
}

/// Headline numbers for a set of groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub group_count: usize,
    pub global_count: usize,
    pub multi_count: usize,
    pub grouped_listings: usize,
    /// Largest max-minus-min price spread of any group.
    pub widest_spread_usd: Decimal,
}

#[must_use]
pub fn summarize(groups: &[CrossMarketGroup]) -> GroupSummary {
    groups.iter().fold(GroupSummary::default(), |mut acc, g| {
        acc.group_count += 1;
        match g.tier {
            ExpansionTier::Global => acc.global_count += 1,
            ExpansionTier::Multi => acc.multi_count += 1,
        }
        acc.grouped_listings += g.listing_count;
        acc.widest_spread_usd = acc.widest_spread_usd.max(g.price_spread());
        acc
    })
}
