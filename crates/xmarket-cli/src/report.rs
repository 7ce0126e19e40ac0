//! Terminal and JSON rendering of a finished run.

use std::fmt::Write as _;

use serde::Serialize;
use xmarket_core::{RunResult, SinkReport};
use xmarket_scraper::GroupSummary;

#[derive(Serialize)]
struct JsonReport<'a> {
    result: &'a RunResult,
    summary: &'a GroupSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    persisted: Option<SinkReport>,
}

pub(crate) fn render_json(
    result: &RunResult,
    summary: &GroupSummary,
    persisted: Option<SinkReport>,
) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&JsonReport {
        result,
        summary,
        persisted,
    })?)
}

/// Human-readable report: run header, failures, then one line per group
/// in ranked order.
pub(crate) fn render_text(result: &RunResult, summary: &GroupSummary) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        "search \"{}\": {} markets queried, {} succeeded, {} failed",
        result.search_term,
        result.endpoints_attempted,
        result.succeeded.len(),
        result.failures.len()
    );
    for failure in &result.failures {
        let _ = writeln!(out, "  failed {}: {}", failure.code, failure.error);
    }
    let _ = writeln!(
        out,
        "{} listings, {} cross-market groups ({} global, {} multi), widest spread ${}",
        result.total_listings,
        summary.group_count,
        summary.global_count,
        summary.multi_count,
        summary.widest_spread_usd
    );

    for group in &result.groups {
        let _ = writeln!(
            out,
            "[{}] {} | {} markets ({}) | {} listings | ${} to ${}",
            group.tier,
            group.representative_title,
            group.market_count,
            group.markets.join(", "),
            group.listing_count,
            group.min_price_usd,
            group.max_price_usd
        );
    }

    out
}
