//! Multi-market search runs.
//!
//! A run validates its inputs, queries every configured market with bounded
//! concurrency under a run-level deadline, pools the listings of the markets
//! that answered, and groups them across markets. One market failing never
//! affects the others.

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::time::Instant;
use xmarket_core::{
    AppConfig, EndpointFailure, EndpointOutcome, MarketEndpoint, MarketTally, RunResult,
    MAX_RUN_DEADLINE_SECS,
};

use crate::client::MarketClient;
use crate::error::RunError;
use crate::group::group_listings;
use crate::title::TitleNormalizer;

/// Failure text for markets the deadline cut off.
pub const DEADLINE_SKIPPED: &str = "skipped: deadline exceeded";

/// Anything that can answer a search for one market.
///
/// Implementations must fold every failure into
/// [`EndpointOutcome::Failure`]; the orchestrator additionally guards
/// against panics.
pub trait SearchEndpoint: Sync {
    fn query(
        &self,
        search_term: &str,
        market: &MarketEndpoint,
    ) -> impl Future<Output = EndpointOutcome> + Send;
}

impl SearchEndpoint for MarketClient {
    fn query(
        &self,
        search_term: &str,
        market: &MarketEndpoint,
    ) -> impl Future<Output = EndpointOutcome> + Send {
        MarketClient::query(self, search_term, market)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Markets queried at once. `1` means strictly sequential.
    pub max_concurrent_markets: usize,
    /// Budget for the whole run, measured from the start of fan-out.
    pub run_deadline: Duration,
    pub normalizer: TitleNormalizer,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_markets: 1,
            run_deadline: Duration::from_secs(120),
            normalizer: TitleNormalizer::default(),
        }
    }
}

impl OrchestratorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent_markets: config.max_concurrent_markets,
            run_deadline: Duration::from_secs(config.run_deadline_secs),
            normalizer: TitleNormalizer::new(config.key_policy),
        }
    }
}

pub struct Orchestrator<E> {
    endpoint: E,
    config: OrchestratorConfig,
}

impl<E: SearchEndpoint> Orchestrator<E> {
    pub fn new(endpoint: E, config: OrchestratorConfig) -> Self {
        Self { endpoint, config }
    }

    /// Searches `markets` for `search_term` and groups the results.
    ///
    /// Per-market failures, panics, and deadline cut-offs are recorded in
    /// [`RunResult::failures`]; they never fail the run.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] for structural problems, before any market is
    /// queried.
    pub async fn run(
        &self,
        search_term: &str,
        markets: &[MarketEndpoint],
    ) -> Result<RunResult, RunError> {
        let search_term = search_term.trim();
        validate_run(search_term, markets)?;

        let ran_at = Utc::now();
        let deadline = Instant::now() + clamp_deadline(self.config.run_deadline);
        let max_concurrent = self.config.max_concurrent_markets.max(1);

        tracing::info!(
            search_term,
            markets = markets.len(),
            max_concurrent,
            "starting multi-market search"
        );

        let mut outcomes: Vec<(usize, EndpointOutcome)> = stream::iter(markets.iter().enumerate())
            .map(|(idx, market)| async move {
                (idx, self.query_guarded(search_term, market, deadline).await)
            })
            .buffer_unordered(max_concurrent)
            .collect()
            .await;

        // Completion order is not configuration order.
        outcomes.sort_by_key(|(idx, _)| *idx);

        let mut succeeded = Vec::new();
        let mut tallies = Vec::new();
        let mut failures = Vec::new();
        let mut pooled = Vec::new();

        for (_, outcome) in outcomes {
            match outcome {
                EndpointOutcome::Success {
                    code,
                    total_results,
                    listings,
                    ..
                } => {
                    tallies.push(MarketTally {
                        code: code.clone(),
                        returned: listings.len(),
                        total_results,
                    });
                    succeeded.push(code);
                    pooled.extend(listings);
                }
                EndpointOutcome::Failure { code, error } => {
                    failures.push(EndpointFailure { code, error });
                }
            }
        }

        let groups = group_listings(&pooled, &self.config.normalizer);

        if !failures.is_empty() {
            tracing::warn!(
                failed_markets = failures.len(),
                total_markets = markets.len(),
                "some markets failed during search"
            );
        }
        tracing::info!(
            search_term,
            succeeded = succeeded.len(),
            failed = failures.len(),
            listings = pooled.len(),
            groups = groups.len(),
            "multi-market search finished"
        );

        Ok(RunResult {
            search_term: search_term.to_owned(),
            endpoints_attempted: markets.len(),
            succeeded,
            tallies,
            failures,
            total_listings: pooled.len(),
            groups,
            ran_at,
        })
    }

    async fn query_guarded(
        &self,
        search_term: &str,
        market: &MarketEndpoint,
        deadline: Instant,
    ) -> EndpointOutcome {
        if Instant::now() >= deadline {
            tracing::warn!(market = %market.code, "run deadline reached before query");
            return EndpointOutcome::failure(&market.code, DEADLINE_SKIPPED);
        }

        let query = AssertUnwindSafe(self.endpoint.query(search_term, market)).catch_unwind();
        match tokio::time::timeout_at(deadline, query).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(payload)) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(market = %market.code, panic = %message, "market query panicked");
                EndpointOutcome::failure(&market.code, format!("query panicked: {message}"))
            }
            Err(_) => {
                tracing::warn!(market = %market.code, "run deadline cut off in-flight query");
                EndpointOutcome::failure(&market.code, DEADLINE_SKIPPED)
            }
        }
    }
}

fn validate_run(search_term: &str, markets: &[MarketEndpoint]) -> Result<(), RunError> {
    if search_term.is_empty() {
        return Err(RunError::EmptySearchTerm);
    }
    if markets.is_empty() {
        return Err(RunError::NoEndpoints);
    }
    let mut seen = HashSet::new();
    for market in markets {
        if !seen.insert(market.code.as_str()) {
            return Err(RunError::DuplicateEndpoint(market.code.clone()));
        }
    }
    Ok(())
}

/// Caps the run budget so the deadline instant is always representable.
fn clamp_deadline(budget: Duration) -> Duration {
    budget.min(Duration::from_secs(MAX_RUN_DEADLINE_SECS))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
