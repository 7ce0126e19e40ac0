//! `search` command: one multi-market run, optionally persisted.
//!
//! Per-market failures are reported, not propagated. The command only fails
//! for configuration problems, structural run errors, sink errors, or when
//! every market failed.

use clap::Args;
use xmarket_core::{
    load_markets, resolve_key_policy, AppConfig, CatalogSink, MarketEndpoint, MemorySink,
    PolicyLayer, RunResult, SinkReport,
};
use xmarket_db::MarketOutcome;
use xmarket_scraper::{
    summarize, MarketClient, MarketClientConfig, Orchestrator, OrchestratorConfig,
    TitleNormalizer,
};

use crate::fail_run_best_effort;
use crate::report::{render_json, render_text};

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search term sent to every market
    pub term: String,

    /// Restrict the run to these market codes (repeatable)
    #[arg(long = "market", value_name = "CODE")]
    pub markets: Vec<String>,

    /// Replace the engine's catalog rows with this run's groups
    #[arg(long)]
    pub persist: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Fold storage capacities (128GB, 256GB) into one key
    #[arg(long, overrides_with = "no_collapse_capacity")]
    pub collapse_capacity: bool,

    /// Keep storage capacities distinct
    #[arg(long, overrides_with = "collapse_capacity")]
    pub no_collapse_capacity: bool,

    /// Fold screen sizes (55", 65") into one key
    #[arg(long, overrides_with = "no_collapse_screen_size")]
    pub collapse_screen_size: bool,

    /// Keep screen sizes distinct
    #[arg(long, overrides_with = "collapse_screen_size")]
    pub no_collapse_screen_size: bool,
}

impl SearchArgs {
    /// The command-line layer of the key-policy chain.
    pub(crate) fn policy_layer(&self) -> PolicyLayer {
        let flag = |on: bool, off: bool| match (on, off) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        PolicyLayer {
            collapse_capacity: flag(self.collapse_capacity, self.no_collapse_capacity),
            collapse_screen_size: flag(self.collapse_screen_size, self.no_collapse_screen_size),
        }
    }
}

/// Keeps the markets named in `codes` (case-insensitive), in configuration
/// order. An empty filter keeps every market.
pub(crate) fn select_markets(
    markets: Vec<MarketEndpoint>,
    codes: &[String],
) -> anyhow::Result<Vec<MarketEndpoint>> {
    if codes.is_empty() {
        return Ok(markets);
    }
    for code in codes {
        if !markets.iter().any(|m| m.code.eq_ignore_ascii_case(code)) {
            anyhow::bail!("market '{code}' is not configured; see `xmarket-cli markets`");
        }
    }
    Ok(markets
        .into_iter()
        .filter(|m| codes.iter().any(|c| m.code.eq_ignore_ascii_case(c)))
        .collect())
}

/// Runs a search across the configured markets and prints the report.
///
/// # Errors
///
/// Returns an error if the markets file or app id is missing, the run is
/// structurally invalid, persistence fails, or every market failed.
pub(crate) async fn run_search(config: &AppConfig, args: &SearchArgs) -> anyhow::Result<()> {
    let markets = select_markets(load_markets(&config.markets_path)?.markets, &args.markets)?;
    let app_id = config.require_api_app_id()?;

    let key_policy =
        resolve_key_policy(&[args.policy_layer(), PolicyLayer::from(config.key_policy)]);
    tracing::debug!(?key_policy, "resolved comparison-key policy");

    let client = MarketClient::new(MarketClientConfig::from_app_config(config, app_id))?;
    let orchestrator = Orchestrator::new(
        client,
        OrchestratorConfig {
            normalizer: TitleNormalizer::new(key_policy),
            ..OrchestratorConfig::from_app_config(config)
        },
    );

    let (result, sink_report) = if args.persist {
        run_persisted(config, &orchestrator, &args.term, &markets).await?
    } else {
        let result = orchestrator.run(&args.term, &markets).await?;
        let sink_report = MemorySink::new().write_run(&result.search_term, &result.groups).await?;
        (result, sink_report)
    };

    let summary = summarize(&result.groups);
    if args.json {
        println!("{}", render_json(&result, &summary, args.persist.then_some(sink_report))?);
    } else {
        print!("{}", render_text(&result, &summary));
        if args.persist {
            println!(
                "persisted {} product groups and {} market listings",
                sink_report.products_written, sink_report.listings_written
            );
        }
    }

    if result.succeeded.is_empty() {
        anyhow::bail!("all {} markets failed", result.endpoints_attempted);
    }
    Ok(())
}

/// Runs the search inside a `search_runs` record and writes the groups to
/// the Postgres catalog.
async fn run_persisted(
    config: &AppConfig,
    orchestrator: &Orchestrator<MarketClient>,
    term: &str,
    markets: &[MarketEndpoint],
) -> anyhow::Result<(RunResult, SinkReport)> {
    let pool = xmarket_db::connect_pool_from_config(config).await?;
    let sink = xmarket_db::PgCatalogSink::new(pool.clone());

    let run = xmarket_db::create_search_run(&pool, term.trim(), "cli").await?;
    if let Err(e) = xmarket_db::start_search_run(&pool, run.id, markets.len()).await {
        fail_run_best_effort(&pool, run.id, format!("{e:#}")).await;
        return Err(e.into());
    }

    let result = match orchestrator.run(term, markets).await {
        Ok(result) => result,
        Err(e) => {
            fail_run_best_effort(&pool, run.id, e.to_string()).await;
            return Err(e.into());
        }
    };

    record_outcomes(&pool, run.id, &result).await;

    if result.succeeded.is_empty() {
        let message = format!("all {} markets failed", result.endpoints_attempted);
        fail_run_best_effort(&pool, run.id, message).await;
        return Ok((result, SinkReport::default()));
    }

    let sink_report = match sink.write_run(&result.search_term, &result.groups).await {
        Ok(report) => report,
        Err(e) => {
            fail_run_best_effort(&pool, run.id, format!("{e:#}")).await;
            return Err(e.into());
        }
    };

    if let Err(e) = xmarket_db::complete_search_run(
        &pool,
        run.id,
        result.total_listings,
        result.group_count(),
    )
    .await
    {
        fail_run_best_effort(&pool, run.id, format!("{e:#}")).await;
        return Err(e.into());
    }

    tracing::info!(run_id = run.id, public_id = %run.public_id, "search run recorded");
    Ok((result, sink_report))
}

/// Records each market's outcome. Bookkeeping failures are logged only.
async fn record_outcomes(pool: &sqlx::PgPool, run_id: i64, result: &RunResult) {
    let succeeded = result.tallies.iter().map(|t| {
        (
            t.code.as_str(),
            MarketOutcome::Succeeded {
                listings_found: t.returned,
                total_results: t.total_results,
            },
        )
    });
    let failed = result.failures.iter().map(|f| {
        (
            f.code.as_str(),
            MarketOutcome::Failed {
                error_message: &f.error,
            },
        )
    });

    for (code, outcome) in succeeded.chain(failed) {
        if let Err(e) = xmarket_db::record_market_outcome(pool, run_id, code, outcome).await {
            tracing::warn!(market = %code, error = %e, "failed to record market outcome");
        }
    }
}

#[cfg(test)]
#[path = "search_test.rs"]
mod tests;
