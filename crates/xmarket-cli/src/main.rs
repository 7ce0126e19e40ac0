mod report;
mod search;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::search::SearchArgs;

#[derive(Debug, Parser)]
#[command(name = "xmarket-cli")]
#[command(about = "Cross-market product reconciliation")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search every configured market and group the results across markets
    Search(SearchArgs),
    /// List the configured markets
    Markets,
    /// Show recent search runs
    Runs {
        /// Number of runs to show
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = xmarket_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(Commands::Search(args)) => search::run_search(&config, &args).await?,
        Some(Commands::Markets) => run_markets(&config)?,
        Some(Commands::Runs { limit }) => run_list_runs(&config, limit).await?,
        Some(Commands::Db { command }) => {
            let pool = xmarket_db::connect_pool_from_config(&config).await?;
            match command {
                DbCommands::Ping => {
                    xmarket_db::ping(&pool).await?;
                    println!("database reachable");
                }
                DbCommands::Migrate => {
                    let applied = xmarket_db::run_migrations(&pool).await?;
                    println!("applied {applied} migrations");
                }
            }
        }
        None => println!("xmarket-cli: try `xmarket-cli --help`"),
    }

    Ok(())
}

fn run_markets(config: &xmarket_core::AppConfig) -> anyhow::Result<()> {
    let file = xmarket_core::load_markets(&config.markets_path)?;
    println!("{} markets in {}", file.markets.len(), config.markets_path.display());
    for market in &file.markets {
        println!(
            "  {:<4} {:<10} {:<4} {}",
            market.code, market.global_id, market.currency, market.name
        );
    }
    Ok(())
}

async fn run_list_runs(config: &xmarket_core::AppConfig, limit: i64) -> anyhow::Result<()> {
    let pool = xmarket_db::connect_pool_from_config(config).await?;
    let runs = xmarket_db::list_search_runs(&pool, limit).await?;
    if runs.is_empty() {
        println!("no search runs recorded");
        return Ok(());
    }
    for run in &runs {
        println!(
            "{:>6}  {:<9}  {}  \"{}\"  {} listings, {} groups",
            run.id,
            run.status,
            run.created_at.format("%Y-%m-%d %H:%M:%S"),
            run.search_term,
            run.listings_found,
            run.groups_found
        );
        if let Some(message) = &run.error_message {
            println!("        error: {message}");
        }
    }
    Ok(())
}

/// Marks a run failed, logging instead of propagating if that also fails.
pub(crate) async fn fail_run_best_effort(pool: &sqlx::PgPool, run_id: i64, message: String) {
    if let Err(e) = xmarket_db::fail_search_run(pool, run_id, &message).await {
        tracing::error!(run_id, error = %e, "failed to mark search run as failed");
    }
}
