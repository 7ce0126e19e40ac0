//! Database operations for `search_runs` and `search_run_markets`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{to_i32, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `search_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub search_term: String,
    pub trigger_source: String,
    pub status: String,
    pub markets_attempted: i32,
    pub listings_found: i32,
    pub groups_found: i32,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `search_run_markets` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchRunMarketRow {
    pub id: i64,
    pub search_run_id: i64,
    pub market_code: String,
    pub status: String,
    pub listings_found: i32,
    pub total_results: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What one market contributed to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketOutcome<'a> {
    Succeeded {
        listings_found: usize,
        total_results: u64,
    },
    Failed {
        error_message: &'a str,
    },
}

const RUN_COLUMNS: &str = "id, public_id, search_term, trigger_source, status, \
     markets_attempted, listings_found, groups_found, error_message, \
     started_at, completed_at, created_at";

// ---------------------------------------------------------------------------
// search_runs operations
// ---------------------------------------------------------------------------

/// Creates a new search run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_search_run(
    pool: &PgPool,
    search_term: &str,
    trigger_source: &str,
) -> Result<SearchRunRow, DbError> {
    let row = sqlx::query_as::<_, SearchRunRow>(&format!(
        "INSERT INTO search_runs (public_id, search_term, trigger_source, status) \
         VALUES ($1, $2, $3, 'queued') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(search_term)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a queued run as `running` and records how many markets it targets.
///
/// # Errors
///
/// Returns [`DbError::InvalidSearchRunTransition`] if the run is not
/// `queued`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_search_run(
    pool: &PgPool,
    id: i64,
    markets_attempted: usize,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_runs \
         SET status = 'running', started_at = NOW(), markets_attempted = $1 \
         WHERE id = $2 AND status = 'queued'",
    )
    .bind(to_i32("markets_attempted", markets_attempted)?)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSearchRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a running run as `succeeded` with its listing and group counts.
///
/// # Errors
///
/// Returns [`DbError::InvalidSearchRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_search_run(
    pool: &PgPool,
    id: i64,
    listings_found: usize,
    groups_found: usize,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_runs \
         SET status = 'succeeded', completed_at = NOW(), \
             listings_found = $1, groups_found = $2 \
         WHERE id = $3 AND status = 'running'",
    )
    .bind(to_i32("listings_found", listings_found)?)
    .bind(to_i32("groups_found", groups_found)?)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSearchRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a running run as `failed` with `error_message`.
///
/// # Errors
///
/// Returns [`DbError::InvalidSearchRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_search_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSearchRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_search_run(pool: &PgPool, id: i64) -> Result<SearchRunRow, DbError> {
    sqlx::query_as::<_, SearchRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM search_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_search_runs(pool: &PgPool, limit: i64) -> Result<Vec<SearchRunRow>, DbError> {
    let rows = sqlx::query_as::<_, SearchRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM search_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// search_run_markets operations
// ---------------------------------------------------------------------------

/// Inserts or updates the per-market result row for a run.
///
/// Conflicts on `(search_run_id, market_code)` overwrite the row in place.
///
/// # Errors
///
/// Returns [`DbError::OutOfRange`] if a count does not fit its column, or
/// [`DbError::Sqlx`] if the upsert fails.
pub async fn record_market_outcome(
    pool: &PgPool,
    run_id: i64,
    market_code: &str,
    outcome: MarketOutcome<'_>,
) -> Result<(), DbError> {
    let (status, listings_found, total_results, error_message) = match outcome {
        MarketOutcome::Succeeded {
            listings_found,
            total_results,
        } => (
            "succeeded",
            to_i32("listings_found", listings_found)?,
            i64::try_from(total_results).unwrap_or(i64::MAX),
            None,
        ),
        MarketOutcome::Failed { error_message } => ("failed", 0, 0, Some(error_message)),
    };

    sqlx::query(
        "INSERT INTO search_run_markets \
             (search_run_id, market_code, status, listings_found, total_results, error_message) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (search_run_id, market_code) DO UPDATE SET \
             status         = EXCLUDED.status, \
             listings_found = EXCLUDED.listings_found, \
             total_results  = EXCLUDED.total_results, \
             error_message  = EXCLUDED.error_message",
    )
    .bind(run_id)
    .bind(market_code)
    .bind(status)
    .bind(listings_found)
    .bind(total_results)
    .bind(error_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns all market-level rows for a run, in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_search_run_markets(
    pool: &PgPool,
    run_id: i64,
) -> Result<Vec<SearchRunMarketRow>, DbError> {
    let rows = sqlx::query_as::<_, SearchRunMarketRow>(
        "SELECT id, search_run_id, market_code, status, listings_found, \
                total_results, error_message, created_at \
         FROM search_run_markets \
         WHERE search_run_id = $1 \
         ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
