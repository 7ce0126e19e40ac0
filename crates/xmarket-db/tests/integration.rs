//! Offline unit tests for xmarket-db pool configuration and row types.
//! These tests do not require a live database connection.

use std::path::PathBuf;

use xmarket_core::{AppConfig, CurrencyTable, Environment, KeyPolicy};
use xmarket_db::{DbError, MarketOutcome, PoolConfig, SearchRunRow};

fn app_config() -> AppConfig {
    AppConfig {
        database_url: None,
        env: Environment::Test,
        log_level: "info".to_string(),
        markets_path: PathBuf::from("./config/markets.yaml"),
        api_base_url: "https://svcs.example.com/v1".to_string(),
        api_app_id: None,
        user_agent: "ua".to_string(),
        result_limit: 10,
        request_timeout_secs: 15,
        inter_request_delay_ms: 500,
        max_concurrent_markets: 1,
        run_deadline_secs: 120,
        currency_table: CurrencyTable::default(),
        key_policy: KeyPolicy::default(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[tokio::test]
async fn connect_without_database_url_is_a_typed_error() {
    let err = xmarket_db::connect_pool_from_config(&app_config())
        .await
        .expect_err("missing DATABASE_URL must fail");
    assert!(matches!(err, DbError::MissingDatabaseUrl), "got: {err:?}");
}

/// Compile-time smoke test: confirm that [`SearchRunRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn search_run_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = SearchRunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        search_term: "iphone 13".to_string(),
        trigger_source: "cli".to_string(),
        status: "queued".to_string(),
        markets_attempted: 0_i32,
        listings_found: 0_i32,
        groups_found: 0_i32,
        error_message: None,
        started_at: None,
        completed_at: None,
        created_at: Utc::now(),
    };

    assert_eq!(row.id, 1);
    assert_eq!(row.search_term, "iphone 13");
    assert_eq!(row.status, "queued");
    assert!(row.started_at.is_none());
    assert!(row.error_message.is_none());
}

#[test]
fn transition_error_names_expected_status() {
    let err = DbError::InvalidSearchRunTransition {
        id: 9,
        expected_status: "running",
    };
    assert_eq!(
        err.to_string(),
        "search run 9 is not in the expected 'running' status"
    );
    let outcome = MarketOutcome::Failed {
        error_message: "timeout",
    };
    assert_ne!(
        outcome,
        MarketOutcome::Succeeded {
            listings_found: 0,
            total_results: 0
        }
    );
}
