use crate::app_config::{AppConfig, Environment};
use crate::currency::CurrencyTable;
use crate::policy::{resolve_key_policy, PolicyLayer};
use crate::ConfigError;

pub const DEFAULT_API_BASE_URL: &str =
    "https://svcs.ebay.com/services/search/FindingService/v1";

/// Upper bound the upstream accepts for a single page.
const MAX_RESULT_LIMIT: u32 = 100;

/// Longest accepted run budget (one day).
pub const MAX_RUN_DEADLINE_SECS: u64 = 86_400;

const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;

const MAX_INTER_REQUEST_DELAY_MS: u64 = 60_000;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_bounded_u64 = |var: &str, default: &str, max: u64| -> Result<u64, ConfigError> {
        let value = parse_u64(var, default)?;
        if value == 0 || value > max {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("must be between 1 and {max}, got {value}"),
            });
        }
        Ok(value)
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let database_url = optional("DATABASE_URL");
    let env = parse_environment(&or_default("XMARKET_ENV", "development"))?;
    let log_level = or_default("XMARKET_LOG_LEVEL", "info");
    let markets_path = PathBuf::from(or_default("XMARKET_MARKETS_PATH", "./config/markets.yaml"));

    let api_base_url = or_default("XMARKET_API_BASE_URL", DEFAULT_API_BASE_URL);
    let api_app_id = optional("XMARKET_API_APP_ID");
    let user_agent = or_default("XMARKET_USER_AGENT", "xmarket/0.1 (market-reconciliation)");

    let result_limit = parse_u32("XMARKET_RESULT_LIMIT", "10")?;
    if result_limit == 0 || result_limit > MAX_RESULT_LIMIT {
        return Err(ConfigError::InvalidEnvVar {
            var: "XMARKET_RESULT_LIMIT".to_string(),
            reason: format!("must be between 1 and {MAX_RESULT_LIMIT}, got {result_limit}"),
        });
    }

    let request_timeout_secs =
        parse_bounded_u64("XMARKET_REQUEST_TIMEOUT_SECS", "15", MAX_REQUEST_TIMEOUT_SECS)?;
    let inter_request_delay_ms = parse_u64("XMARKET_INTER_REQUEST_DELAY_MS", "500")?;
    if inter_request_delay_ms > MAX_INTER_REQUEST_DELAY_MS {
        return Err(ConfigError::InvalidEnvVar {
            var: "XMARKET_INTER_REQUEST_DELAY_MS".to_string(),
            reason: format!("must be at most {MAX_INTER_REQUEST_DELAY_MS}, got {inter_request_delay_ms}"),
        });
    }
    let max_concurrent_markets = parse_usize("XMARKET_MAX_CONCURRENT_MARKETS", "1")?;
    if max_concurrent_markets == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "XMARKET_MAX_CONCURRENT_MARKETS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let run_deadline_secs =
        parse_bounded_u64("XMARKET_RUN_DEADLINE_SECS", "120", MAX_RUN_DEADLINE_SECS)?;

    let currency_table = CurrencyTable::with_overrides(&or_default("XMARKET_FX_RATES", ""))
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "XMARKET_FX_RATES".to_string(),
            reason: e.to_string(),
        })?;

    let key_policy = resolve_key_policy(&[PolicyLayer::from_lookup(&lookup)?]);

    let db_max_connections = parse_u32("XMARKET_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("XMARKET_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("XMARKET_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "XMARKET_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        markets_path,
        api_base_url,
        api_app_id,
        user_agent,
        result_limit,
        request_timeout_secs,
        inter_request_delay_ms,
        max_concurrent_markets,
        run_deadline_secs,
        currency_table,
        key_policy,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "XMARKET_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
