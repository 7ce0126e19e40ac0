use std::path::PathBuf;

use crate::currency::CurrencyTable;
use crate::policy::KeyPolicy;
use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Only needed when results are persisted; dry runs work without it.
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub markets_path: PathBuf,
    pub api_base_url: String,
    pub api_app_id: Option<String>,
    pub user_agent: String,
    /// Page size requested from every market.
    pub result_limit: u32,
    pub request_timeout_secs: u64,
    pub inter_request_delay_ms: u64,
    pub max_concurrent_markets: usize,
    pub run_deadline_secs: u64,
    pub currency_table: CurrencyTable,
    pub key_policy: KeyPolicy,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl AppConfig {
    /// The upstream application id, required for any search.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when `XMARKET_API_APP_ID` is unset.
    pub fn require_api_app_id(&self) -> Result<&str, ConfigError> {
        self.api_app_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("XMARKET_API_APP_ID".to_string()))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("markets_path", &self.markets_path)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("api_base_url", &self.api_base_url)
            .field("api_app_id", &self.api_app_id.as_ref().map(|_| "[redacted]"))
            .field("user_agent", &self.user_agent)
            .field("result_limit", &self.result_limit)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("inter_request_delay_ms", &self.inter_request_delay_ms)
            .field("max_concurrent_markets", &self.max_concurrent_markets)
            .field("run_deadline_secs", &self.run_deadline_secs)
            .field("currency_table", &self.currency_table)
            .field("key_policy", &self.key_policy)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
