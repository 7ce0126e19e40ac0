pub mod app_config;
pub mod config;
pub mod currency;
pub mod listing;
pub mod markets;
pub mod policy;
pub mod report;
pub mod sink;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, MAX_RUN_DEADLINE_SECS};
pub use currency::CurrencyTable;
pub use listing::{CanonicalListing, EndpointOutcome, ResponseMetadata};
pub use markets::{load_markets, parse_markets, MarketEndpoint, MarketsFile};
pub use policy::{resolve_key_policy, KeyPolicy, PolicyLayer};
pub use report::{
    CrossMarketGroup, EndpointFailure, ExpansionTier, GroupedListing, MarketTally, RunResult,
    GLOBAL_TIER_MARKETS, MIN_GROUP_MARKETS,
};
pub use sink::{
    build_records, product_group_id, validate_groups, CatalogSink, MarketListingRecord,
    MemorySink, ProductGroupRecord, SinkError, SinkReport, ENGINE_SOURCE,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read markets file {path}: {source}")]
    MarketsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse markets file: {0}")]
    MarketsFileParse(#[source] serde_yaml::Error),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}
