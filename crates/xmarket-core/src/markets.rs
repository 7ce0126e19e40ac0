use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::currency::is_currency_code;
use crate::ConfigError;

/// One regional storefront the search is issued against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEndpoint {
    /// Short unique market code, e.g. `"GB"`.
    pub code: String,
    /// Human-readable name, e.g. `"United Kingdom"`.
    pub name: String,
    /// Upstream routing parameter selecting the regional catalog, e.g. `"EBAY-GB"`.
    pub global_id: String,
    /// ISO 4217 currency listings in this market are priced in.
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct MarketsFile {
    pub markets: Vec<MarketEndpoint>,
}

/// Load and validate the market endpoint configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_markets(path: &Path) -> Result<MarketsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::MarketsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_markets(&content)
}

/// Parse and validate market endpoints from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_markets(content: &str) -> Result<MarketsFile, ConfigError> {
    let markets_file: MarketsFile =
        serde_yaml::from_str(content).map_err(ConfigError::MarketsFileParse)?;

    validate_markets(&markets_file)?;

    Ok(markets_file)
}

fn validate_markets(markets_file: &MarketsFile) -> Result<(), ConfigError> {
    if markets_file.markets.is_empty() {
        return Err(ConfigError::Validation(
            "at least one market must be configured".to_string(),
        ));
    }

    let mut seen_codes = HashSet::new();

    for market in &markets_file.markets {
        if market.code.trim().is_empty() {
            return Err(ConfigError::Validation(
                "market code must be non-empty".to_string(),
            ));
        }

        if market.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "market '{}' must have a non-empty name",
                market.code
            )));
        }

        if market.global_id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "market '{}' must have a non-empty global_id",
                market.code
            )));
        }

        if !is_currency_code(&market.currency) {
            return Err(ConfigError::Validation(format!(
                "market '{}' has invalid currency '{}'; expected a 3-letter upper-case ISO code",
                market.code, market.currency
            )));
        }

        if !seen_codes.insert(market.code.to_uppercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate market code: '{}'",
                market.code
            )));
        }
    }

    Ok(())
}
