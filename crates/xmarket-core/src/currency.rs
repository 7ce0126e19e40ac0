//! Static currency conversion into the reference currency (USD).
//!
//! The rates are a fixed approximation, not live FX quotes. No network call
//! is ever made for conversion. Unknown currencies pass through at 1.0.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::ConfigError;

/// Built-in currency → USD rates, expressed as (mantissa, scale).
const DEFAULT_RATES: &[(&str, i64, u32)] = &[
    ("USD", 1, 0),
    ("GBP", 127, 2),
    ("EUR", 108, 2),
    ("CAD", 74, 2),
    ("AUD", 66, 2),
    ("CHF", 112, 2),
    ("JPY", 67, 4),
];

/// Lookup table of currency code → reference-currency rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyTable {
    rates: BTreeMap<String, Decimal>,
}

impl Default for CurrencyTable {
    fn default() -> Self {
        let rates = DEFAULT_RATES
            .iter()
            .map(|&(code, mantissa, scale)| (code.to_string(), Decimal::new(mantissa, scale)))
            .collect();
        Self { rates }
    }
}

impl CurrencyTable {
    /// Returns the default table with `overrides` applied on top.
    ///
    /// `overrides` is a comma-separated `CODE=RATE` list, e.g.
    /// `"GBP=1.25,EUR=1.10"`. Empty input yields the default table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a malformed entry, a currency
    /// code that is not three ASCII letters, or a non-positive rate.
    pub fn with_overrides(overrides: &str) -> Result<Self, ConfigError> {
        let mut table = Self::default();
        for entry in overrides.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (code, rate) = entry.split_once('=').ok_or_else(|| {
                ConfigError::Validation(format!("FX override \"{entry}\" is not CODE=RATE"))
            })?;
            let code = code.trim().to_ascii_uppercase();
            if !is_currency_code(&code) {
                return Err(ConfigError::Validation(format!(
                    "FX override \"{entry}\" has an invalid currency code"
                )));
            }
            let rate = Decimal::from_str(rate.trim()).map_err(|e| {
                ConfigError::Validation(format!("FX override \"{entry}\": {e}"))
            })?;
            if rate <= Decimal::ZERO {
                return Err(ConfigError::Validation(format!(
                    "FX override \"{entry}\" must be positive"
                )));
            }
            table.rates.insert(code, rate);
        }
        Ok(table)
    }

    /// Rate for `currency`, or 1.0 when the currency is unknown.
    #[must_use]
    pub fn rate(&self, currency: &str) -> Decimal {
        self.rates
            .get(&currency.trim().to_ascii_uppercase())
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    #[must_use]
    pub fn is_known(&self, currency: &str) -> bool {
        self.rates
            .contains_key(&currency.trim().to_ascii_uppercase())
    }

    /// Converts `amount` into the reference currency, rounded to 2 decimal
    /// places (midpoint away from zero). Returns `None` when the product
    /// does not fit in a [`Decimal`].
    #[must_use]
    pub fn convert(&self, amount: Decimal, currency: &str) -> Option<Decimal> {
        amount.checked_mul(self.rate(currency)).map(round_money)
    }
}

/// Rounds a monetary amount to cents.
fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub(crate) fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}
