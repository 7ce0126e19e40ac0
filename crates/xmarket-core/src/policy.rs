//! Comparison-key policy and its layered resolution.
//!
//! The policy is resolved exactly once at startup from an ordered list of
//! layers (explicit override first, then environment, then defaults) and
//! handed to the title normalizer by value.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

pub const COLLAPSE_CAPACITY_VAR: &str = "XMARKET_COLLAPSE_CAPACITY";
pub const COLLAPSE_SCREEN_SIZE_VAR: &str = "XMARKET_COLLAPSE_SCREEN_SIZE";

/// Controls which title variations are folded into the same comparison key.
///
/// Collapsing capacity (`128gb` vs `256gb`) and screen size (`55"` vs `65"`)
/// reports distinct SKUs as one multi-market product. Both are on by default
/// to match the historical reports; turn them off for SKU-level grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPolicy {
    pub collapse_capacity: bool,
    pub collapse_screen_size: bool,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            collapse_capacity: true,
            collapse_screen_size: true,
        }
    }
}

/// A single layer of the resolution chain. `None` defers to the next layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyLayer {
    pub collapse_capacity: Option<bool>,
    pub collapse_screen_size: Option<bool>,
}

impl PolicyLayer {
    /// Builds the environment layer from an env-var lookup function.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvVar`] when a variable is set but is
    /// not a recognizable boolean.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let read = |var: &str| -> Result<Option<bool>, ConfigError> {
            match lookup(var) {
                Ok(raw) => parse_bool(&raw)
                    .map(Some)
                    .ok_or_else(|| ConfigError::InvalidEnvVar {
                        var: var.to_string(),
                        reason: format!("expected a boolean, got \"{raw}\""),
                    }),
                Err(_) => Ok(None),
            }
        };

        Ok(Self {
            collapse_capacity: read(COLLAPSE_CAPACITY_VAR)?,
            collapse_screen_size: read(COLLAPSE_SCREEN_SIZE_VAR)?,
        })
    }
}

impl From<KeyPolicy> for PolicyLayer {
    /// A fully-resolved policy as a layer that sets every field.
    fn from(policy: KeyPolicy) -> Self {
        Self {
            collapse_capacity: Some(policy.collapse_capacity),
            collapse_screen_size: Some(policy.collapse_screen_size),
        }
    }
}

/// Resolves the key policy from layers ordered highest precedence first.
/// Each field takes the first layer that sets it, else the default.
#[must_use]
pub fn resolve_key_policy(layers: &[PolicyLayer]) -> KeyPolicy {
    let default = KeyPolicy::default();
    KeyPolicy {
        collapse_capacity: layers
            .iter()
            .find_map(|l| l.collapse_capacity)
            .unwrap_or(default.collapse_capacity),
        collapse_screen_size: layers
            .iter()
            .find_map(|l| l.collapse_screen_size)
            .unwrap_or(default.collapse_screen_size),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
