//! Comparison keys for spotting the same product across markets.
//!
//! The key is a deterministic reduction of the listing title. It is only
//! ever used to bucket listings within one run and is never treated as a
//! product identity.

use std::sync::LazyLock;

use regex::Regex;
use xmarket_core::KeyPolicy;

/// Placeholder replacing a storage capacity such as `128gb`.
pub const CAPACITY_TOKEN: &str = "<cap>";

/// Placeholder replacing a screen size such as `55"`.
pub const SCREEN_SIZE_TOKEN: &str = "<size>";

static CONDITION_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:new|used|refurbished|open\s+box)\b").expect("valid condition regex")
});

static CAPACITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+gb").expect("valid capacity regex"));

static SCREEN_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\d+""#).expect("valid screen size regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TitleNormalizer {
    policy: KeyPolicy,
}

impl TitleNormalizer {
    #[must_use]
    pub fn new(policy: KeyPolicy) -> Self {
        Self { policy }
    }

    /// Reduces `title` to its comparison key.
    ///
    /// Lower-cases, drops condition words, folds capacity and screen size
    /// into placeholders (per policy), strips punctuation and collapses
    /// whitespace.
    #[must_use]
    pub fn comparison_key(&self, title: &str) -> String {
        let mut text = title.to_lowercase();

        // Sizes go first: the inch mark is punctuation and would be lost.
        if self.policy.collapse_screen_size {
            text = SCREEN_SIZE
                .replace_all(&text, format!(" {SCREEN_SIZE_TOKEN} ").as_str())
                .into_owned();
        }
        if self.policy.collapse_capacity {
            text = CAPACITY
                .replace_all(&text, format!(" {CAPACITY_TOKEN} ").as_str())
                .into_owned();
        }
        text = CONDITION_WORDS.replace_all(&text, " ").into_owned();

        text.split_whitespace()
            .filter_map(|token| {
                if token == CAPACITY_TOKEN || token == SCREEN_SIZE_TOKEN {
                    return Some(token.to_owned());
                }
                let stripped: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
                (!stripped.is_empty()).then_some(stripped)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
