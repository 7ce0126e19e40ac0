use thiserror::Error;

/// Failure of a single market query. Never escapes the orchestrator; it is
/// recorded as that market's failure entry instead.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by market {market} (retry after {retry_after_secs}s)")]
    RateLimited {
        market: String,
        retry_after_secs: u64,
    },

    #[error("unexpected HTTP status {status} from market {market}")]
    UnexpectedStatus { status: u16, market: String },

    /// The upstream answered 2xx but rejected the request. `message` is the
    /// upstream's own text, unmodified.
    #[error("market {market} rejected the request (ack={ack}): {message}")]
    Api {
        market: String,
        ack: String,
        message: String,
    },

    #[error("response from market {market} is missing the \"{envelope}\" envelope")]
    MissingEnvelope { market: String, envelope: String },

    #[error("invalid API base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}

/// Structural problems that stop a run before any market is queried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("search term must not be empty")]
    EmptySearchTerm,

    #[error("no market endpoints configured")]
    NoEndpoints,

    #[error("market code '{0}' is configured more than once")]
    DuplicateEndpoint(String),
}
