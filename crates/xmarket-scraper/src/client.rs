//! HTTP client for the upstream regional search API.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Url};
use xmarket_core::{AppConfig, CurrencyTable, EndpointOutcome, MarketEndpoint};

use crate::error::ScraperError;
use crate::normalize::normalize_page;
use crate::throttle::RequestThrottle;
use crate::types::{SearchPage, OPERATION};

const SERVICE_VERSION: &str = "1.13.0";

/// Settings for [`MarketClient`], usually derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct MarketClientConfig {
    pub base_url: String,
    pub app_id: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Page size requested from each market.
    pub result_limit: u32,
    /// Minimum gap between requests on one request stream.
    pub inter_request_delay_ms: u64,
    /// Number of independent request streams.
    pub request_streams: usize,
    pub currency_table: CurrencyTable,
}

impl MarketClientConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig, app_id: &str) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            app_id: app_id.to_owned(),
            user_agent: config.user_agent.clone(),
            timeout_secs: config.request_timeout_secs,
            result_limit: config.result_limit,
            inter_request_delay_ms: config.inter_request_delay_ms,
            request_streams: config.max_concurrent_markets,
            currency_table: config.currency_table.clone(),
        }
    }
}

/// Client for one upstream search API serving many regional markets.
///
/// Every failure mode (transport, non-2xx status, malformed body, upstream
/// rejection) is a typed [`ScraperError`] from [`MarketClient::fetch`];
/// [`MarketClient::query`] folds them into an [`EndpointOutcome::Failure`].
/// All requests pass through a [`RequestThrottle`].
pub struct MarketClient {
    client: Client,
    base_url: Url,
    app_id: String,
    result_limit: u32,
    throttle: RequestThrottle,
    rates: CurrencyTable,
}

impl MarketClient {
    /// Creates a client with configured timeout, `User-Agent`, and throttle.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ScraperError::InvalidBaseUrl`] if the
    /// base URL does not parse.
    pub fn new(config: MarketClientConfig) -> Result<Self, ScraperError> {
        let timeout_secs = config.timeout_secs.max(1);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .user_agent(&config.user_agent)
            .build()?;

        let base_url =
            Url::parse(&config.base_url).map_err(|e| ScraperError::InvalidBaseUrl {
                base_url: config.base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            app_id: config.app_id,
            result_limit: config.result_limit,
            throttle: RequestThrottle::new(
                Duration::from_millis(config.inter_request_delay_ms),
                config.request_streams,
            ),
            rates: config.currency_table,
        })
    }

    /// Searches one market and returns its normalized listings, or the
    /// reason it failed. Never returns an error.
    pub async fn query(&self, search_term: &str, market: &MarketEndpoint) -> EndpointOutcome {
        match self.fetch(search_term, market).await {
            Ok(page) => {
                let listings = normalize_page(&page, market, &self.rates);
                tracing::info!(
                    market = %market.code,
                    returned = listings.len(),
                    total_results = page.metadata.total_results,
                    "market search succeeded"
                );
                EndpointOutcome::Success {
                    code: market.code.clone(),
                    name: market.name.clone(),
                    total_results: page.metadata.total_results,
                    listings,
                    metadata: page.metadata,
                }
            }
            Err(e) => {
                tracing::warn!(market = %market.code, error = %e, "market search failed");
                let error = match e {
                    ScraperError::Api { message, .. } => message,
                    other => other.to_string(),
                };
                EndpointOutcome::failure(&market.code, error)
            }
        }
    }

    /// Issues one throttled search request against `market`.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Http`]: connection failure or timeout.
    /// - [`ScraperError::RateLimited`]: HTTP 429.
    /// - [`ScraperError::UnexpectedStatus`]: any other non-2xx status.
    /// - [`ScraperError::Deserialize`]: body is not JSON.
    /// - [`ScraperError::MissingEnvelope`]: JSON lacks the response envelope.
    /// - [`ScraperError::Api`]: upstream acknowledged with anything but `success`.
    pub async fn fetch(
        &self,
        search_term: &str,
        market: &MarketEndpoint,
    ) -> Result<SearchPage, ScraperError> {
        let url = self.search_url(search_term, market);
        tracing::debug!(market = %market.code, global_id = %market.global_id, "querying market");
        self.throttle.run(|| self.send(url, market)).await
    }

    async fn send(&self, url: Url, market: &MarketEndpoint) -> Result<SearchPage, ScraperError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ScraperError::RateLimited {
                market: market.code.clone(),
                retry_after_secs,
            });
        }

        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                market: market.code.clone(),
            });
        }

        let body = response.text().await?;
        let fetched_at = Utc::now();
        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| ScraperError::Deserialize {
                context: format!("search response from market {}", market.code),
                source: e,
            })?;

        let page = SearchPage::from_envelope(&value, &market.code, fetched_at)?;
        if !page.is_acknowledged() {
            return Err(ScraperError::Api {
                market: market.code.clone(),
                ack: page.ack.clone(),
                message: page
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_owned()),
            });
        }

        Ok(page)
    }

    /// Builds the search URL: routing parameter, keywords, page size, and
    /// the fixed filters (fixed price, New or Used, cheapest first).
    fn search_url(&self, search_term: &str, market: &MarketEndpoint) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("OPERATION-NAME", OPERATION)
            .append_pair("SERVICE-VERSION", SERVICE_VERSION)
            .append_pair("SECURITY-APPNAME", &self.app_id)
            .append_pair("RESPONSE-DATA-FORMAT", "JSON")
            .append_pair("REST-PAYLOAD", "")
            .append_pair("GLOBAL-ID", &market.global_id)
            .append_pair("keywords", search_term)
            .append_pair(
                "paginationInput.entriesPerPage",
                &self.result_limit.to_string(),
            )
            .append_pair("itemFilter(0).name", "ListingType")
            .append_pair("itemFilter(0).value", "FixedPrice")
            .append_pair("itemFilter(1).name", "Condition")
            .append_pair("itemFilter(1).value(0)", "New")
            .append_pair("itemFilter(1).value(1)", "Used")
            .append_pair("sortOrder", "PricePlusShippingLowest");
        url
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
