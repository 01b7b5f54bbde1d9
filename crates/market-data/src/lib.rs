//! Price-history and headline providers, plus the series fetcher that turns
//! provider output into a [`StockSnapshot`](analysis_core::StockSnapshot).

use analysis_core::AnalysisError;
use reqwest::Client;
use std::time::Duration;

pub mod alpha_vantage;
pub mod coingecko;
pub mod fetcher;
pub mod polygon_news;
pub mod yahoo;

pub use alpha_vantage::AlphaVantageClient;
pub use coingecko::CoinGeckoClient;
pub use fetcher::{SeriesFetcher, HISTORY_ROWS};
pub use polygon_news::PolygonNewsClient;
pub use yahoo::YahooChartClient;

const HTTP_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; finpredict/0.1)";

/// Shared client settings for every provider. No retry layer: a failed call
/// surfaces directly to the caller.
pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Turn a non-success response into an `ApiError`, keeping the body for the log.
pub(crate) async fn error_for_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AnalysisError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!("{} returned HTTP {}: {}", provider, status, body);

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(AnalysisError::NotFound(format!("{} has no data (HTTP 404)", provider)));
    }
    Err(AnalysisError::ApiError(format!("{} HTTP {}", provider, status)))
}
