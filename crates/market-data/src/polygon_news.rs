use analysis_core::{AnalysisError, NewsArticle, NewsProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::fetcher::days_before;
use crate::{error_for_status, http_client};

const BASE_URL: &str = "https://api.polygon.io";

/// Headline search against Polygon's `/v2/reference/news`.
#[derive(Clone)]
pub struct PolygonNewsClient {
    api_key: String,
    client: Client,
}

impl PolygonNewsClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: http_client(),
        }
    }
}

/// Polygon keys crypto as `X:BTCUSD` and has no NSE/BSE listings, so Indian
/// symbols are searched by their bare ticker.
pub fn news_ticker(query: &str) -> String {
    let upper = query.trim().to_uppercase();
    if let Some(base) = upper.strip_suffix("-USD") {
        return format!("X:{}USD", base);
    }
    upper
        .trim_end_matches(".NS")
        .trim_end_matches(".BO")
        .to_string()
}

#[async_trait]
impl NewsProvider for PolygonNewsClient {
    async fn search(
        &self,
        query: &str,
        lookback_days: i64,
        max_results: usize,
    ) -> Result<Vec<NewsArticle>, AnalysisError> {
        let url = format!("{}/v2/reference/news", BASE_URL);
        let since = days_before(Utc::now().date_naive(), lookback_days)?.format("%Y-%m-%d");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.clone()),
                ("ticker", news_ticker(query)),
                ("published_utc.gte", since.to_string()),
                ("order", "desc".to_string()),
                ("limit", max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        let response = error_for_status("Polygon news", response).await?;
        let news: NewsResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(into_articles(news, max_results))
    }
}

fn into_articles(news: NewsResponse, max_results: usize) -> Vec<NewsArticle> {
    news.results
        .into_iter()
        .filter(|r| !r.title.trim().is_empty())
        .take(max_results)
        .map(|r| NewsArticle {
            title: r.title,
            published_utc: r
                .published_utc
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            article_url: r.article_url,
            publisher: r.publisher.map(|p| p.name),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsResult>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    title: String,
    published_utc: Option<String>,
    article_url: Option<String>,
    publisher: Option<Publisher>,
}

#[derive(Debug, Deserialize)]
struct Publisher {
    name: String,
}
