use analysis_core::{AnalysisError, Bar, PriceHistory, PriceHistoryProvider, PriceSource};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::{error_for_status, http_client};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Crypto closes from CoinGecko's `market_chart` endpoint. Only a daily price
/// is published, so open/high/low all equal the close.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new() -> Self {
        Self {
            client: http_client(),
            base_url: BASE_URL.to_string(),
        }
    }
}

impl Default for CoinGeckoClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept either a CoinGecko id (`bitcoin`) or a ticker pair (`BTC-USD`).
pub fn coin_id(symbol: &str) -> String {
    let base = symbol
        .to_uppercase()
        .trim_end_matches("-USD")
        .to_string();
    match base.as_str() {
        "BTC" => "bitcoin".to_string(),
        "ETH" => "ethereum".to_string(),
        "BNB" => "binancecoin".to_string(),
        "SOL" => "solana".to_string(),
        "ADA" => "cardano".to_string(),
        "XRP" => "ripple".to_string(),
        "DOGE" => "dogecoin".to_string(),
        _ => symbol.to_lowercase(),
    }
}

#[async_trait]
impl PriceHistoryProvider for CoinGeckoClient {
    fn source(&self) -> PriceSource {
        PriceSource::CoinGecko
    }

    async fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PriceHistory, AnalysisError> {
        let id = coin_id(symbol);
        let url = format!("{}/coins/{}/market_chart", self.base_url, id);
        let days = (Utc::now().date_naive() - from).num_days().max(1);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("vs_currency", "usd".to_string()),
                ("days", days.to_string()),
                ("interval", "daily".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        let response = error_for_status("CoinGecko", response).await?;
        let chart: MarketChart = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(parse_market_chart(chart, from, to))
    }
}

fn parse_market_chart(chart: MarketChart, from: NaiveDate, to: NaiveDate) -> PriceHistory {
    let volumes: BTreeMap<NaiveDate, f64> = chart
        .total_volumes
        .iter()
        .filter_map(|&(ms, v)| Some((day_of(ms)?, v)))
        .collect();

    let bars = chart
        .prices
        .iter()
        .filter_map(|&(ms, price)| {
            let date = day_of(ms)?;
            if date < from || date > to || !price.is_finite() {
                return None;
            }
            Some(Bar {
                date,
                open: price,
                high: price,
                low: price,
                close: price,
                volume: volumes.get(&date).copied().unwrap_or(0.0),
            })
        })
        .collect();

    PriceHistory {
        bars,
        currency: Some("USD".to_string()),
    }
}

fn day_of(ms: f64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(ms as i64).map(|dt| dt.date_naive())
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<(f64, f64)>,
    #[serde(default)]
    total_volumes: Vec<(f64, f64)>,
}
