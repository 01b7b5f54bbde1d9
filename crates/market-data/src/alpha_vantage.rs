use analysis_core::{AnalysisError, Bar, PriceHistory, PriceHistoryProvider, PriceSource};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use crate::{error_for_status, http_client};

const BASE_URL: &str = "https://www.alphavantage.co";

/// Compact output only covers the latest 100 trading days.
const COMPACT_ROWS: i64 = 100;

#[derive(Clone)]
pub struct AlphaVantageClient {
    api_key: String,
    client: Client,
    base_url: String,
}

impl AlphaVantageClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: http_client(),
            base_url: BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl PriceHistoryProvider for AlphaVantageClient {
    fn source(&self) -> PriceSource {
        PriceSource::AlphaVantage
    }

    async fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PriceHistory, AnalysisError> {
        let url = format!("{}/query", self.base_url);
        let span_days = (Utc::now().date_naive() - from).num_days();
        let output_size = if span_days > COMPACT_ROWS { "full" } else { "compact" };

        let response = self
            .client
            .get(&url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", output_size),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        let response = error_for_status("Alpha Vantage", response).await?;
        let body: DailyResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        parse_daily(symbol, body, from, to)
    }
}

fn parse_daily(
    symbol: &str,
    body: DailyResponse,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<PriceHistory, AnalysisError> {
    // Alpha Vantage reports errors and throttling with HTTP 200
    if let Some(msg) = body.error_message {
        return Err(AnalysisError::NotFound(format!("{}: {}", symbol, msg)));
    }
    if let Some(msg) = body.note.or(body.information) {
        return Err(AnalysisError::ApiError(format!("Alpha Vantage: {}", msg)));
    }

    let series = body
        .series
        .ok_or_else(|| AnalysisError::NotFound(format!("No daily series for {}", symbol)))?;

    let mut bars = Vec::with_capacity(series.len());
    for (date, row) in series {
        let Ok(date) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
            tracing::warn!("Skipping Alpha Vantage row with bad date {:?}", date);
            continue;
        };
        if date < from || date > to {
            continue;
        }
        let Some(bar) = row.into_bar(date) else { continue };
        bars.push(bar);
    }
    bars.sort_by_key(|b| b.date);

    Ok(PriceHistory {
        bars,
        currency: Some("USD".to_string()),
    })
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<HashMap<String, DailyRow>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// Alpha Vantage sends every number as a string.
#[derive(Debug, Deserialize)]
struct DailyRow {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

impl DailyRow {
    fn into_bar(self, date: NaiveDate) -> Option<Bar> {
        Some(Bar {
            date,
            open: self.open.parse().ok()?,
            high: self.high.parse().ok()?,
            low: self.low.parse().ok()?,
            close: self.close.parse().ok()?,
            volume: self.volume.parse().unwrap_or(0.0),
        })
    }
}
