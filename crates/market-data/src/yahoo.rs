use analysis_core::{AnalysisError, Bar, PriceHistory, PriceHistoryProvider, PriceSource};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
use reqwest::Client;
use serde::Deserialize;

use crate::{error_for_status, http_client};

const BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Daily bars from the Yahoo Finance chart endpoint.
#[derive(Clone)]
pub struct YahooChartClient {
    client: Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into(),
        }
    }
}

impl Default for YahooChartClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceHistoryProvider for YahooChartClient {
    fn source(&self) -> PriceSource {
        PriceSource::Yahoo
    }

    async fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PriceHistory, AnalysisError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let period1 = from.and_time(NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive; include the whole `to` day
        let period2 = (to + Duration::days(1)).and_time(NaiveTime::MIN).and_utc().timestamp();

        tracing::debug!("Yahoo chart request for {} ({} .. {})", symbol, from, to);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        let response = error_for_status("Yahoo Finance", response).await?;
        let chart: ChartResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        parse_chart(symbol, chart)
    }
}

fn parse_chart(symbol: &str, chart: ChartResponse) -> Result<PriceHistory, AnalysisError> {
    if let Some(err) = chart.chart.error {
        return Err(AnalysisError::NotFound(format!(
            "{}: {}",
            symbol,
            err.description.unwrap_or(err.code)
        )));
    }

    let result = chart
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| AnalysisError::NotFound(format!("No chart data for {}", symbol)))?;

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .unwrap_or_default();
    let offset = result.meta.gmtoffset.unwrap_or(0);

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        // Rows with a null close are holidays or partial sessions
        let Some(close) = value_at(&quote.close, i) else { continue };
        let Some(dt) = DateTime::from_timestamp(ts + offset, 0) else { continue };

        bars.push(Bar {
            date: dt.date_naive(),
            open: value_at(&quote.open, i).unwrap_or(close),
            high: value_at(&quote.high, i).unwrap_or(close),
            low: value_at(&quote.low, i).unwrap_or(close),
            close,
            volume: value_at(&quote.volume, i).unwrap_or(0.0),
        });
    }

    Ok(PriceHistory {
        bars,
        currency: result.meta.currency,
    })
}

fn value_at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten().filter(|v| v.is_finite())
}

// Yahoo response types

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    currency: Option<String>,
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}
