use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AnalysisError;

/// Daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Raw provider response before normalization.
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    pub bars: Vec<Bar>,
    pub currency: Option<String>,
}

/// Ordered daily series for one symbol. Dates are strictly increasing.
#[derive(Debug, Clone, Serialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Sort by date and keep the last bar seen for a duplicated date.
    pub fn from_unsorted(symbol: impl Into<String>, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self {
            symbol: symbol.into(),
            bars: deduped,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// The most recent `n` bars (or all of them when shorter).
    pub fn tail(&self, n: usize) -> &[Bar] {
        &self.bars[self.bars.len().saturating_sub(n)..]
    }

    /// Bars dated on or before `date`.
    pub fn truncate_after(&self, date: NaiveDate) -> Self {
        Self {
            symbol: self.symbol.clone(),
            bars: self.bars.iter().filter(|b| b.date <= date).cloned().collect(),
        }
    }
}

/// Trailing indicator values. `None` until enough history exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub ema_12: Option<f64>,
    pub ema_26: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
}

/// Fetcher output: the series plus the fields the API exposes about it.
#[derive(Debug, Clone, Serialize)]
pub struct StockSnapshot {
    pub symbol: String,
    #[serde(rename = "currentPrice")]
    pub current_price: f64,
    pub currency: String,
    #[serde(rename = "dayHigh")]
    pub day_high: f64,
    #[serde(rename = "dayLow")]
    pub day_low: f64,
    pub volume: f64,
    pub source: PriceSource,
    pub historical_data: Vec<Bar>,
    pub technical_indicators: IndicatorSet,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub series: PriceSeries,
}

/// Where daily history comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Yahoo,
    AlphaVantage,
    CoinGecko,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::Yahoo => "yahoo",
            PriceSource::AlphaVantage => "alpha_vantage",
            PriceSource::CoinGecko => "coingecko",
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceSource {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yahoo" | "yfinance" => Ok(PriceSource::Yahoo),
            "alpha_vantage" | "alphavantage" => Ok(PriceSource::AlphaVantage),
            "coingecko" => Ok(PriceSource::CoinGecko),
            other => Err(AnalysisError::InvalidInput(format!(
                "Unknown price source: {}",
                other
            ))),
        }
    }
}

/// Market segment a symbol belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Us,
    Indian,
    Crypto,
}

impl Market {
    pub const ALL: [Market; 3] = [Market::Us, Market::Indian, Market::Crypto];

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Us => "us",
            Market::Indian => "indian",
            Market::Crypto => "crypto",
        }
    }

    /// Guess the market from symbol conventions (`.NS` suffix, `-USD` pairs).
    pub fn infer(symbol: &str) -> Market {
        let upper = symbol.to_uppercase();
        if upper.ends_with(".NS") || upper.ends_with(".BO") {
            Market::Indian
        } else if upper.ends_with("-USD") {
            Market::Crypto
        } else {
            Market::Us
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "us" => Ok(Market::Us),
            "indian" => Ok(Market::Indian),
            "crypto" => Ok(Market::Crypto),
            _ => Err(AnalysisError::InvalidInput(
                "Invalid market. Use: us, indian, crypto".to_string(),
            )),
        }
    }
}

/// Requested prediction horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictionPeriod {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "90d")]
    NinetyDays,
}

impl PredictionPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionPeriod::OneDay => "1d",
            PredictionPeriod::SevenDays => "7d",
            PredictionPeriod::ThirtyDays => "30d",
            PredictionPeriod::NinetyDays => "90d",
        }
    }

    /// Number of autoregressive steps rolled forward for this period.
    pub fn horizon_steps(&self) -> usize {
        match self {
            PredictionPeriod::OneDay => 1,
            PredictionPeriod::SevenDays => 7,
            PredictionPeriod::ThirtyDays => 30,
            PredictionPeriod::NinetyDays => 90,
        }
    }

    pub fn timeframe_label(&self) -> &'static str {
        match self {
            PredictionPeriod::OneDay => "1 day",
            PredictionPeriod::SevenDays => "7 days",
            PredictionPeriod::ThirtyDays => "30 days",
            PredictionPeriod::NinetyDays => "90 days",
        }
    }
}

impl Default for PredictionPeriod {
    fn default() -> Self {
        PredictionPeriod::SevenDays
    }
}

impl fmt::Display for PredictionPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictionPeriod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" => Ok(PredictionPeriod::OneDay),
            "7d" => Ok(PredictionPeriod::SevenDays),
            "30d" => Ok(PredictionPeriod::ThirtyDays),
            "90d" => Ok(PredictionPeriod::NinetyDays),
            _ => Err(AnalysisError::InvalidInput(
                "Invalid period. Use: 1d, 7d, 30d, 90d".to_string(),
            )),
        }
    }
}

/// Direction label derived from the predicted percent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    /// Bullish above +2%, bearish below -2%.
    pub fn from_change_pct(change_pct: f64) -> Self {
        if change_pct > 2.0 {
            Trend::Bullish
        } else if change_pct < -2.0 {
            Trend::Bearish
        } else {
            Trend::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.05 {
            SentimentLabel::Positive
        } else if score <= -0.05 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

/// News headline as returned by a news provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub published_utc: Option<DateTime<Utc>>,
    pub article_url: Option<String>,
    pub publisher: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredHeadline {
    pub title: String,
    pub sentiment: f64,
    pub date: Option<DateTime<Utc>>,
    pub link: Option<String>,
}

/// Aggregated headline polarity for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResult {
    pub symbol: String,
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    pub articles_analyzed: usize,
    pub confidence: f64,
    #[serde(default)]
    pub headlines: Vec<ScoredHeadline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SentimentResult {
    /// Zero-signal result used when no headlines are available.
    pub fn neutral(symbol: &str, error: Option<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            sentiment_score: 0.0,
            sentiment_label: SentimentLabel::Neutral,
            articles_analyzed: 0,
            confidence: 0.0,
            headlines: Vec::new(),
            error,
            timestamp: Utc::now(),
        }
    }
}

/// The externally visible prediction. Built once per request and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub symbol: String,
    pub name: String,
    #[serde(rename = "currentPrice")]
    pub current_price: f64,
    #[serde(rename = "predictedPrice")]
    pub predicted_price: f64,
    pub confidence: u8,
    pub trend: Trend,
    pub accuracy: u8,
    pub factors: Vec<String>,
    pub sector: String,
    pub timeframe: String,
    pub market: Market,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "priceChange")]
    pub price_change: f64,
    pub sentiment_score: f64,
    pub lstm_prediction: f64,
    pub sentiment_adjustment: f64,
    pub forecast_path: Vec<f64>,
    pub model: String,
}
