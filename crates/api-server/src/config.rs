use analysis_core::{NewsProvider, PriceSource};
use anyhow::{Context, Result};
use forecast_engine::{ForecastConfig, ForecastStrategy};
use market_data::{
    AlphaVantageClient, CoinGeckoClient, PolygonNewsClient, SeriesFetcher, YahooChartClient,
};
use prediction_orchestrator::{PredictionService, PredictionSettings, DEFAULT_CACHE_TTL_SECS};
use sentiment_analysis::SentimentScorer;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,

    // Data sources
    pub price_source: PriceSource,
    pub alpha_vantage_api_key: Option<String>,
    pub polygon_api_key: Option<String>,

    // Forecasting
    pub history_days: i64,
    pub forecast_lookback: usize,
    pub forecast_epochs: usize,
    pub forecast_strategy: ForecastStrategy,

    // Sentiment
    pub news_lookback_days: i64,
    pub news_max_articles: usize,

    /// Seconds; 0 disables caching
    pub cache_ttl_secs: i64,
    /// `None` allows any origin
    pub cors_origins: Option<Vec<String>>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 5000)?,

            price_source: parse_or(&get, "PRICE_SOURCE", PriceSource::Yahoo)?,
            alpha_vantage_api_key: get("ALPHA_VANTAGE_API_KEY"),
            polygon_api_key: get("POLYGON_API_KEY"),

            history_days: parse_or(&get, "PREDICTION_HISTORY_DAYS", 90)?,
            forecast_lookback: parse_or(&get, "FORECAST_LOOKBACK", 20)?,
            forecast_epochs: parse_or(&get, "FORECAST_EPOCHS", 20)?,
            forecast_strategy: parse_or(&get, "FORECAST_STRATEGY", ForecastStrategy::Sequence)?,

            news_lookback_days: parse_or(&get, "NEWS_LOOKBACK_DAYS", 7)?,
            news_max_articles: parse_or(&get, "NEWS_MAX_ARTICLES", 15)?,

            cache_ttl_secs: parse_or(&get, "CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?,
            cors_origins: get("CORS_ORIGINS").and_then(|raw| {
                if raw == "*" {
                    return None;
                }
                let origins: Vec<String> = raw
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect();
                (!origins.is_empty()).then_some(origins)
            }),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.price_source == PriceSource::AlphaVantage && self.alpha_vantage_api_key.is_none() {
            anyhow::bail!("PRICE_SOURCE=alpha_vantage requires ALPHA_VANTAGE_API_KEY");
        }
        if self.history_days <= 0 {
            anyhow::bail!("PREDICTION_HISTORY_DAYS must be positive");
        }
        if self.forecast_lookback == 0 {
            anyhow::bail!("FORECAST_LOOKBACK must be at least 1");
        }
        if self.forecast_epochs == 0 {
            anyhow::bail!("FORECAST_EPOCHS must be at least 1");
        }
        if self.cache_ttl_secs < 0 {
            anyhow::bail!("CACHE_TTL_SECS cannot be negative");
        }
        Ok(())
    }

    pub fn prediction_settings(&self) -> PredictionSettings {
        PredictionSettings {
            history_days: self.history_days,
            forecast: ForecastConfig {
                strategy: self.forecast_strategy,
                lookback: self.forecast_lookback,
                ..ForecastConfig::default()
            }
            .with_epochs(self.forecast_epochs),
            news_lookback_days: self.news_lookback_days,
            news_max_articles: self.news_max_articles,
            cache_ttl_secs: self.cache_ttl_secs,
        }
    }

    /// Wire the HTTP providers into a service. Yahoo and CoinGecko need no key.
    pub fn build_service(&self) -> PredictionService {
        let mut fetcher = SeriesFetcher::new(self.price_source)
            .with_provider(Arc::new(YahooChartClient::new()))
            .with_provider(Arc::new(CoinGeckoClient::new()));
        if let Some(key) = &self.alpha_vantage_api_key {
            fetcher = fetcher.with_provider(Arc::new(AlphaVantageClient::new(key.clone())));
        }

        let news = self
            .polygon_api_key
            .clone()
            .map(|key| Arc::new(PolygonNewsClient::new(key)) as Arc<dyn NewsProvider>);
        if news.is_none() {
            tracing::warn!("POLYGON_API_KEY not set - sentiment will be neutral");
        }

        PredictionService::new(fetcher, SentimentScorer::new(news), self.prediction_settings())
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, raw)),
        None => Ok(default),
    }
}
