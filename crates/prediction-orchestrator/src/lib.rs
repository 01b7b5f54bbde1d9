use analysis_core::{
    AnalysisError, IndicatorSet, Market, PredictionPeriod, PredictionRecord, PriceSource,
    StockSnapshot,
};
use chrono::{DateTime, Utc};
use forecast_engine::{ForecastConfig, Forecaster};
use market_data::SeriesFetcher;
use sentiment_analysis::{SentimentScorer, DEFAULT_LOOKBACK_DAYS, PREDICTION_MAX_ARTICLES};
use serde::Serialize;

pub mod cache;
pub mod catalog;
pub mod composer;

pub use cache::{TtlCache, DEFAULT_CACHE_TTL_SECS};
pub use composer::{compose, CompositionInput};

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;

/// History pulled for every prediction.
pub const DEFAULT_HISTORY_DAYS: i64 = 90;
pub const SEARCH_HISTORY_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct PredictionSettings {
    pub history_days: i64,
    pub forecast: ForecastConfig,
    pub news_lookback_days: i64,
    pub news_max_articles: usize,
    pub cache_ttl_secs: i64,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            history_days: DEFAULT_HISTORY_DAYS,
            forecast: ForecastConfig::default(),
            news_lookback_days: DEFAULT_LOOKBACK_DAYS,
            news_max_articles: PREDICTION_MAX_ARTICLES,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketPredictions {
    pub market: Market,
    pub count: usize,
    pub predictions: Vec<PredictionRecord>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorReport {
    pub symbol: String,
    pub period: String,
    pub indicators: IndicatorSet,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub symbol: String,
    pub name: String,
    pub market: Market,
    pub sector: String,
    #[serde(rename = "currentPrice")]
    pub current_price: f64,
    pub currency: String,
    pub found: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingAck {
    pub status: &'static str,
    pub market: Option<Market>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Lookback in days for an indicator period code. Unknown codes read one month.
pub fn indicator_days(period: &str) -> i64 {
    match period.trim().to_lowercase().as_str() {
        "1d" => 1,
        "1w" => 7,
        "1m" => 30,
        "3m" => 90,
        "1y" => 365,
        _ => 30,
    }
}

/// Runs the prediction pipeline: fetch, forecast and sentiment in parallel,
/// then compose. Models are trained per call and never kept.
pub struct PredictionService {
    fetcher: SeriesFetcher,
    sentiment: SentimentScorer,
    forecaster: Forecaster,
    settings: PredictionSettings,
    /// prediction:{market}:{symbol}:{period}
    prediction_cache: TtlCache<PredictionRecord>,
    /// stock:{source}:{symbol}:{days}
    snapshot_cache: TtlCache<StockSnapshot>,
}

impl PredictionService {
    pub fn new(fetcher: SeriesFetcher, sentiment: SentimentScorer, settings: PredictionSettings) -> Self {
        Self {
            fetcher,
            sentiment,
            forecaster: Forecaster::new(settings.forecast.clone()),
            prediction_cache: TtlCache::new(settings.cache_ttl_secs),
            snapshot_cache: TtlCache::new(settings.cache_ttl_secs),
            settings,
        }
    }

    pub fn settings(&self) -> &PredictionSettings {
        &self.settings
    }

    pub fn sentiment(&self) -> &SentimentScorer {
        &self.sentiment
    }

    /// Full prediction for one symbol.
    pub async fn predict(
        &self,
        symbol: &str,
        market: Market,
        period: PredictionPeriod,
    ) -> Result<PredictionRecord, AnalysisError> {
        let symbol = normalize_symbol(symbol)?;
        let cache_key = format!("prediction:{}:{}:{}", market, symbol, period);
        if let Some(record) = self.prediction_cache.get(&cache_key) {
            tracing::debug!("Prediction cache hit for {}", cache_key);
            return Ok(record);
        }

        tracing::info!(
            "Starting prediction for {} (market: {}, period: {}, strategy: {})",
            symbol,
            market,
            period,
            self.forecaster.config().strategy
        );

        let snapshot = self.stock_data(&symbol, self.settings.history_days, None).await?;

        let closes = snapshot.series.closes();
        let steps = period.horizon_steps();
        let forecaster = self.forecaster.clone();
        let training = tokio::task::spawn_blocking(move || forecaster.forecast(&closes, steps));
        let sentiment = self.sentiment.score(
            &symbol,
            self.settings.news_lookback_days,
            self.settings.news_max_articles,
        );

        let (training, sentiment) = tokio::join!(training, sentiment);
        let forecast = training
            .map_err(|e| AnalysisError::ModelError(format!("training task failed: {}", e)))?
            .map_err(|e| {
                tracing::warn!("No prediction for {}: {}", symbol, e);
                AnalysisError::from(e)
            })?;

        let record = compose(CompositionInput {
            symbol: &symbol,
            market,
            period,
            current_price: snapshot.current_price,
            forecast: &forecast,
            indicators: &snapshot.technical_indicators,
            sentiment: &sentiment,
        });

        tracing::info!(
            "Prediction for {}: {:.2} -> {:.2} ({:+.2}%, {:?}, confidence {})",
            symbol,
            record.current_price,
            record.predicted_price,
            record.price_change,
            record.trend,
            record.confidence
        );

        self.prediction_cache.insert(cache_key, record.clone());
        Ok(record)
    }

    /// Predict every catalog symbol of a market. Failures are logged and skipped.
    pub async fn predict_market(&self, market: Market, period: PredictionPeriod) -> MarketPredictions {
        let mut predictions = Vec::new();

        for symbol in catalog::market_symbols(market) {
            match self.predict(symbol, market, period).await {
                Ok(record) => predictions.push(record),
                Err(e) => {
                    tracing::warn!("Skipping {} in {} batch: {}", symbol, market, e);
                }
            }
        }

        MarketPredictions {
            market,
            count: predictions.len(),
            predictions,
            timestamp: Utc::now(),
        }
    }

    /// Snapshot of series plus indicators (cached, TTL from settings).
    pub async fn stock_data(
        &self,
        symbol: &str,
        days: i64,
        source: Option<PriceSource>,
    ) -> Result<StockSnapshot, AnalysisError> {
        let symbol = normalize_symbol(symbol)?;
        let source = source.unwrap_or(self.fetcher.default_source());
        let cache_key = format!("stock:{}:{}:{}", source, symbol, days);
        if let Some(snapshot) = self.snapshot_cache.get(&cache_key) {
            return Ok(snapshot);
        }

        let snapshot = self.fetcher.fetch(&symbol, days, Some(source)).await?;
        self.snapshot_cache.insert(cache_key, snapshot.clone());
        Ok(snapshot)
    }

    pub async fn indicators(&self, symbol: &str, period: &str) -> Result<IndicatorReport, AnalysisError> {
        let snapshot = self.stock_data(symbol, indicator_days(period), None).await?;
        Ok(IndicatorReport {
            symbol: snapshot.symbol,
            period: period.to_string(),
            indicators: snapshot.technical_indicators,
            timestamp: Utc::now(),
        })
    }

    /// Resolve a symbol to its current quote. Without an explicit market the
    /// symbol suffix decides which catalog the name and sector come from.
    pub async fn search(&self, symbol: &str, market: Option<Market>) -> Result<SearchHit, AnalysisError> {
        let symbol = normalize_symbol(symbol)?;
        let market = market.unwrap_or_else(|| Market::infer(&symbol));

        let snapshot = self
            .stock_data(&symbol, SEARCH_HISTORY_DAYS, None)
            .await
            .map_err(|e| {
                tracing::warn!("Error searching {} in {}: {}", symbol, market, e);
                AnalysisError::NotFound("Symbol not found in any market".to_string())
            })?;

        Ok(SearchHit {
            name: catalog::company_name(&symbol, market),
            sector: catalog::sector(&symbol, market),
            symbol,
            market,
            current_price: snapshot.current_price,
            currency: snapshot.currency,
            found: true,
            timestamp: Utc::now(),
        })
    }

    /// Acknowledge a retraining request. Models are fit per prediction, so
    /// there is nothing to retrain.
    pub fn train(&self, market: Option<Market>, force: bool) -> TrainingAck {
        let markets: Vec<&str> = match market {
            Some(m) => vec![m.as_str()],
            None => Market::ALL.iter().map(|m| m.as_str()).collect(),
        };
        tracing::info!("Training requested for {:?} (force: {})", markets, force);

        TrainingAck {
            status: "training_initiated",
            market,
            message: format!("Training initiated for {}", markets.join(", ")),
            timestamp: Utc::now(),
        }
    }
}

fn normalize_symbol(symbol: &str) -> Result<String, AnalysisError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(AnalysisError::InvalidInput("Symbol is required".to_string()));
    }
    Ok(symbol)
}
