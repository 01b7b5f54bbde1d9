#[cfg(test)]
mod tests {
    use super::super::*;
    use analysis_core::{Bar, PriceHistory, PriceHistoryProvider, Trend};
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use forecast_engine::LstmConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Constant-price history for any symbol not listed in `failing`.
    struct FlatProvider {
        price: f64,
        bars: usize,
        failing: Vec<&'static str>,
        calls: AtomicUsize,
        last_span_days: Mutex<Option<i64>>,
    }

    impl FlatProvider {
        fn new(price: f64, bars: usize) -> Self {
            Self {
                price,
                bars,
                failing: Vec::new(),
                calls: AtomicUsize::new(0),
                last_span_days: Mutex::new(None),
            }
        }

        fn failing(mut self, symbols: &[&'static str]) -> Self {
            self.failing = symbols.to_vec();
            self
        }
    }

    #[async_trait]
    impl PriceHistoryProvider for FlatProvider {
        fn source(&self) -> PriceSource {
            PriceSource::Yahoo
        }

        async fn daily_bars(
            &self,
            symbol: &str,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<PriceHistory, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_span_days.lock().unwrap() = Some((to - from).num_days());

            if self.failing.iter().any(|s| *s == symbol) {
                return Err(AnalysisError::NotFound(format!("No data found for symbol {}", symbol)));
            }

            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let bars = (0..self.bars)
                .map(|i| Bar {
                    date: start + Duration::days(i as i64),
                    open: self.price,
                    high: self.price,
                    low: self.price,
                    close: self.price,
                    volume: 1_000_000.0,
                })
                .collect();
            Ok(PriceHistory {
                bars,
                currency: Some("USD".to_string()),
            })
        }
    }

    fn fast_settings(cache_ttl_secs: i64) -> PredictionSettings {
        PredictionSettings {
            forecast: ForecastConfig {
                sequence: LstmConfig {
                    hidden: 8,
                    dense_units: 4,
                    epochs: 3,
                    ..LstmConfig::default()
                },
                ..ForecastConfig::default()
            },
            cache_ttl_secs,
            ..PredictionSettings::default()
        }
    }

    fn service(provider: Arc<FlatProvider>, cache_ttl_secs: i64) -> PredictionService {
        let fetcher = SeriesFetcher::new(PriceSource::Yahoo).with_provider(provider);
        PredictionService::new(fetcher, SentimentScorer::new(None), fast_settings(cache_ttl_secs))
    }

    #[tokio::test]
    async fn test_flat_series_prediction_is_neutral() {
        let provider = Arc::new(FlatProvider::new(175.0, 90));
        let svc = service(provider, DEFAULT_CACHE_TTL_SECS);

        let record = svc
            .predict("AAPL", Market::Us, PredictionPeriod::SevenDays)
            .await
            .unwrap();

        assert_eq!(record.symbol, "AAPL");
        assert_eq!(record.name, "Apple Inc.");
        assert_eq!(record.current_price, 175.0);
        assert!((record.predicted_price - 175.0).abs() < 1e-6);
        assert_eq!(record.sentiment_score, 0.0);
        assert_eq!(record.trend, Trend::Neutral);
        assert!((75..=95).contains(&record.confidence));
        assert_eq!(record.forecast_path.len(), 7);
        assert_eq!(record.timeframe, "7 days");
    }

    #[tokio::test]
    async fn test_crypto_batch_returns_all_five() {
        let provider = Arc::new(FlatProvider::new(30_000.0, 90));
        let svc = service(provider, DEFAULT_CACHE_TTL_SECS);

        let batch = svc.predict_market(Market::Crypto, PredictionPeriod::OneDay).await;

        assert_eq!(batch.count, 5);
        assert_eq!(batch.predictions.len(), batch.count);
        let symbols: Vec<&str> = batch.predictions.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC-USD", "ETH-USD", "BNB-USD", "SOL-USD", "ADA-USD"]);
        assert_eq!(batch.predictions[0].sector, "Store of Value");
    }

    #[tokio::test]
    async fn test_batch_skips_failed_symbols() {
        let provider = Arc::new(FlatProvider::new(30_000.0, 90).failing(&["SOL-USD", "ADA-USD"]));
        let svc = service(provider, DEFAULT_CACHE_TTL_SECS);

        let batch = svc.predict_market(Market::Crypto, PredictionPeriod::OneDay).await;

        assert_eq!(batch.count, 3);
        assert_eq!(batch.predictions.len(), 3);
        assert!(batch.predictions.iter().all(|p| p.symbol != "SOL-USD"));
    }

    #[tokio::test]
    async fn test_short_history_gives_no_prediction() {
        let provider = Arc::new(FlatProvider::new(50.0, 25));
        let svc = service(provider, DEFAULT_CACHE_TTL_SECS);

        let err = svc
            .predict("MSFT", Market::Us, PredictionPeriod::OneDay)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));
    }

    #[tokio::test]
    async fn test_prediction_is_cached() {
        let provider = Arc::new(FlatProvider::new(100.0, 60));
        let svc = service(provider.clone(), DEFAULT_CACHE_TTL_SECS);

        let first = svc.predict("aapl", Market::Us, PredictionPeriod::OneDay).await.unwrap();
        let second = svc.predict("AAPL", Market::Us, PredictionPeriod::OneDay).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.timestamp, second.timestamp);
    }

    #[tokio::test]
    async fn test_zero_ttl_refetches() {
        let provider = Arc::new(FlatProvider::new(100.0, 60));
        let svc = service(provider.clone(), 0);

        svc.stock_data("AAPL", 30, None).await.unwrap();
        svc.stock_data("AAPL", 30, None).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_symbol_is_input_error() {
        let svc = service(Arc::new(FlatProvider::new(1.0, 40)), 0);
        let err = svc
            .predict("   ", Market::Us, PredictionPeriod::SevenDays)
            .await
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn test_indicator_period_maps_to_days() {
        let provider = Arc::new(FlatProvider::new(10.0, 60));
        let svc = service(provider.clone(), DEFAULT_CACHE_TTL_SECS);

        let report = svc.indicators("aapl", "1w").await.unwrap();
        assert_eq!(report.symbol, "AAPL");
        assert_eq!(report.period, "1w");
        assert_eq!(*provider.last_span_days.lock().unwrap(), Some(7));

        svc.indicators("AAPL", "5y").await.unwrap();
        assert_eq!(*provider.last_span_days.lock().unwrap(), Some(30));
        assert_eq!(indicator_days("1Y"), 365);
    }

    #[tokio::test]
    async fn test_search_infers_market_from_suffix() {
        let provider = Arc::new(FlatProvider::new(64_000.0, 30).failing(&["NOPE"]));
        let svc = service(provider, DEFAULT_CACHE_TTL_SECS);

        let hit = svc.search("btc-usd", None).await.unwrap();
        assert_eq!(hit.symbol, "BTC-USD");
        assert_eq!(hit.market, Market::Crypto);
        assert_eq!(hit.name, "Bitcoin");
        assert_eq!(hit.current_price, 64_000.0);
        assert!(hit.found);

        let err = svc.search("nope", Some(Market::Us)).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound(_)));
    }

    #[test]
    fn test_train_is_acknowledged_only() {
        let svc = service(Arc::new(FlatProvider::new(1.0, 40)), 0);

        let all = svc.train(None, true);
        assert_eq!(all.status, "training_initiated");
        assert_eq!(all.message, "Training initiated for us, indian, crypto");

        let one = svc.train(Some(Market::Indian), false);
        assert_eq!(one.market, Some(Market::Indian));
        assert_eq!(one.message, "Training initiated for indian");
    }
}
