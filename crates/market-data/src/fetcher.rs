use analysis_core::{
    AnalysisError, PriceHistoryProvider, PriceSeries, PriceSource, StockSnapshot,
};
use chrono::{Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use technical_analysis::IndicatorCalculator;

/// Rows of history echoed back in `historical_data`.
pub const HISTORY_ROWS: usize = 30;

/// `date - days`, or `InvalidInput` when the result leaves chrono's range.
pub(crate) fn days_before(date: NaiveDate, days: i64) -> Result<NaiveDate, AnalysisError> {
    Duration::try_days(days)
        .and_then(|span| date.checked_sub_signed(span))
        .ok_or_else(|| AnalysisError::InvalidInput("days out of range".to_string()))
}

/// Resolves a symbol to a normalized series plus its indicator snapshot.
#[derive(Clone)]
pub struct SeriesFetcher {
    providers: HashMap<PriceSource, Arc<dyn PriceHistoryProvider>>,
    default_source: PriceSource,
    calculator: IndicatorCalculator,
}

impl SeriesFetcher {
    pub fn new(default_source: PriceSource) -> Self {
        Self {
            providers: HashMap::new(),
            default_source,
            calculator: IndicatorCalculator::new(),
        }
    }

    /// Register a provider under the source it reports.
    pub fn with_provider(mut self, provider: Arc<dyn PriceHistoryProvider>) -> Self {
        self.providers.insert(provider.source(), provider);
        self
    }

    pub fn default_source(&self) -> PriceSource {
        self.default_source
    }

    pub fn has_source(&self, source: PriceSource) -> bool {
        self.providers.contains_key(&source)
    }

    /// Fetch `[today - days, today]` from the selected (or default) source.
    pub async fn fetch(
        &self,
        symbol: &str,
        days: i64,
        source: Option<PriceSource>,
    ) -> Result<StockSnapshot, AnalysisError> {
        if days <= 0 {
            return Err(AnalysisError::InvalidInput(format!(
                "days must be positive, got {}",
                days
            )));
        }
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(AnalysisError::InvalidInput("Symbol is required".to_string()));
        }

        let source = source.unwrap_or(self.default_source);
        let provider = self.providers.get(&source).ok_or_else(|| {
            AnalysisError::InvalidInput(format!("Price source {} is not configured", source))
        })?;

        let to = Utc::now().date_naive();
        let from = days_before(to, days)?;

        let history = provider.daily_bars(&symbol, from, to).await?;
        let series = PriceSeries::from_unsorted(symbol.clone(), history.bars);

        let Some(last) = series.last().cloned() else {
            return Err(AnalysisError::NotFound(format!(
                "No price data found for {}",
                symbol
            )));
        };

        let technical_indicators = self.calculator.calculate_series(&series);

        tracing::info!(
            symbol = %symbol,
            source = %source,
            bars = series.len(),
            last_close = last.close,
            "fetched price series"
        );

        Ok(StockSnapshot {
            symbol,
            current_price: last.close,
            currency: history.currency.unwrap_or_else(|| "USD".to_string()),
            day_high: last.high,
            day_low: last.low,
            volume: last.volume,
            source,
            historical_data: series.tail(HISTORY_ROWS).to_vec(),
            technical_indicators,
            timestamp: Utc::now(),
            series,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Bar, PriceHistory};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct FixedProvider {
        bars: Vec<Bar>,
    }

    #[async_trait]
    impl PriceHistoryProvider for FixedProvider {
        fn source(&self) -> PriceSource {
            PriceSource::Yahoo
        }

        async fn daily_bars(
            &self,
            _symbol: &str,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<PriceHistory, AnalysisError> {
            Ok(PriceHistory {
                bars: self.bars.clone(),
                currency: Some("USD".to_string()),
            })
        }
    }

    fn bars(n: usize) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        // reversed on purpose: providers are not required to sort
        (0..n)
            .rev()
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar {
                    date: start + Duration::days(i as i64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0 * (i + 1) as f64,
                }
            })
            .collect()
    }

    fn fetcher(n: usize) -> SeriesFetcher {
        SeriesFetcher::new(PriceSource::Yahoo)
            .with_provider(Arc::new(FixedProvider { bars: bars(n) }))
    }

    #[tokio::test]
    async fn test_fetch_builds_snapshot_from_last_bar() {
        let snapshot = fetcher(60).fetch("aapl", 90, None).await.unwrap();

        assert_eq!(snapshot.symbol, "AAPL");
        assert_eq!(snapshot.series.len(), 60);
        assert_eq!(snapshot.current_price, 159.0);
        assert_eq!(snapshot.day_high, 160.0);
        assert_eq!(snapshot.day_low, 158.0);
        assert_eq!(snapshot.historical_data.len(), HISTORY_ROWS);
        assert_eq!(snapshot.historical_data.last().unwrap().close, 159.0);
        assert!(snapshot.technical_indicators.sma_50.is_some());
    }

    #[tokio::test]
    async fn test_fetch_empty_series_is_not_found() {
        let err = fetcher(0).fetch("ZZZZ", 30, None).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_input() {
        let f = fetcher(10);
        assert!(f.fetch("AAPL", 0, None).await.unwrap_err().is_input_error());
        assert!(f.fetch("  ", 30, None).await.unwrap_err().is_input_error());
        assert!(f
            .fetch("AAPL", 30, Some(PriceSource::CoinGecko))
            .await
            .unwrap_err()
            .is_input_error());
    }

    #[tokio::test]
    async fn test_fetch_huge_span_is_input_error() {
        let f = fetcher(10);
        for days in [200_000_000, i64::MAX] {
            let err = f.fetch("AAPL", days, None).await.unwrap_err();
            assert_eq!(err, AnalysisError::InvalidInput("days out of range".to_string()));
        }
    }

    #[test]
    fn test_days_before() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(days_before(date, 1), Ok(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(days_before(date, 100_000_000).is_err());
    }
}
