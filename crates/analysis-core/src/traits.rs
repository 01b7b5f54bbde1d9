use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{AnalysisError, NewsArticle, PriceHistory, PriceSource};

/// Source of daily OHLCV history for a symbol.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    fn source(&self) -> PriceSource;

    /// Daily bars in `[from, to]`. Implementations may return bars in any order;
    /// callers normalize through [`crate::PriceSeries::from_unsorted`].
    async fn daily_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PriceHistory, AnalysisError>;
}

/// Headline search over a recency window.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        lookback_days: i64,
        max_results: usize,
    ) -> Result<Vec<NewsArticle>, AnalysisError>;
}
