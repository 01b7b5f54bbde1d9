use analysis_core::{
    NewsArticle, NewsProvider, ScoredHeadline, SentimentLabel, SentimentResult,
};
use chrono::Utc;
use statrs::statistics::Statistics;
use std::sync::Arc;

pub mod lexicon;

pub use lexicon::LexiconAnalyzer;

pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;
pub const DEFAULT_MAX_ARTICLES: usize = 20;
/// Article cap used inside the prediction pipeline.
pub const PREDICTION_MAX_ARTICLES: usize = 15;
pub const TOP_HEADLINES: usize = 5;

/// Fetches recent headlines for a query and folds their polarity into one
/// [`SentimentResult`]. Failures never propagate: they become a neutral result
/// with `error` set.
pub struct SentimentScorer {
    news: Option<Arc<dyn NewsProvider>>,
    analyzer: LexiconAnalyzer,
}

impl SentimentScorer {
    pub fn new(news: Option<Arc<dyn NewsProvider>>) -> Self {
        Self {
            news,
            analyzer: LexiconAnalyzer::new(),
        }
    }

    pub fn analyzer(&self) -> &LexiconAnalyzer {
        &self.analyzer
    }

    pub async fn score(&self, query: &str, lookback_days: i64, max_articles: usize) -> SentimentResult {
        let Some(news) = &self.news else {
            return SentimentResult::neutral(
                query,
                Some("News provider not configured (set POLYGON_API_KEY)".to_string()),
            );
        };

        match news.search(query, lookback_days, max_articles).await {
            Ok(articles) => self.aggregate(query, &articles, max_articles),
            Err(e) => {
                tracing::warn!("News fetch failed for {}: {}", query, e);
                SentimentResult::neutral(query, Some(e.to_string()))
            }
        }
    }

    /// Score each title and aggregate. Confidence grows with article count and
    /// shrinks with disagreement between headlines.
    pub fn aggregate(&self, symbol: &str, articles: &[NewsArticle], max_articles: usize) -> SentimentResult {
        let max_articles = max_articles.max(1);
        let articles = &articles[..articles.len().min(max_articles)];
        if articles.is_empty() {
            return SentimentResult::neutral(symbol, None);
        }

        let scores: Vec<f64> = articles
            .iter()
            .map(|a| self.analyzer.compound(&a.title))
            .collect();

        let mean = scores.iter().mean();
        let variance = if scores.len() > 1 {
            scores.iter().population_variance()
        } else {
            0.0
        };
        let coverage = (scores.len() as f64 / max_articles as f64).min(1.0);
        let confidence = (coverage * (1.0 - variance)).clamp(0.0, 1.0);

        let headlines = articles
            .iter()
            .zip(&scores)
            .take(TOP_HEADLINES)
            .map(|(a, &s)| ScoredHeadline {
                title: a.title.clone(),
                sentiment: s,
                date: a.published_utc,
                link: a.article_url.clone(),
            })
            .collect();

        tracing::debug!(
            symbol,
            articles = scores.len(),
            score = mean,
            confidence,
            "aggregated headline sentiment"
        );

        SentimentResult {
            symbol: symbol.to_string(),
            sentiment_score: mean.clamp(-1.0, 1.0),
            sentiment_label: SentimentLabel::from_score(mean),
            articles_analyzed: scores.len(),
            confidence,
            headlines,
            error: None,
            timestamp: Utc::now(),
        }
    }
}
