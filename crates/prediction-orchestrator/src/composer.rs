use analysis_core::{IndicatorSet, Market, PredictionPeriod, PredictionRecord, SentimentResult, Trend};
use chrono::Utc;
use forecast_engine::{Forecast, PRICE_FLOOR_RATIO};

use crate::catalog;

/// Maximum relative nudge applied by a sentiment score of +/-1.
pub const SENTIMENT_WEIGHT: f64 = 0.05;
pub const BASE_CONFIDENCE: u8 = 75;
pub const SENTIMENT_CONFIDENCE_POINTS: f64 = 20.0;
pub const MAX_CONFIDENCE: u8 = 95;

const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;
const SENTIMENT_FACTOR_THRESHOLD: f64 = 0.1;

pub struct CompositionInput<'a> {
    pub symbol: &'a str,
    pub market: Market,
    pub period: PredictionPeriod,
    pub current_price: f64,
    pub forecast: &'a Forecast,
    pub indicators: &'a IndicatorSet,
    pub sentiment: &'a SentimentResult,
}

/// Blend the model forecast with headline sentiment into the outgoing record.
pub fn compose(input: CompositionInput<'_>) -> PredictionRecord {
    let model_prediction = input.forecast.final_price();
    let sentiment_score = input.sentiment.sentiment_score;
    let sentiment_adjustment = sentiment_score * SENTIMENT_WEIGHT;

    let predicted_price = adjusted_prediction(model_prediction, sentiment_score, input.current_price);
    let price_change = price_change_pct(input.current_price, predicted_price);
    let confidence = confidence(input.sentiment.confidence);

    PredictionRecord {
        symbol: input.symbol.to_string(),
        name: catalog::company_name(input.symbol, input.market),
        current_price: input.current_price,
        predicted_price,
        confidence,
        trend: Trend::from_change_pct(price_change),
        accuracy: confidence,
        factors: factors(input.indicators, sentiment_score, input.forecast.strategy.factor_label()),
        sector: catalog::sector(input.symbol, input.market),
        timeframe: input.period.timeframe_label().to_string(),
        market: input.market,
        timestamp: Utc::now(),
        price_change,
        sentiment_score,
        lstm_prediction: model_prediction,
        sentiment_adjustment,
        forecast_path: input.forecast.path.clone(),
        model: input.forecast.strategy.model_name().to_string(),
    }
}

/// `prediction * (1 + score * 0.05)`, never below half the current price.
pub fn adjusted_prediction(model_prediction: f64, sentiment_score: f64, current_price: f64) -> f64 {
    let adjusted = model_prediction * (1.0 + sentiment_score * SENTIMENT_WEIGHT);
    adjusted.max(current_price * PRICE_FLOOR_RATIO)
}

/// Percent change rounded to two decimals; 0 when there is no current price.
pub fn price_change_pct(current: f64, predicted: f64) -> f64 {
    if current == 0.0 {
        return 0.0;
    }
    (((predicted - current) / current) * 100.0 * 100.0).round() / 100.0
}

pub fn confidence(sentiment_confidence: f64) -> u8 {
    let boost = (sentiment_confidence.clamp(0.0, 1.0) * SENTIMENT_CONFIDENCE_POINTS).trunc() as u8;
    (BASE_CONFIDENCE + boost).min(MAX_CONFIDENCE)
}

pub fn factors(indicators: &IndicatorSet, sentiment_score: f64, model_label: &str) -> Vec<String> {
    let mut factors = Vec::new();

    match indicators.rsi {
        Some(rsi) if rsi > RSI_OVERBOUGHT => factors.push("Overbought conditions".to_string()),
        Some(rsi) if rsi < RSI_OVERSOLD => factors.push("Oversold conditions".to_string()),
        _ => {}
    }

    if indicators.macd.is_some_and(|m| m > 0.0) {
        factors.push("Positive MACD momentum".to_string());
    }

    if sentiment_score > SENTIMENT_FACTOR_THRESHOLD {
        factors.push("Positive news sentiment".to_string());
    } else if sentiment_score < -SENTIMENT_FACTOR_THRESHOLD {
        factors.push("Negative news sentiment".to_string());
    }

    if factors.is_empty() {
        return vec!["Technical analysis".to_string(), "AI prediction model".to_string()];
    }
    factors.push(model_label.to_string());
    factors
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecast_engine::{ForecastStrategy, MinMaxScaler};

    fn forecast(path: Vec<f64>, current_price: f64) -> Forecast {
        Forecast {
            strategy: ForecastStrategy::Sequence,
            current_price,
            scaler: MinMaxScaler::fit(&[current_price, current_price * 1.1]).unwrap(),
            path,
            training_windows: 70,
        }
    }

    fn sentiment(score: f64, confidence: f64) -> SentimentResult {
        let mut s = SentimentResult::neutral("AAPL", None);
        s.sentiment_score = score;
        s.confidence = confidence;
        s
    }

    #[test]
    fn test_adjusted_prediction_never_below_floor() {
        for score in [-1.0, -5.0, -100.0, 0.0, 3.0] {
            for model in [0.0, 10.0, 49.0, 200.0] {
                assert!(adjusted_prediction(model, score, 100.0) >= 50.0);
            }
        }
        assert_eq!(adjusted_prediction(100.0, 1.0, 100.0), 105.0);
    }

    #[test]
    fn test_price_change_rounding() {
        assert_eq!(price_change_pct(100.0, 102.3456), 2.35);
        assert_eq!(price_change_pct(200.0, 190.0), -5.0);
        assert_eq!(price_change_pct(0.0, 5.0), 0.0);
    }

    #[test]
    fn test_confidence_bounds() {
        assert_eq!(confidence(0.0), 75);
        assert_eq!(confidence(0.49), 84);
        assert_eq!(confidence(1.0), 95);
        assert_eq!(confidence(7.0), 95);
    }

    #[test]
    fn test_factors_default_when_nothing_trips() {
        let indicators = IndicatorSet {
            rsi: Some(55.0),
            macd: Some(-0.3),
            ..IndicatorSet::default()
        };
        assert_eq!(
            factors(&indicators, 0.05, "LSTM price prediction model"),
            vec!["Technical analysis", "AI prediction model"]
        );
        assert_eq!(factors(&IndicatorSet::default(), 0.0, "x").len(), 2);
    }

    #[test]
    fn test_factors_append_model_label() {
        let indicators = IndicatorSet {
            rsi: Some(75.0),
            macd: Some(1.2),
            ..IndicatorSet::default()
        };
        assert_eq!(
            factors(&indicators, -0.4, "LSTM price prediction model"),
            vec![
                "Overbought conditions",
                "Positive MACD momentum",
                "Negative news sentiment",
                "LSTM price prediction model",
            ]
        );

        let oversold = IndicatorSet {
            rsi: Some(12.0),
            ..IndicatorSet::default()
        };
        assert_eq!(factors(&oversold, 0.0, "m")[0], "Oversold conditions");
    }

    #[test]
    fn test_compose_flat_forecast_is_neutral() {
        let forecast = forecast(vec![175.0; 7], 175.0);
        let indicators = IndicatorSet::default();
        let sentiment = sentiment(0.0, 0.0);

        let record = compose(CompositionInput {
            symbol: "AAPL",
            market: Market::Us,
            period: PredictionPeriod::SevenDays,
            current_price: 175.0,
            forecast: &forecast,
            indicators: &indicators,
            sentiment: &sentiment,
        });

        assert_eq!(record.name, "Apple Inc.");
        assert_eq!(record.sector, "Technology");
        assert_eq!(record.predicted_price, 175.0);
        assert_eq!(record.price_change, 0.0);
        assert_eq!(record.trend, Trend::Neutral);
        assert_eq!(record.confidence, 75);
        assert_eq!(record.accuracy, record.confidence);
        assert_eq!(record.timeframe, "7 days");
        assert_eq!(record.model, "LSTM");
        assert_eq!(record.forecast_path.len(), 7);
    }

    #[test]
    fn test_compose_bullish_with_sentiment() {
        let forecast = forecast(vec![101.0, 103.0, 104.0], 100.0);
        let indicators = IndicatorSet::default();
        let sentiment = sentiment(0.5, 0.65);

        let record = compose(CompositionInput {
            symbol: "TSLA",
            market: Market::Us,
            period: PredictionPeriod::OneDay,
            current_price: 100.0,
            forecast: &forecast,
            indicators: &indicators,
            sentiment: &sentiment,
        });

        assert_eq!(record.lstm_prediction, 104.0);
        assert!((record.sentiment_adjustment - 0.025).abs() < 1e-12);
        assert!((record.predicted_price - 106.6).abs() < 1e-9);
        assert_eq!(record.price_change, 6.6);
        assert_eq!(record.trend, Trend::Bullish);
        assert_eq!(record.confidence, 88);
        assert!(record.factors.contains(&"Positive news sentiment".to_string()));
    }
}
