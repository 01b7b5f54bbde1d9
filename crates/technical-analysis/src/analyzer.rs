use analysis_core::{IndicatorSet, PriceSeries};

use crate::indicators::*;

pub const SMA_SHORT_PERIOD: usize = 20;
pub const SMA_LONG_PERIOD: usize = 50;
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_WIDTH: f64 = 2.0;

/// Computes the trailing [`IndicatorSet`] for a close-price series.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorCalculator;

impl IndicatorCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate(&self, closes: &[f64]) -> IndicatorSet {
        let macd_result = macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let bb = bollinger_bands(closes, BOLLINGER_PERIOD, BOLLINGER_WIDTH);

        let set = IndicatorSet {
            sma_20: last(&sma(closes, SMA_SHORT_PERIOD)),
            sma_50: last(&sma(closes, SMA_LONG_PERIOD)),
            ema_12: last(&ema(closes, MACD_FAST)),
            ema_26: last(&ema(closes, MACD_SLOW)),
            rsi: last(&rsi(closes, RSI_PERIOD)),
            macd: last(&macd_result.macd_line),
            macd_signal: last(&macd_result.signal_line),
            bb_upper: last(&bb.upper),
            bb_middle: last(&bb.middle),
            bb_lower: last(&bb.lower),
        };

        tracing::debug!(
            points = closes.len(),
            rsi = ?set.rsi,
            macd = ?set.macd,
            "calculated indicators"
        );

        set
    }

    pub fn calculate_series(&self, series: &PriceSeries) -> IndicatorSet {
        self.calculate(&series.closes())
    }
}

fn last(values: &[f64]) -> Option<f64> {
    values.last().copied().filter(|v| v.is_finite())
}
