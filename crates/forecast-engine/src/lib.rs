//! Per-request price forecasting: min-max scale a close series, window it,
//! fit a fresh model and roll it forward autoregressively.

use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod classical;
pub mod evaluation;
pub mod lstm;
pub mod rollout;
pub mod scaler;
pub mod window;

pub use classical::{KernelRidge, RandomForest};
pub use evaluation::{evaluate_holdout, HoldoutReport};
pub use lstm::{LstmConfig, SequenceModel};
pub use rollout::{rollout, StepModel};
pub use scaler::MinMaxScaler;
pub use window::{check_length, make_windows, ScaledWindow, MIN_MARGIN};

/// Lower bound on any forecast step, as a fraction of the current price.
pub const PRICE_FLOOR_RATIO: f64 = 0.5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Insufficient data: need at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Invalid forecast configuration: {0}")]
    InvalidConfig(String),

    #[error("Model training failed: {0}")]
    Training(String),
}

impl From<ForecastError> for AnalysisError {
    fn from(err: ForecastError) -> Self {
        match err {
            ForecastError::InsufficientData { .. } => AnalysisError::InsufficientData(err.to_string()),
            ForecastError::InvalidConfig(msg) => AnalysisError::InvalidInput(msg),
            ForecastError::Training(msg) => AnalysisError::ModelError(msg),
        }
    }
}

/// Which model family is fit for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastStrategy {
    /// Stacked LSTM
    #[default]
    Sequence,
    /// RBF kernel ridge
    Kernel,
    /// Regression forest
    Forest,
}

impl ForecastStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastStrategy::Sequence => "sequence",
            ForecastStrategy::Kernel => "kernel",
            ForecastStrategy::Forest => "forest",
        }
    }

    /// Short model name carried on prediction records.
    pub fn model_name(&self) -> &'static str {
        match self {
            ForecastStrategy::Sequence => "LSTM",
            ForecastStrategy::Kernel => "KernelRidge",
            ForecastStrategy::Forest => "RandomForest",
        }
    }

    /// Label used in the prediction factor list.
    pub fn factor_label(&self) -> &'static str {
        match self {
            ForecastStrategy::Sequence => "LSTM price prediction model",
            ForecastStrategy::Kernel => "Kernel regression price prediction model",
            ForecastStrategy::Forest => "Random forest price prediction model",
        }
    }
}

impl fmt::Display for ForecastStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastStrategy {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequence" | "lstm" => Ok(ForecastStrategy::Sequence),
            "kernel" | "svr" => Ok(ForecastStrategy::Kernel),
            "forest" | "random_forest" | "rf" => Ok(ForecastStrategy::Forest),
            other => Err(ForecastError::InvalidConfig(format!(
                "Unknown forecast strategy: {} (use sequence, kernel, forest)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub strategy: ForecastStrategy,
    pub lookback: usize,
    pub sequence: LstmConfig,
    pub kernel_c: f64,
    pub forest_trees: usize,
    pub forest_seed: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            strategy: ForecastStrategy::Sequence,
            lookback: 20,
            sequence: LstmConfig::default(),
            kernel_c: classical::KERNEL_C,
            forest_trees: classical::FOREST_TREES,
            forest_seed: classical::FOREST_SEED,
        }
    }
}

impl ForecastConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.sequence.epochs = epochs;
        self
    }
}

/// Result of one forecast. `path[k]` is the price `k + 1` steps ahead.
#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub strategy: ForecastStrategy,
    pub current_price: f64,
    pub path: Vec<f64>,
    pub scaler: MinMaxScaler,
    pub training_windows: usize,
}

impl Forecast {
    /// Price at the end of the horizon.
    pub fn final_price(&self) -> f64 {
        self.path.last().copied().unwrap_or(self.current_price)
    }
}

/// Fits a fresh model for every call; nothing is kept between forecasts.
#[derive(Debug, Clone, Default)]
pub struct Forecaster {
    config: ForecastConfig,
}

impl Forecaster {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Forecast `steps` prices past the last close. Blocking and CPU-bound.
    pub fn forecast(&self, closes: &[f64], steps: usize) -> Result<Forecast, ForecastError> {
        if steps == 0 {
            return Err(ForecastError::InvalidConfig(
                "forecast horizon must be at least one step".to_string(),
            ));
        }
        let lookback = self.config.lookback;
        check_length(closes.len(), lookback)?;

        let scaler = MinMaxScaler::fit(closes)?;
        let scaled = scaler.transform_all(closes);
        let windows = make_windows(&scaled, lookback);

        let model = self.fit_model(&windows)?;
        let seed = &scaled[scaled.len() - lookback..];
        let scaled_path = rollout(model.as_ref(), seed, steps)?;

        let current_price = closes[closes.len() - 1];
        let path = to_prices(&scaler, &scaled_path, current_price);

        tracing::debug!(
            strategy = %self.config.strategy,
            windows = windows.len(),
            steps,
            current_price,
            final_price = path.last().copied().unwrap_or(current_price),
            "forecast complete"
        );

        Ok(Forecast {
            strategy: self.config.strategy,
            current_price,
            path,
            scaler,
            training_windows: windows.len(),
        })
    }

    pub(crate) fn fit_model(&self, windows: &[ScaledWindow]) -> Result<Box<dyn StepModel>, ForecastError> {
        let model: Box<dyn StepModel> = match self.config.strategy {
            ForecastStrategy::Sequence => Box::new(SequenceModel::fit(windows, &self.config.sequence)?),
            ForecastStrategy::Kernel => Box::new(KernelRidge::fit(windows, self.config.kernel_c)?),
            ForecastStrategy::Forest => Box::new(RandomForest::fit(
                windows,
                self.config.forest_trees,
                self.config.forest_seed,
            )?),
        };
        Ok(model)
    }
}

/// Inverse-scale a rolled-out path, flooring each step at half the current price.
fn to_prices(scaler: &MinMaxScaler, scaled_path: &[f64], current_price: f64) -> Vec<f64> {
    let floor = current_price * PRICE_FLOOR_RATIO;
    scaled_path
        .iter()
        .map(|&s| scaler.inverse(s).max(floor))
        .collect()
}
