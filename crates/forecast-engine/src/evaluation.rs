use serde::Serialize;

use crate::rollout::StepModel;
use crate::scaler::MinMaxScaler;
use crate::window::{check_length, make_windows};
use crate::{ForecastError, Forecaster};

pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;

/// One-step-ahead accuracy on the chronologically last windows.
#[derive(Debug, Clone, Serialize)]
pub struct HoldoutReport {
    pub train_windows: usize,
    pub test_windows: usize,
    /// Price units
    pub rmse: f64,
    pub mae: f64,
    /// Share of test windows where the predicted move away from the last
    /// observed close has the same sign as the actual move.
    pub directional_accuracy: f64,
}

/// Fit on the first `train_fraction` of the windows and score single-step
/// predictions on the rest. The scaler still sees the whole series.
pub fn evaluate_holdout(
    forecaster: &Forecaster,
    closes: &[f64],
    train_fraction: f64,
) -> Result<HoldoutReport, ForecastError> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(ForecastError::InvalidConfig(format!(
            "train fraction must be in (0, 1), got {}",
            train_fraction
        )));
    }

    let lookback = forecaster.config().lookback;
    check_length(closes.len(), lookback)?;

    let scaler = MinMaxScaler::fit(closes)?;
    let windows = make_windows(&scaler.transform_all(closes), lookback);
    let split = ((windows.len() as f64) * train_fraction).floor() as usize;
    if split == 0 || split >= windows.len() {
        return Err(ForecastError::InsufficientData {
            needed: lookback + 2,
            got: closes.len(),
        });
    }

    let (train, test) = windows.split_at(split);
    let model = forecaster.fit_model(train)?;

    let mut sq_err = 0.0;
    let mut abs_err = 0.0;
    let mut hits = 0usize;
    for w in test {
        let predicted = scaler.inverse(model.predict_step(&w.input));
        let actual = scaler.inverse(w.target);
        let last = scaler.inverse(w.input[w.input.len() - 1]);

        let err = predicted - actual;
        sq_err += err * err;
        abs_err += err.abs();
        if (predicted - last).signum() == (actual - last).signum() {
            hits += 1;
        }
    }

    let n = test.len() as f64;
    let report = HoldoutReport {
        train_windows: train.len(),
        test_windows: test.len(),
        rmse: (sq_err / n).sqrt(),
        mae: abs_err / n,
        directional_accuracy: hits as f64 / n,
    };

    tracing::info!(
        strategy = %forecaster.config().strategy,
        rmse = report.rmse,
        mae = report.mae,
        directional_accuracy = report.directional_accuracy,
        "hold-out evaluation"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ForecastConfig, ForecastStrategy};

    fn config(strategy: ForecastStrategy) -> ForecastConfig {
        ForecastConfig {
            strategy,
            lookback: 5,
            ..ForecastConfig::default()
        }
    }

    #[test]
    fn test_holdout_split_sizes() {
        let closes: Vec<f64> = (0..55).map(|i| 100.0 + (i as f64 * 0.4).sin() * 5.0).collect();
        let forecaster = Forecaster::new(config(ForecastStrategy::Kernel));
        let report = evaluate_holdout(&forecaster, &closes, 0.8).unwrap();

        // 55 - 5 = 50 windows, 40 for training
        assert_eq!(report.train_windows, 40);
        assert_eq!(report.test_windows, 10);
        assert!(report.rmse >= report.mae);
        assert!((0.0..=1.0).contains(&report.directional_accuracy));
    }

    #[test]
    fn test_holdout_on_smooth_series_is_accurate() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + (i as f64 * 0.3).sin() * 10.0).collect();
        let forecaster = Forecaster::new(config(ForecastStrategy::Kernel));
        let report = evaluate_holdout(&forecaster, &closes, DEFAULT_TRAIN_FRACTION).unwrap();

        assert!(report.rmse < 1.0, "rmse {}", report.rmse);
    }

    #[test]
    fn test_holdout_rejects_bad_fraction() {
        let closes = vec![1.0; 40];
        let forecaster = Forecaster::new(config(ForecastStrategy::Forest));
        assert!(evaluate_holdout(&forecaster, &closes, 1.0).is_err());
        assert!(evaluate_holdout(&forecaster, &closes, 0.0).is_err());
    }
}
