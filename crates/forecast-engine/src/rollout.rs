use std::collections::VecDeque;

use crate::ForecastError;

/// A fitted model that maps one scaled window to the next scaled value.
pub trait StepModel: Send + Sync {
    fn predict_step(&self, window: &[f64]) -> f64;
}

impl<M: StepModel + ?Sized> StepModel for Box<M> {
    fn predict_step(&self, window: &[f64]) -> f64 {
        (**self).predict_step(window)
    }
}

/// Autoregressive rollout in scaled space. Each prediction is appended to the
/// window and the oldest value dropped before the next step.
pub fn rollout<M: StepModel + ?Sized>(
    model: &M,
    seed: &[f64],
    steps: usize,
) -> Result<Vec<f64>, ForecastError> {
    if seed.is_empty() {
        return Err(ForecastError::InvalidConfig(
            "rollout needs a non-empty seed window".to_string(),
        ));
    }

    let mut window: VecDeque<f64> = seed.iter().copied().collect();
    let mut path = Vec::with_capacity(steps);

    for step in 0..steps {
        let next = model.predict_step(window.make_contiguous());
        if !next.is_finite() {
            return Err(ForecastError::Training(format!(
                "model produced a non-finite value at step {}",
                step + 1
            )));
        }
        path.push(next);
        window.pop_front();
        window.push_back(next);
    }

    Ok(path)
}
