//! Regressors over flattened windows: an RBF kernel ridge regression and a
//! bagged regression forest.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::statistics::Statistics;

use crate::rollout::StepModel;
use crate::window::ScaledWindow;
use crate::ForecastError;

pub const KERNEL_C: f64 = 100.0;
pub const FOREST_TREES: usize = 100;
pub const FOREST_SEED: u64 = 42;

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// RBF kernel ridge regression. `gamma` follows the "scale" heuristic
/// `1 / (n_features * var(X))` and the ridge penalty is `1 / C`.
#[derive(Debug, Clone)]
pub struct KernelRidge {
    support: Vec<Vec<f64>>,
    dual: DVector<f64>,
    gamma: f64,
    intercept: f64,
}

impl KernelRidge {
    pub fn fit(windows: &[ScaledWindow], c: f64) -> Result<Self, ForecastError> {
        if windows.is_empty() {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }
        if c <= 0.0 {
            return Err(ForecastError::InvalidConfig(format!(
                "regularisation C must be positive, got {}",
                c
            )));
        }

        let n = windows.len();
        let features = windows[0].input.len();
        let variance = windows
            .iter()
            .flat_map(|w| w.input.iter())
            .population_variance();
        let gamma = if variance > 0.0 && variance.is_finite() {
            1.0 / (features as f64 * variance)
        } else {
            1.0
        };

        let intercept = windows.iter().map(|w| w.target).mean();

        let mut kernel = DMatrix::from_fn(n, n, |i, j| {
            (-gamma * squared_distance(&windows[i].input, &windows[j].input)).exp()
        });
        for i in 0..n {
            kernel[(i, i)] += 1.0 / c;
        }
        let targets = DVector::from_iterator(n, windows.iter().map(|w| w.target - intercept));

        let dual = kernel
            .cholesky()
            .ok_or_else(|| {
                ForecastError::Training("kernel matrix is not positive definite".to_string())
            })?
            .solve(&targets);

        Ok(Self {
            support: windows.iter().map(|w| w.input.clone()).collect(),
            dual,
            gamma,
            intercept,
        })
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl StepModel for KernelRidge {
    fn predict_step(&self, window: &[f64]) -> f64 {
        self.intercept
            + self
                .support
                .iter()
                .zip(self.dual.iter())
                .map(|(s, a)| a * (-self.gamma * squared_distance(s, window)).exp())
                .sum::<f64>()
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, x: &[f64]) -> f64 {
        match self {
            Node::Leaf(value) => *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if x[*feature] <= *threshold {
                    left.predict(x)
                } else {
                    right.predict(x)
                }
            }
        }
    }
}

/// Fully grown regression tree with variance-reduction splits over all features.
fn grow(windows: &[ScaledWindow], indices: &mut [usize]) -> Node {
    let n = indices.len();
    let sum: f64 = indices.iter().map(|&i| windows[i].target).sum();
    let mean = sum / n as f64;

    if n < 2 || indices.iter().all(|&i| windows[i].target == windows[indices[0]].target) {
        return Node::Leaf(mean);
    }

    let sq_sum: f64 = indices.iter().map(|&i| windows[i].target.powi(2)).sum();
    let parent_sse = sq_sum - sum * sum / n as f64;

    // (sse, feature, threshold)
    let mut best: Option<(f64, usize, f64)> = None;
    let features = windows[indices[0]].input.len();

    for feature in 0..features {
        indices.sort_by(|&a, &b| windows[a].input[feature].total_cmp(&windows[b].input[feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..n - 1 {
            let y = windows[indices[k]].target;
            left_sum += y;
            left_sq += y * y;

            let here = windows[indices[k]].input[feature];
            let next = windows[indices[k + 1]].input[feature];
            if here == next {
                continue;
            }

            let nl = (k + 1) as f64;
            let nr = (n - k - 1) as f64;
            let right_sum = sum - left_sum;
            let right_sq = sq_sum - left_sq;
            let sse = (left_sq - left_sum * left_sum / nl) + (right_sq - right_sum * right_sum / nr);

            if best.map_or(true, |(b, _, _)| sse < b) {
                best = Some((sse, feature, (here + next) / 2.0));
            }
        }
    }

    let Some((sse, feature, threshold)) = best else {
        return Node::Leaf(mean);
    };
    if sse >= parent_sse {
        return Node::Leaf(mean);
    }

    let split = partition(windows, indices, feature, threshold);
    let (left, right) = indices.split_at_mut(split);
    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(windows, left)),
        right: Box::new(grow(windows, right)),
    }
}

/// Reorder so that samples with `x[feature] <= threshold` come first.
fn partition(windows: &[ScaledWindow], indices: &mut [usize], feature: usize, threshold: f64) -> usize {
    indices.sort_by(|&a, &b| windows[a].input[feature].total_cmp(&windows[b].input[feature]));
    indices
        .iter()
        .position(|&i| windows[i].input[feature] > threshold)
        .unwrap_or(indices.len())
}

/// Bagged forest of fully grown regression trees. Predictions are the mean
/// over trees.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<Node>,
}

impl RandomForest {
    pub fn fit(windows: &[ScaledWindow], n_trees: usize, seed: u64) -> Result<Self, ForecastError> {
        if windows.is_empty() {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }
        if n_trees == 0 {
            return Err(ForecastError::InvalidConfig(
                "forest needs at least one tree".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let n = windows.len();
        let trees = (0..n_trees)
            .map(|_| {
                let mut sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                grow(windows, &mut sample)
            })
            .collect();

        tracing::debug!(trees = n_trees, windows = n, "fitted regression forest");
        Ok(Self { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl StepModel for RandomForest {
    fn predict_step(&self, window: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict(window)).sum::<f64>() / self.trees.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::make_windows;

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 0.5 + 0.4 * (i as f64 * 0.25).sin()).collect()
    }

    #[test]
    fn test_kernel_ridge_fits_training_windows() {
        let windows = make_windows(&wave(60), 5);
        let model = KernelRidge::fit(&windows, KERNEL_C).unwrap();

        assert!(model.gamma() > 0.0);
        let mse = windows
            .iter()
            .map(|w| (model.predict_step(&w.input) - w.target).powi(2))
            .sum::<f64>()
            / windows.len() as f64;
        assert!(mse < 1e-3, "training mse {}", mse);
    }

    #[test]
    fn test_kernel_ridge_flat_series() {
        let windows = make_windows(&vec![0.0; 30], 5);
        let model = KernelRidge::fit(&windows, KERNEL_C).unwrap();

        assert_eq!(model.gamma(), 1.0);
        assert!(model.predict_step(&[0.0; 5]).abs() < 1e-12);
    }

    #[test]
    fn test_tree_separates_two_levels() {
        let windows: Vec<ScaledWindow> = (0..10)
            .map(|i| ScaledWindow {
                input: vec![i as f64],
                target: if i < 5 { 1.0 } else { 3.0 },
            })
            .collect();
        let mut indices: Vec<usize> = (0..10).collect();
        let tree = grow(&windows, &mut indices);

        assert_eq!(tree.predict(&[2.0]), 1.0);
        assert_eq!(tree.predict(&[7.0]), 3.0);
        // threshold sits halfway between 4 and 5, inclusive on the left
        assert_eq!(tree.predict(&[4.5]), 1.0);
        assert_eq!(tree.predict(&[4.6]), 3.0);
    }

    #[test]
    fn test_forest_predictions_stay_within_target_range() {
        let windows = make_windows(&wave(50), 4);
        let forest = RandomForest::fit(&windows, 20, FOREST_SEED).unwrap();
        let lo = windows.iter().map(|w| w.target).fold(f64::INFINITY, f64::min);
        let hi = windows.iter().map(|w| w.target).fold(f64::NEG_INFINITY, f64::max);

        assert_eq!(forest.n_trees(), 20);
        for probe in [[0.0; 4], [1.0; 4], [0.5, 0.6, 0.7, 0.8]] {
            let p = forest.predict_step(&probe);
            assert!(p >= lo - 1e-12 && p <= hi + 1e-12);
        }
    }

    #[test]
    fn test_forest_is_reproducible() {
        let windows = make_windows(&wave(40), 4);
        let a = RandomForest::fit(&windows, 10, FOREST_SEED).unwrap();
        let b = RandomForest::fit(&windows, 10, FOREST_SEED).unwrap();
        let probe = &windows[7].input;

        assert_eq!(a.predict_step(probe), b.predict_step(probe));
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(KernelRidge::fit(&[], KERNEL_C).is_err());
        assert!(RandomForest::fit(&[], 10, 1).is_err());
    }
}
