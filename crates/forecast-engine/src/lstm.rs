//! Two stacked LSTM layers with dropout, followed by Dense(25) and Dense(1),
//! trained by full backpropagation through time with Adam on MSE loss.
//!
//! Each LSTM layer keeps its four gates in one stacked matrix acting on the
//! concatenated `[x_t; h_{t-1}]` vector, rows ordered input, forget,
//! candidate, output.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::rollout::StepModel;
use crate::window::ScaledWindow;
use crate::ForecastError;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;

/// Training hyperparameters for the sequence model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmConfig {
    /// Units in each of the two LSTM layers
    pub hidden: usize,
    pub dense_units: usize,
    pub dropout: f64,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    /// Epochs without a loss improvement before training stops
    pub patience: usize,
    pub seed: u64,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            hidden: 50,
            dense_units: 25,
            dropout: 0.2,
            learning_rate: 0.001,
            batch_size: 32,
            epochs: 20,
            patience: 10,
            seed: 42,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn glorot(rows: usize, cols: usize, fan_in: usize, fan_out: usize, rng: &mut StdRng) -> DMatrix<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    DMatrix::from_fn(rows, cols, |_, _| rng.gen_range(-limit..limit))
}

/// Inverted dropout: kept units are scaled by `1 / (1 - rate)`. Without an RNG
/// (inference) the mask is all ones.
fn dropout_mask(len: usize, rate: f64, rng: Option<&mut StdRng>) -> DVector<f64> {
    match rng {
        Some(rng) if rate > 0.0 => {
            let keep = 1.0 - rate;
            DVector::from_fn(len, |_, _| if rng.gen::<f64>() < keep { 1.0 / keep } else { 0.0 })
        }
        _ => DVector::from_element(len, 1.0),
    }
}

#[derive(Debug, Clone)]
struct LstmLayer {
    input: usize,
    hidden: usize,
    /// 4H x (I + H)
    w: DMatrix<f64>,
    /// 4H
    b: DVector<f64>,
}

/// Activations kept from the forward pass for one time step.
struct StepCache {
    xh: DVector<f64>,
    i: DVector<f64>,
    f: DVector<f64>,
    g: DVector<f64>,
    o: DVector<f64>,
    c_prev: DVector<f64>,
    tanh_c: DVector<f64>,
}

impl LstmLayer {
    fn new(input: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let w = glorot(4 * hidden, input + hidden, input + hidden, 4 * hidden, rng);
        let mut b = DVector::<f64>::zeros(4 * hidden);
        // forget gate starts open
        b.rows_mut(hidden, hidden).fill(1.0);
        Self { input, hidden, w, b }
    }

    fn zeros_like(&self) -> Self {
        Self {
            input: self.input,
            hidden: self.hidden,
            w: DMatrix::zeros(self.w.nrows(), self.w.ncols()),
            b: DVector::zeros(self.b.len()),
        }
    }

    fn forward(&self, inputs: &[DVector<f64>]) -> (Vec<DVector<f64>>, Vec<StepCache>) {
        let hn = self.hidden;
        let mut h = DVector::<f64>::zeros(hn);
        let mut c = DVector::<f64>::zeros(hn);
        let mut outputs = Vec::with_capacity(inputs.len());
        let mut caches = Vec::with_capacity(inputs.len());

        for x in inputs {
            let mut xh = DVector::<f64>::zeros(self.input + hn);
            xh.rows_mut(0, self.input).copy_from(x);
            xh.rows_mut(self.input, hn).copy_from(&h);

            let z = &self.w * &xh + &self.b;
            let i = z.rows(0, hn).map(sigmoid);
            let f = z.rows(hn, hn).map(sigmoid);
            let g = z.rows(2 * hn, hn).map(f64::tanh);
            let o = z.rows(3 * hn, hn).map(sigmoid);

            let c_prev = c;
            c = f.component_mul(&c_prev) + i.component_mul(&g);
            let tanh_c = c.map(f64::tanh);
            h = o.component_mul(&tanh_c);

            outputs.push(h.clone());
            caches.push(StepCache { xh, i, f, g, o, c_prev, tanh_c });
        }

        (outputs, caches)
    }

    /// Backpropagate `dh_out` (the loss gradient w.r.t. each step's output)
    /// through time, accumulating into `grads`. Returns the gradient w.r.t.
    /// each step's input.
    fn backward(
        &self,
        caches: &[StepCache],
        dh_out: &[DVector<f64>],
        grads: &mut LstmLayer,
    ) -> Vec<DVector<f64>> {
        let hn = self.hidden;
        let mut dh_next = DVector::<f64>::zeros(hn);
        let mut dc_next = DVector::<f64>::zeros(hn);
        let mut dx = vec![DVector::<f64>::zeros(self.input); caches.len()];

        for t in (0..caches.len()).rev() {
            let s = &caches[t];
            let dh = &dh_out[t] + &dh_next;

            let d_o = dh.component_mul(&s.tanh_c);
            let dc = &dc_next
                + dh.component_mul(&s.o)
                    .component_mul(&s.tanh_c.map(|v| 1.0 - v * v));
            let d_i = dc.component_mul(&s.g);
            let d_g = dc.component_mul(&s.i);
            let d_f = dc.component_mul(&s.c_prev);
            dc_next = dc.component_mul(&s.f);

            let mut dz = DVector::<f64>::zeros(4 * hn);
            dz.rows_mut(0, hn)
                .copy_from(&d_i.component_mul(&s.i.map(|v| v * (1.0 - v))));
            dz.rows_mut(hn, hn)
                .copy_from(&d_f.component_mul(&s.f.map(|v| v * (1.0 - v))));
            dz.rows_mut(2 * hn, hn)
                .copy_from(&d_g.component_mul(&s.g.map(|v| 1.0 - v * v)));
            dz.rows_mut(3 * hn, hn)
                .copy_from(&d_o.component_mul(&s.o.map(|v| v * (1.0 - v))));

            grads.w.ger(1.0, &dz, &s.xh, 1.0);
            grads.b += &dz;

            let dxh = self.w.tr_mul(&dz);
            dx[t] = dxh.rows(0, self.input).into_owned();
            dh_next = dxh.rows(self.input, hn).into_owned();
        }

        dx
    }
}

#[derive(Debug, Clone)]
struct DenseLayer {
    w: DMatrix<f64>,
    b: DVector<f64>,
}

impl DenseLayer {
    fn new(input: usize, output: usize, rng: &mut StdRng) -> Self {
        Self {
            w: glorot(output, input, input, output, rng),
            b: DVector::zeros(output),
        }
    }

    fn zeros_like(&self) -> Self {
        Self {
            w: DMatrix::zeros(self.w.nrows(), self.w.ncols()),
            b: DVector::zeros(self.b.len()),
        }
    }

    fn forward(&self, x: &DVector<f64>) -> DVector<f64> {
        &self.w * x + &self.b
    }
}

struct ForwardCache {
    lstm1: Vec<StepCache>,
    mask1: Vec<DVector<f64>>,
    lstm2: Vec<StepCache>,
    mask2: DVector<f64>,
    /// Last hidden state of layer 2 after dropout
    last: DVector<f64>,
    /// Dense(25) output
    dense: DVector<f64>,
}

/// The network doubles as its own gradient accumulator (see `zeros_like`).
#[derive(Debug, Clone)]
struct Network {
    lstm1: LstmLayer,
    lstm2: LstmLayer,
    dense1: DenseLayer,
    dense2: DenseLayer,
}

impl Network {
    fn new(hidden: usize, dense_units: usize, rng: &mut StdRng) -> Self {
        Self {
            lstm1: LstmLayer::new(1, hidden, rng),
            lstm2: LstmLayer::new(hidden, hidden, rng),
            dense1: DenseLayer::new(hidden, dense_units, rng),
            dense2: DenseLayer::new(dense_units, 1, rng),
        }
    }

    fn zeros_like(&self) -> Self {
        Self {
            lstm1: self.lstm1.zeros_like(),
            lstm2: self.lstm2.zeros_like(),
            dense1: self.dense1.zeros_like(),
            dense2: self.dense2.zeros_like(),
        }
    }

    fn fill_zero(&mut self) {
        for p in self.params_mut() {
            p.fill(0.0);
        }
    }

    fn params(&self) -> [&[f64]; 8] {
        [
            self.lstm1.w.as_slice(),
            self.lstm1.b.as_slice(),
            self.lstm2.w.as_slice(),
            self.lstm2.b.as_slice(),
            self.dense1.w.as_slice(),
            self.dense1.b.as_slice(),
            self.dense2.w.as_slice(),
            self.dense2.b.as_slice(),
        ]
    }

    fn params_mut(&mut self) -> [&mut [f64]; 8] {
        [
            self.lstm1.w.as_mut_slice(),
            self.lstm1.b.as_mut_slice(),
            self.lstm2.w.as_mut_slice(),
            self.lstm2.b.as_mut_slice(),
            self.dense1.w.as_mut_slice(),
            self.dense1.b.as_mut_slice(),
            self.dense2.w.as_mut_slice(),
            self.dense2.b.as_mut_slice(),
        ]
    }

    /// Forward pass over one window. Dropout is applied only when `rng` is given.
    fn forward(&self, window: &[f64], dropout: f64, mut rng: Option<&mut StdRng>) -> (f64, ForwardCache) {
        let hidden = self.lstm1.hidden;
        let inputs: Vec<DVector<f64>> = window
            .iter()
            .map(|&x| DVector::from_element(1, x))
            .collect();

        let (h1, lstm1) = self.lstm1.forward(&inputs);
        let mask1: Vec<DVector<f64>> = h1
            .iter()
            .map(|_| dropout_mask(hidden, dropout, rng.as_deref_mut()))
            .collect();
        let dropped: Vec<DVector<f64>> = h1
            .iter()
            .zip(&mask1)
            .map(|(h, m)| h.component_mul(m))
            .collect();

        let (h2, lstm2) = self.lstm2.forward(&dropped);
        let mask2 = dropout_mask(hidden, dropout, rng.as_deref_mut());
        let last = h2
            .last()
            .map(|h| h.component_mul(&mask2))
            .unwrap_or_else(|| DVector::zeros(hidden));

        let dense = self.dense1.forward(&last);
        let y = self.dense2.forward(&dense)[0];

        let cache = ForwardCache {
            lstm1,
            mask1,
            lstm2,
            mask2,
            last,
            dense,
        };
        (y, cache)
    }

    /// Accumulate parameter gradients for one sample given `dy = dL/dy`.
    fn backward(&self, cache: &ForwardCache, dy: f64, grads: &mut Network) {
        let steps = cache.lstm2.len();
        if steps == 0 {
            return;
        }

        let dy = DVector::from_element(1, dy);
        grads.dense2.w.ger(1.0, &dy, &cache.dense, 1.0);
        grads.dense2.b += &dy;
        let d_dense = self.dense2.w.tr_mul(&dy);

        grads.dense1.w.ger(1.0, &d_dense, &cache.last, 1.0);
        grads.dense1.b += &d_dense;
        let d_last = self.dense1.w.tr_mul(&d_dense);

        let hidden = self.lstm2.hidden;
        let mut dh2 = vec![DVector::<f64>::zeros(hidden); steps];
        dh2[steps - 1] = d_last.component_mul(&cache.mask2);
        let dx2 = self.lstm2.backward(&cache.lstm2, &dh2, &mut grads.lstm2);

        let dh1: Vec<DVector<f64>> = dx2
            .iter()
            .zip(&cache.mask1)
            .map(|(d, m)| d.component_mul(m))
            .collect();
        self.lstm1.backward(&cache.lstm1, &dh1, &mut grads.lstm1);
    }
}

struct Adam {
    learning_rate: f64,
    t: i32,
    m: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
}

impl Adam {
    fn new(learning_rate: f64, net: &Network) -> Self {
        let shapes: Vec<usize> = net.params().iter().map(|p| p.len()).collect();
        Self {
            learning_rate,
            t: 0,
            m: shapes.iter().map(|&n| vec![0.0; n]).collect(),
            v: shapes.iter().map(|&n| vec![0.0; n]).collect(),
        }
    }

    fn step(&mut self, params: [&mut [f64]; 8], grads: [&[f64]; 8]) {
        self.t += 1;
        let bias1 = 1.0 - ADAM_BETA1.powi(self.t);
        let bias2 = 1.0 - ADAM_BETA2.powi(self.t);
        let lr = self.learning_rate * bias2.sqrt() / bias1;

        for (k, (param, grad)) in params.into_iter().zip(grads).enumerate() {
            let m = &mut self.m[k];
            let v = &mut self.v[k];
            for j in 0..param.len() {
                m[j] = ADAM_BETA1 * m[j] + (1.0 - ADAM_BETA1) * grad[j];
                v[j] = ADAM_BETA2 * v[j] + (1.0 - ADAM_BETA2) * grad[j] * grad[j];
                param[j] -= lr * m[j] / (v[j].sqrt() + ADAM_EPSILON);
            }
        }
    }
}

/// Trained sequence model. Holds the weights from the epoch with the lowest
/// training loss.
#[derive(Debug, Clone)]
pub struct SequenceModel {
    net: Network,
    loss_history: Vec<f64>,
    best_loss: f64,
}

impl SequenceModel {
    pub fn fit(windows: &[ScaledWindow], config: &LstmConfig) -> Result<Self, ForecastError> {
        if windows.is_empty() {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }
        if config.hidden == 0 || config.dense_units == 0 || !(0.0..1.0).contains(&config.dropout) {
            return Err(ForecastError::InvalidConfig(format!(
                "invalid sequence model shape: hidden={} dense={} dropout={}",
                config.hidden, config.dense_units, config.dropout
            )));
        }
        if config.epochs == 0 {
            return Err(ForecastError::InvalidConfig(
                "sequence model needs at least one training epoch".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut net = Network::new(config.hidden, config.dense_units, &mut rng);
        let mut grads = net.zeros_like();
        let mut adam = Adam::new(config.learning_rate, &net);
        let mut order: Vec<usize> = (0..windows.len()).collect();

        let mut best: Option<(f64, Network)> = None;
        let mut history = Vec::with_capacity(config.epochs);
        let mut stalled = 0;

        for epoch in 0..config.epochs {
            order.shuffle(&mut rng);
            let mut total = 0.0;

            for batch in order.chunks(config.batch_size.max(1)) {
                grads.fill_zero();
                let scale = 2.0 / batch.len() as f64;
                for &idx in batch {
                    let sample = &windows[idx];
                    let (pred, cache) = net.forward(&sample.input, config.dropout, Some(&mut rng));
                    let err = pred - sample.target;
                    total += err * err;
                    net.backward(&cache, scale * err, &mut grads);
                }
                adam.step(net.params_mut(), grads.params());
            }

            let loss = total / windows.len() as f64;
            if !loss.is_finite() {
                return Err(ForecastError::Training(format!(
                    "loss diverged at epoch {}",
                    epoch + 1
                )));
            }
            history.push(loss);

            let improved = best.as_ref().map_or(true, |(best_loss, _)| loss < *best_loss);
            if improved {
                best = Some((loss, net.clone()));
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= config.patience {
                    tracing::debug!(epoch = epoch + 1, "early stopping, loss plateaued");
                    break;
                }
            }
        }

        let Some((best_loss, net)) = best else {
            return Err(ForecastError::Training("no training epoch completed".to_string()));
        };
        tracing::debug!(
            windows = windows.len(),
            epochs = history.len(),
            best_loss,
            "trained sequence model"
        );

        Ok(Self {
            net,
            loss_history: history,
            best_loss,
        })
    }

    /// Mean training loss per completed epoch.
    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }
}

impl StepModel for SequenceModel {
    fn predict_step(&self, window: &[f64]) -> f64 {
        self.net.forward(window, 0.0, None).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::make_windows;

    fn small_config() -> LstmConfig {
        LstmConfig {
            hidden: 6,
            dense_units: 4,
            epochs: 30,
            learning_rate: 0.01,
            batch_size: 8,
            ..LstmConfig::default()
        }
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 0.5 + 0.4 * (i as f64 * 0.3).sin()).collect()
    }

    fn sample_loss(net: &Network, window: &[f64], target: f64) -> f64 {
        let (y, _) = net.forward(window, 0.0, None);
        (y - target).powi(2)
    }

    #[test]
    fn test_backprop_matches_numerical_gradient() {
        let mut rng = StdRng::seed_from_u64(7);
        let net = Network::new(3, 2, &mut rng);
        let window = [0.1, 0.7, 0.3, 0.9];
        let target = 0.4;

        let (y, cache) = net.forward(&window, 0.0, None);
        let mut grads = net.zeros_like();
        net.backward(&cache, 2.0 * (y - target), &mut grads);
        let analytic: Vec<Vec<f64>> = grads.params().iter().map(|p| p.to_vec()).collect();

        let eps = 1e-6;
        for (k, tensor) in analytic.iter().enumerate() {
            for j in 0..tensor.len() {
                let mut plus = net.clone();
                plus.params_mut()[k][j] += eps;
                let mut minus = net.clone();
                minus.params_mut()[k][j] -= eps;

                let numeric = (sample_loss(&plus, &window, target)
                    - sample_loss(&minus, &window, target))
                    / (2.0 * eps);
                let diff = (numeric - tensor[j]).abs();
                assert!(
                    diff <= 1e-6 * (1.0 + numeric.abs() + tensor[j].abs()),
                    "tensor {} index {}: analytic {} numeric {}",
                    k,
                    j,
                    tensor[j],
                    numeric
                );
            }
        }
    }

    #[test]
    fn test_flat_zero_series_predicts_zero() {
        // all-zero inputs keep every hidden state at zero, so the output is the
        // zero-initialised dense bias and the gradients vanish
        let windows = make_windows(&vec![0.0; 40], 10);
        let model = SequenceModel::fit(&windows, &small_config()).unwrap();

        assert_eq!(model.predict_step(&[0.0; 10]), 0.0);
        assert!(model.best_loss() == 0.0);
    }

    #[test]
    fn test_training_reduces_loss() {
        let windows = make_windows(&wave(80), 10);
        let model = SequenceModel::fit(&windows, &small_config()).unwrap();

        let history = model.loss_history();
        assert!(!history.is_empty());
        assert!(model.best_loss() < history[0]);
        assert!(model.predict_step(&windows[0].input).is_finite());
    }

    #[test]
    fn test_fit_is_deterministic_for_a_seed() {
        let windows = make_windows(&wave(40), 8);
        let config = LstmConfig {
            epochs: 3,
            ..small_config()
        };
        let a = SequenceModel::fit(&windows, &config).unwrap();
        let b = SequenceModel::fit(&windows, &config).unwrap();

        assert_eq!(a.predict_step(&windows[3].input), b.predict_step(&windows[3].input));
    }

    #[test]
    fn test_early_stopping_respects_patience() {
        let windows = make_windows(&vec![0.0; 30], 5);
        let config = LstmConfig {
            epochs: 50,
            patience: 3,
            ..small_config()
        };
        let model = SequenceModel::fit(&windows, &config).unwrap();

        // loss is exactly 0 from the first epoch and never improves on it
        assert_eq!(model.loss_history().len(), 4);
    }

    #[test]
    fn test_rejects_empty_and_bad_config() {
        assert!(SequenceModel::fit(&[], &LstmConfig::default()).is_err());

        let windows = make_windows(&wave(30), 5);
        let config = LstmConfig {
            dropout: 1.0,
            ..small_config()
        };
        assert!(matches!(
            SequenceModel::fit(&windows, &config),
            Err(ForecastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_epochs_is_rejected() {
        let windows = make_windows(&wave(60), 10);
        let config = LstmConfig {
            epochs: 0,
            ..small_config()
        };
        assert!(matches!(
            SequenceModel::fit(&windows, &config),
            Err(ForecastError::InvalidConfig(_))
        ));
    }
}
