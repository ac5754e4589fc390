//! Recurrent sequence regressors (LSTM and GRU).
//!
//! One recurrent layer reads a window of feature rows; a dense unit maps the
//! final hidden state to the next-day target. Training is full
//! backpropagation through time on mean-squared error with Adam.
//!
//! ```rust,no_run
//! use nextclose::domain::rnn::{RecurrentKind, TrainConfig, build_model};
//! # use nextclose::domain::{dataset::SequenceSet, error::ForecastError};
//! # fn demo(train: &SequenceSet) -> Result<(), ForecastError> {
//! let config = TrainConfig::default();
//! let mut model = build_model(RecurrentKind::Gru, train.num_features(), &config);
//! let report = model.fit(train, &config)?;
//! println!("stopped after {} epochs", report.epochs_run);
//! # Ok(())
//! # }
//! ```

pub mod gru;
pub mod lstm;
pub mod weights;

use crate::domain::dataset::SequenceSet;
use crate::domain::error::ForecastError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use weights::{Adam, Weights};

pub use gru::Gru;
pub use lstm::Lstm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecurrentKind {
    Lstm,
    Gru,
}

impl fmt::Display for RecurrentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrentKind::Lstm => write!(f, "LSTM"),
            RecurrentKind::Gru => write!(f, "GRU"),
        }
    }
}

impl FromStr for RecurrentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lstm" => Ok(RecurrentKind::Lstm),
            "gru" => Ok(RecurrentKind::Gru),
            other => Err(format!("unknown model '{}' (expected lstm or gru)", other)),
        }
    }
}

/// Hyperparameters for one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub window: usize,
    pub hidden_units: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub seed: u64,
    /// Global gradient-norm cap; 0 disables clipping.
    pub clip_norm: f64,
    /// Tail fraction of the training windows held out for early stopping;
    /// 0 trains on everything.
    pub validation_ratio: f64,
    /// Epochs without validation improvement before stopping; 0 never stops early.
    pub patience: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            window: 30,
            hidden_units: 32,
            batch_size: 32,
            learning_rate: 0.001,
            epochs: 50,
            seed: 42,
            clip_norm: 5.0,
            validation_ratio: 0.1,
            patience: 10,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        let invalid = |key: &str, reason: &str| ForecastError::ConfigInvalid {
            section: "model".into(),
            key: key.into(),
            reason: reason.into(),
        };
        if self.window == 0 {
            return Err(invalid("window", "window must be positive"));
        }
        if self.hidden_units == 0 {
            return Err(invalid("hidden_units", "hidden_units must be positive"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "batch_size must be positive"));
        }
        if self.epochs == 0 {
            return Err(invalid("epochs", "epochs must be positive"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(invalid("learning_rate", "learning_rate must be in (0, 1]"));
        }
        if !(self.clip_norm >= 0.0) {
            return Err(invalid("clip_norm", "clip_norm must be non-negative"));
        }
        if !(0.0..1.0).contains(&self.validation_ratio) {
            return Err(invalid("validation_ratio", "validation_ratio must be in [0, 1)"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    pub epochs_run: usize,
    pub train_loss: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub best_val_loss: Option<f64>,
    pub stopped_early: bool,
}

/// A recurrent cell: forward over one window, and backpropagation through
/// time given the gradient of the final hidden state.
pub trait RecurrentCell {
    type Step;
    const KIND: RecurrentKind;
    const GATES: usize;

    fn initialise(_weights: &mut Weights) {}

    fn forward(weights: &Weights, sequence: ArrayView2<f64>) -> (Array1<f64>, Vec<Self::Step>);

    /// Accumulates parameter gradients into `grads`.
    fn backward(
        weights: &Weights,
        sequence: ArrayView2<f64>,
        steps: &[Self::Step],
        dh_last: Array1<f64>,
        grads: &mut Weights,
    );
}

pub trait SequenceRegressor {
    fn kind(&self) -> RecurrentKind;

    /// Prediction for a single (window, features) sample.
    fn forward(&self, window: ArrayView2<f64>) -> f64;

    fn fit(
        &mut self,
        train: &SequenceSet,
        config: &TrainConfig,
    ) -> Result<TrainReport, ForecastError>;

    fn predict(&self, set: &SequenceSet) -> Vec<f64> {
        (0..set.len()).map(|i| self.forward(set.sample(i))).collect()
    }
}

pub struct RecurrentRegressor<C: RecurrentCell> {
    pub weights: Weights,
    cell: PhantomData<C>,
}

impl<C: RecurrentCell> RecurrentRegressor<C> {
    pub fn new(input: usize, hidden: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut weights = Weights::random(C::GATES, input, hidden, &mut rng);
        C::initialise(&mut weights);
        Self {
            weights,
            cell: PhantomData,
        }
    }

    /// Mean-squared error over `indices` and its gradient.
    pub fn batch_gradients(&self, set: &SequenceSet, indices: &[usize]) -> (f64, Weights) {
        let mut grads = self.weights.zeros_like();
        if indices.is_empty() {
            return (0.0, grads);
        }
        let scale = 1.0 / indices.len() as f64;
        let mut loss = 0.0;

        for &i in indices {
            let sequence = set.sample(i);
            let (h, steps) = C::forward(&self.weights, sequence);
            let prediction = self.weights.head_w.dot(&h) + self.weights.head_b[0];
            let err = prediction - set.y[i];
            loss += err * err * scale;

            let dy = 2.0 * err * scale;
            grads.head_w.scaled_add(dy, &h);
            grads.head_b[0] += dy;
            let dh = &self.weights.head_w * dy;
            C::backward(&self.weights, sequence, &steps, dh, &mut grads);
        }
        (loss, grads)
    }

    pub fn mse(&self, set: &SequenceSet) -> f64 {
        if set.is_empty() {
            return f64::NAN;
        }
        let sum: f64 = self
            .predict(set)
            .iter()
            .zip(&set.y)
            .map(|(p, y)| (p - y) * (p - y))
            .sum();
        sum / set.len() as f64
    }
}

impl<C: RecurrentCell> SequenceRegressor for RecurrentRegressor<C> {
    fn kind(&self) -> RecurrentKind {
        C::KIND
    }

    fn forward(&self, window: ArrayView2<f64>) -> f64 {
        let (h, _) = C::forward(&self.weights, window);
        self.weights.head_w.dot(&h) + self.weights.head_b[0]
    }

    fn fit(
        &mut self,
        train: &SequenceSet,
        config: &TrainConfig,
    ) -> Result<TrainReport, ForecastError> {
        config.validate()?;
        if train.is_empty() {
            return Err(ForecastError::InsufficientData {
                stage: format!("{} training", C::KIND),
                rows: 0,
                minimum: 1,
            });
        }
        if train.num_features() != self.weights.input() {
            return Err(ForecastError::LengthMismatch {
                what: format!("{} input features", C::KIND),
                expected: self.weights.input(),
                actual: train.num_features(),
            });
        }

        let (fit_set, val_set) = if config.validation_ratio > 0.0 {
            match train.chronological_split(1.0 - config.validation_ratio) {
                Ok((fit, val)) => (fit, Some(val)),
                Err(e) => {
                    log::warn!("{}: no validation split ({}), training on all windows", C::KIND, e);
                    (train.clone(), None)
                }
            }
        } else {
            (train.clone(), None)
        };

        log::debug!(
            "{}: {} parameters, {} fit windows",
            C::KIND,
            self.weights.parameter_count(),
            fit_set.len()
        );

        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
        let mut adam = Adam::new(config.learning_rate, &self.weights);
        let mut order: Vec<usize> = (0..fit_set.len()).collect();
        let mut report = TrainReport::default();
        let mut best: Option<(f64, Weights)> = None;
        let mut stale = 0usize;

        for epoch in 1..=config.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            for batch in order.chunks(config.batch_size) {
                let (loss, mut grads) = self.batch_gradients(&fit_set, batch);
                if !loss.is_finite() || !grads.is_finite() {
                    return Err(ForecastError::Model {
                        reason: format!("{} training diverged at epoch {}", C::KIND, epoch),
                    });
                }
                grads.clip_norm(config.clip_norm);
                adam.step(&mut self.weights, &grads);
                epoch_loss += loss * batch.len() as f64;
            }
            epoch_loss /= fit_set.len() as f64;
            report.train_loss.push(epoch_loss);
            report.epochs_run = epoch;

            let Some(val) = &val_set else {
                log::debug!("{} epoch {}: loss {:.6}", C::KIND, epoch, epoch_loss);
                continue;
            };

            let val_loss = self.mse(val);
            report.val_loss.push(val_loss);
            log::debug!(
                "{} epoch {}: loss {:.6}, val_loss {:.6}",
                C::KIND,
                epoch,
                epoch_loss,
                val_loss
            );

            match &best {
                Some((b, _)) if val_loss >= *b => stale += 1,
                _ => {
                    best = Some((val_loss, self.weights.clone()));
                    stale = 0;
                }
            }
            if config.patience > 0 && stale >= config.patience {
                log::info!(
                    "{}: early stop after epoch {} (no improvement for {} epochs)",
                    C::KIND,
                    epoch,
                    stale
                );
                report.stopped_early = true;
                break;
            }
        }

        if let Some((loss, weights)) = best {
            self.weights = weights;
            report.best_val_loss = Some(loss);
        }
        Ok(report)
    }
}

pub fn build_model(
    kind: RecurrentKind,
    input: usize,
    config: &TrainConfig,
) -> Box<dyn SequenceRegressor> {
    match kind {
        RecurrentKind::Lstm => Box::new(RecurrentRegressor::<Lstm>::new(
            input,
            config.hidden_units,
            config.seed,
        )),
        RecurrentKind::Gru => Box::new(RecurrentRegressor::<Gru>::new(
            input,
            config.hidden_units,
            config.seed,
        )),
    }
}

pub(crate) fn sigmoid(x: ArrayView1<f64>) -> Array1<f64> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

/// target += a ⊗ b
pub(crate) fn add_outer(target: &mut Array2<f64>, a: ArrayView1<f64>, b: ArrayView1<f64>) {
    Zip::indexed(target).for_each(|(i, j), t| *t += a[i] * b[j]);
}
