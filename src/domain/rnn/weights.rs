//! Parameter storage shared by the recurrent cells, plus the Adam optimizer.
//!
//! Gate weights are stacked row-wise: `w` is (gates·H, I), `u` is (gates·H, H)
//! and `b` is (gates·H). The dense head reads the final hidden state.

use ndarray::{Array1, Array2, ArrayViewD, ArrayViewMutD, Zip};
use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    pub w: Array2<f64>,
    pub u: Array2<f64>,
    pub b: Array1<f64>,
    pub head_w: Array1<f64>,
    pub head_b: Array1<f64>,
}

impl Weights {
    pub fn zeros(gates: usize, input: usize, hidden: usize) -> Self {
        Self {
            w: Array2::zeros((gates * hidden, input)),
            u: Array2::zeros((gates * hidden, hidden)),
            b: Array1::zeros(gates * hidden),
            head_w: Array1::zeros(hidden),
            head_b: Array1::zeros(1),
        }
    }

    /// Uniform(-1/sqrt(H), 1/sqrt(H)) for every matrix; biases start at zero.
    pub fn random<R: Rng>(gates: usize, input: usize, hidden: usize, rng: &mut R) -> Self {
        let limit = 1.0 / (hidden.max(1) as f64).sqrt();
        let mut draw = || rng.gen_range(-limit..limit);
        Self {
            w: Array2::from_shape_fn((gates * hidden, input), |_| draw()),
            u: Array2::from_shape_fn((gates * hidden, hidden), |_| draw()),
            b: Array1::zeros(gates * hidden),
            head_w: Array1::from_shape_fn(hidden, |_| draw()),
            head_b: Array1::zeros(1),
        }
    }

    pub fn zeros_like(&self) -> Self {
        Self {
            w: Array2::zeros(self.w.raw_dim()),
            u: Array2::zeros(self.u.raw_dim()),
            b: Array1::zeros(self.b.raw_dim()),
            head_w: Array1::zeros(self.head_w.raw_dim()),
            head_b: Array1::zeros(1),
        }
    }

    pub fn hidden(&self) -> usize {
        self.head_w.len()
    }

    pub fn input(&self) -> usize {
        self.w.ncols()
    }

    pub fn views(&self) -> [ArrayViewD<'_, f64>; 5] {
        [
            self.w.view().into_dyn(),
            self.u.view().into_dyn(),
            self.b.view().into_dyn(),
            self.head_w.view().into_dyn(),
            self.head_b.view().into_dyn(),
        ]
    }

    pub fn views_mut(&mut self) -> [ArrayViewMutD<'_, f64>; 5] {
        [
            self.w.view_mut().into_dyn(),
            self.u.view_mut().into_dyn(),
            self.b.view_mut().into_dyn(),
            self.head_w.view_mut().into_dyn(),
            self.head_b.view_mut().into_dyn(),
        ]
    }

    pub fn parameter_count(&self) -> usize {
        self.views().iter().map(|v| v.len()).sum()
    }

    pub fn l2_norm(&self) -> f64 {
        self.views()
            .iter()
            .map(|v| v.iter().map(|x| x * x).sum::<f64>())
            .sum::<f64>()
            .sqrt()
    }

    pub fn scale(&mut self, factor: f64) {
        for mut v in self.views_mut() {
            v.mapv_inplace(|x| x * factor);
        }
    }

    /// Rescales so the global L2 norm is at most `max_norm`. Returns the
    /// norm before clipping.
    pub fn clip_norm(&mut self, max_norm: f64) -> f64 {
        let norm = self.l2_norm();
        if max_norm > 0.0 && norm > max_norm {
            self.scale(max_norm / norm);
        }
        norm
    }

    pub fn is_finite(&self) -> bool {
        self.views().iter().all(|v| v.iter().all(|x| x.is_finite()))
    }
}

/// Adam with bias correction.
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    step: i32,
    m: Weights,
    v: Weights,
}

impl Adam {
    pub fn new(learning_rate: f64, like: &Weights) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            step: 0,
            m: like.zeros_like(),
            v: like.zeros_like(),
        }
    }

    pub fn step(&mut self, params: &mut Weights, grads: &Weights) {
        self.step += 1;
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        let bias1 = 1.0 - b1.powi(self.step);
        let bias2 = 1.0 - b2.powi(self.step);
        let lr = self.learning_rate;

        let tensors = params
            .views_mut()
            .into_iter()
            .zip(grads.views())
            .zip(self.m.views_mut())
            .zip(self.v.views_mut());
        for (((p, g), m), v) in tensors {
            Zip::from(p)
                .and(&g)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = b1 * *m + (1.0 - b1) * g;
                    *v = b2 * *v + (1.0 - b2) * g * g;
                    let m_hat = *m / bias1;
                    let v_hat = *v / bias2;
                    *p -= lr * m_hat / (v_hat.sqrt() + eps);
                });
        }
    }
}
