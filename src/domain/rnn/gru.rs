//! GRU (Gated Recurrent Unit) cell.
//!
//! Gate rows are stacked as [update, reset, candidate]:
//!
//! ```text
//! z = σ(W_z·x + U_z·h_prev + b_z)
//! r = σ(W_r·x + U_r·h_prev + b_r)
//! n = tanh(W_n·x + b_n + r ⊙ (U_n·h_prev))
//! h = (1 - z) ⊙ n + z ⊙ h_prev
//! ```

use super::weights::Weights;
use super::{RecurrentCell, RecurrentKind, add_outer, sigmoid};
use ndarray::{Array1, ArrayView2, s};

pub struct Gru;

pub struct GruStep {
    h_prev: Array1<f64>,
    z: Array1<f64>,
    r: Array1<f64>,
    n: Array1<f64>,
    /// U_n·h_prev, before the reset gate is applied.
    uh_n: Array1<f64>,
}

impl RecurrentCell for Gru {
    type Step = GruStep;
    const KIND: RecurrentKind = RecurrentKind::Gru;
    const GATES: usize = 3;

    fn forward(weights: &Weights, sequence: ArrayView2<f64>) -> (Array1<f64>, Vec<GruStep>) {
        let hd = weights.hidden();
        let mut h: Array1<f64> = Array1::zeros(hd);
        let mut steps = Vec::with_capacity(sequence.nrows());

        for x in sequence.rows() {
            let wx = weights.w.dot(&x) + &weights.b;
            let uh = weights.u.dot(&h);

            let z = sigmoid((&wx.slice(s![0..hd]) + &uh.slice(s![0..hd])).view());
            let r = sigmoid((&wx.slice(s![hd..2 * hd]) + &uh.slice(s![hd..2 * hd])).view());
            let uh_n = uh.slice(s![2 * hd..3 * hd]).to_owned();
            let n = (&wx.slice(s![2 * hd..3 * hd]) + &(&r * &uh_n)).mapv(f64::tanh);

            let h_next = &n + &(&z * &(&h - &n));

            steps.push(GruStep {
                h_prev: std::mem::replace(&mut h, h_next),
                z,
                r,
                n,
                uh_n,
            });
        }
        (h, steps)
    }

    fn backward(
        weights: &Weights,
        sequence: ArrayView2<f64>,
        steps: &[GruStep],
        dh_last: Array1<f64>,
        grads: &mut Weights,
    ) {
        let hd = weights.hidden();
        let mut dh = dh_last;

        for (t, step) in steps.iter().enumerate().rev() {
            let d_n = &dh * &step.z.mapv(|v| 1.0 - v);
            let d_z = &dh * &(&step.h_prev - &step.n);

            let da_n = d_n * step.n.mapv(|v| 1.0 - v * v);
            let d_r = &da_n * &step.uh_n;
            let d_uh_n = &da_n * &step.r;
            let da_z = d_z * step.z.mapv(|v| v * (1.0 - v));
            let da_r = d_r * step.r.mapv(|v| v * (1.0 - v));

            // Input-side and bias gradients use the candidate pre-activation,
            // the recurrent side sees it only through the reset gate.
            let mut d_in: Array1<f64> = Array1::zeros(3 * hd);
            d_in.slice_mut(s![0..hd]).assign(&da_z);
            d_in.slice_mut(s![hd..2 * hd]).assign(&da_r);
            d_in.slice_mut(s![2 * hd..3 * hd]).assign(&da_n);

            let mut d_rec = d_in.clone();
            d_rec.slice_mut(s![2 * hd..3 * hd]).assign(&d_uh_n);

            add_outer(&mut grads.w, d_in.view(), sequence.row(t));
            add_outer(&mut grads.u, d_rec.view(), step.h_prev.view());
            grads.b += &d_in;

            dh = &dh * &step.z + weights.u.t().dot(&d_rec);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rnn::tests::check_gradients;
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn forward_shapes() {
        let mut rng = StdRng::seed_from_u64(3);
        let w = Weights::random(Gru::GATES, 4, 6, &mut rng);
        let seq = Array2::zeros((5, 4));
        let (h, steps) = Gru::forward(&w, seq.view());
        assert_eq!(h.len(), 6);
        assert_eq!(steps.len(), 5);
        assert_eq!(w.w.nrows(), 18);
    }

    #[test]
    fn zero_weights_keep_zero_state() {
        let w = Weights::zeros(Gru::GATES, 2, 3);
        let seq = Array2::from_elem((4, 2), 1.0);
        let (h, _) = Gru::forward(&w, seq.view());
        // n = tanh(0) = 0 and h_prev = 0, so h stays 0
        assert!(h.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn update_gate_blends_previous_state() {
        // one hidden unit, no input weights: z = σ(b_z); n = tanh(b_n)
        let mut w = Weights::zeros(Gru::GATES, 1, 1);
        w.b[0] = 0.0; // z = 0.5
        w.b[2] = 10.0; // n ≈ 1
        let seq = Array2::zeros((2, 1));
        let (h, _) = Gru::forward(&w, seq.view());
        // step 1: 0.5 * n; step 2: 0.5 * n + 0.5 * 0.5 * n
        let n = 10.0_f64.tanh();
        assert!((h[0] - 0.75 * n).abs() < 1e-12);
    }

    #[test]
    fn analytic_gradients_match_finite_differences() {
        check_gradients::<Gru>(13);
    }
}
