//! LSTM (Long Short-Term Memory) cell.
//!
//! Gate rows are stacked as [input, forget, candidate, output]:
//!
//! ```text
//! z = W·x + U·h_prev + b
//! i = σ(z_i)   f = σ(z_f)   g = tanh(z_g)   o = σ(z_o)
//! c = f ⊙ c_prev + i ⊙ g
//! h = o ⊙ tanh(c)
//! ```

use super::weights::Weights;
use super::{RecurrentCell, RecurrentKind, add_outer, sigmoid};
use ndarray::{Array1, ArrayView2, s};

pub struct Lstm;

/// Per-timestep values kept for backpropagation.
pub struct LstmStep {
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    tanh_c: Array1<f64>,
}

impl RecurrentCell for Lstm {
    type Step = LstmStep;
    const KIND: RecurrentKind = RecurrentKind::Lstm;
    const GATES: usize = 4;

    /// Forget-gate bias starts at 1 so early training keeps memory.
    fn initialise(weights: &mut Weights) {
        let h = weights.hidden();
        weights.b.slice_mut(s![h..2 * h]).fill(1.0);
    }

    fn forward(weights: &Weights, sequence: ArrayView2<f64>) -> (Array1<f64>, Vec<LstmStep>) {
        let hd = weights.hidden();
        let mut h: Array1<f64> = Array1::zeros(hd);
        let mut c: Array1<f64> = Array1::zeros(hd);
        let mut steps = Vec::with_capacity(sequence.nrows());

        for x in sequence.rows() {
            let z = weights.w.dot(&x) + weights.u.dot(&h) + &weights.b;
            let i = sigmoid(z.slice(s![0..hd]));
            let f = sigmoid(z.slice(s![hd..2 * hd]));
            let g = z.slice(s![2 * hd..3 * hd]).mapv(f64::tanh);
            let o = sigmoid(z.slice(s![3 * hd..4 * hd]));

            let c_next = &f * &c + &i * &g;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &o * &tanh_c;

            steps.push(LstmStep {
                h_prev: std::mem::replace(&mut h, h_next),
                c_prev: std::mem::replace(&mut c, c_next),
                i,
                f,
                g,
                o,
                tanh_c,
            });
        }
        (h, steps)
    }

    fn backward(
        weights: &Weights,
        sequence: ArrayView2<f64>,
        steps: &[LstmStep],
        dh_last: Array1<f64>,
        grads: &mut Weights,
    ) {
        let hd = weights.hidden();
        let mut dh = dh_last;
        let mut dc: Array1<f64> = Array1::zeros(hd);

        for (t, step) in steps.iter().enumerate().rev() {
            let d_o = &dh * &step.tanh_c;
            dc = dc + &dh * &step.o * step.tanh_c.mapv(|v| 1.0 - v * v);

            let d_i = &dc * &step.g;
            let d_g = &dc * &step.i;
            let d_f = &dc * &step.c_prev;

            let dz_i = d_i * step.i.mapv(|v| v * (1.0 - v));
            let dz_f = d_f * step.f.mapv(|v| v * (1.0 - v));
            let dz_g = d_g * step.g.mapv(|v| 1.0 - v * v);
            let dz_o = d_o * step.o.mapv(|v| v * (1.0 - v));
            let mut dz: Array1<f64> = Array1::zeros(4 * hd);
            dz.slice_mut(s![0..hd]).assign(&dz_i);
            dz.slice_mut(s![hd..2 * hd]).assign(&dz_f);
            dz.slice_mut(s![2 * hd..3 * hd]).assign(&dz_g);
            dz.slice_mut(s![3 * hd..4 * hd]).assign(&dz_o);

            add_outer(&mut grads.w, dz.view(), sequence.row(t));
            add_outer(&mut grads.u, dz.view(), step.h_prev.view());
            grads.b += &dz;

            dh = weights.u.t().dot(&dz);
            dc = &dc * &step.f;
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
        let mut rng = StdRng::seed_from_u64(1);
        let w = Weights::random(Lstm::GATES, 3, 5, &mut rng);
        let seq = Array2::zeros((7, 3));
        let (h, steps) = Lstm::forward(&w, seq.view());
        assert_eq!(h.len(), 5);
        assert_eq!(steps.len(), 7);
    }

    #[test]
    fn hidden_state_is_bounded() {
        let mut rng = StdRng::seed_from_u64(2);
        let w = Weights::random(Lstm::GATES, 2, 4, &mut rng);
        let seq = Array2::from_elem((20, 2), 50.0);
        let (h, _) = Lstm::forward(&w, seq.view());
        assert!(h.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn forget_bias_initialised_to_one() {
        let mut w = Weights::zeros(Lstm::GATES, 1, 3);
        Lstm::initialise(&mut w);
        assert_eq!(w.b.to_vec(), vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn analytic_gradients_match_finite_differences() {
        check_gradients::<Lstm>(11);
    }
}
