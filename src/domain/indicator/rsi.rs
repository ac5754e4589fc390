//! RSI (Relative Strength Index).
//!
//! Gains and losses are averaged with a simple rolling mean over the last n
//! close-to-close changes.
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100, or 50 when avg_gain is also 0 (flat window).
//!
//! Warmup: first n values are undefined (need n changes).

use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn calculate_rsi(values: &[f64], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Rsi(period);
    if period == 0 || values.len() <= period {
        return IndicatorSeries::undefined(indicator_type, values.len());
    }

    let mut out = Vec::with_capacity(values.len());
    out.push(None);

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    let change = |i: usize| values[i] - values[i - 1];

    for i in 1..values.len() {
        let c = change(i);
        gain_sum += c.max(0.0);
        loss_sum += (-c).max(0.0);

        if i > period {
            let old = change(i - period);
            gain_sum -= old.max(0.0);
            loss_sum -= (-old).max(0.0);
        }

        if i < period {
            out.push(None);
            continue;
        }

        let avg_gain = (gain_sum / period as f64).max(0.0);
        let avg_loss = (loss_sum / period as f64).max(0.0);
        out.push(Some(rsi_from_averages(avg_gain, avg_loss)));
    }

    IndicatorSeries {
        indicator_type,
        values: out,
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    // Running sums drift by a few ulps; treat that as zero.
    const EPS: f64 = 1e-12;
    if avg_loss <= EPS {
        if avg_gain <= EPS { 50.0 } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
