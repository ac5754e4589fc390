//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) values are undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn calculate_ema(values: &[f64], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ema(period);
    if period == 0 || values.len() < period {
        return IndicatorSeries::undefined(indicator_type, values.len());
    }

    let mut out = Vec::with_capacity(values.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &close) in values.iter().enumerate() {
        if i < period - 1 {
            sum += close;
            out.push(None);
        } else if i == period - 1 {
            sum += close;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = close * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }

    IndicatorSeries {
        indicator_type,
        values: out,
    }
}
