//! Average True Range.
//!
//! Simple rolling mean of the true range. The first row has no previous
//! close, so its true range is high - low. Warmup: first (n-1) undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::true_range;

pub fn calculate_atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Atr(period);
    let len = close.len().min(high.len()).min(low.len());
    if period == 0 || len < period {
        return IndicatorSeries::undefined(indicator_type, close.len());
    }

    let tr: Vec<f64> = (0..len)
        .map(|i| {
            if i == 0 {
                high[0] - low[0]
            } else {
                true_range(high[i], low[i], close[i - 1])
            }
        })
        .collect();

    let mut out = Vec::with_capacity(close.len());
    let mut sum = 0.0;
    for i in 0..len {
        sum += tr[i];
        if i >= period {
            sum -= tr[i - period];
        }
        out.push(if i + 1 >= period {
            Some(sum / period as f64)
        } else {
            None
        });
    }
    out.resize(close.len(), None);

    IndicatorSeries {
        indicator_type,
        values: out,
    }
}
