//! Historical volatility.
//!
//! Sample standard deviation (n-1 denominator) of the last n close-to-close
//! differences. Differences are used instead of percentage returns because
//! the engine runs on min-max scaled closes, which reach zero.
//! Warmup: first n values are undefined; n < 2 leaves everything undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn calculate_volatility(values: &[f64], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Volatility(period);
    if period < 2 || values.len() <= period {
        return IndicatorSeries::undefined(indicator_type, values.len());
    }

    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let mut out = vec![None; period];

    for end in period..values.len() {
        // diffs[end - 1] is the change into row `end`
        let window = &diffs[end - period..end];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|d| {
                let dev = d - mean;
                dev * dev
            })
            .sum::<f64>()
            / (period - 1) as f64;
        out.push(Some(variance.sqrt()));
    }

    IndicatorSeries {
        indicator_type,
        values: out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn volatility_warmup() {
        let series = calculate_volatility(&[1.0, 2.0, 4.0, 7.0, 11.0], 3);
        assert_eq!(&series.values[..3], &[None, None, None]);
        assert!(series.values[3].is_some());
        assert!(series.values[4].is_some());
    }

    #[test]
    fn volatility_constant_step_is_zero() {
        let series = calculate_volatility(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_relative_eq!(series.values[4].unwrap(), 0.0);
    }

    #[test]
    fn volatility_known_values() {
        // diffs 1, 2, 3 → mean 2, sample variance (1+0+1)/2 = 1
        let series = calculate_volatility(&[1.0, 2.0, 4.0, 7.0], 3);
        assert_relative_eq!(series.values[3].unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn volatility_rolls() {
        // at row 4 the window holds diffs 2, 3, 4 → std 1
        let series = calculate_volatility(&[1.0, 2.0, 4.0, 7.0, 11.0], 3);
        assert_relative_eq!(series.values[4].unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn volatility_period_1_undefined() {
        let series = calculate_volatility(&[1.0, 2.0, 3.0], 1);
        assert_eq!(series.values, vec![None, None, None]);
    }

    #[test]
    fn volatility_short_input() {
        let series = calculate_volatility(&[1.0, 2.0, 3.0], 3);
        assert_eq!(series.values.len(), 3);
        assert!(series.values.iter().all(Option::is_none));
    }
}
