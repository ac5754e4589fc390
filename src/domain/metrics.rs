//! Forecast error metrics.

use crate::domain::error::ForecastError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Mean absolute percentage error in percent; zero actuals are skipped.
    /// NaN when every actual is zero.
    pub mape: f64,
    /// Coefficient of determination. 0 when the actuals are constant.
    pub r2: f64,
    pub samples: usize,
}

impl ErrorMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self, ForecastError> {
        if actual.len() != predicted.len() {
            return Err(ForecastError::LengthMismatch {
                what: "predictions".into(),
                expected: actual.len(),
                actual: predicted.len(),
            });
        }
        if actual.is_empty() {
            return Err(ForecastError::InsufficientData {
                stage: "error metrics".into(),
                rows: 0,
                minimum: 1,
            });
        }

        let n = actual.len() as f64;
        let mut sq = 0.0;
        let mut abs = 0.0;
        let mut pct = 0.0;
        let mut pct_count = 0usize;
        for (a, p) in actual.iter().zip(predicted) {
            let err = a - p;
            sq += err * err;
            abs += err.abs();
            if *a != 0.0 {
                pct += (err / a).abs();
                pct_count += 1;
            }
        }

        let mse = sq / n;
        let mean = actual.iter().sum::<f64>() / n;
        let ss_tot: f64 = actual.iter().map(|a| (a - mean) * (a - mean)).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - sq / ss_tot } else { 0.0 };
        let mape = if pct_count > 0 {
            pct / pct_count as f64 * 100.0
        } else {
            f64::NAN
        };

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae: abs / n,
            mape,
            r2,
            samples: actual.len(),
        })
    }
}

impl fmt::Display for ErrorMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MSE {:.6}  RMSE {:.6}  MAE {:.6}  MAPE {:.2}%  R² {:.4}  (n={})",
            self.mse, self.rmse, self.mae, self.mape, self.r2, self.samples
        )
    }
}
