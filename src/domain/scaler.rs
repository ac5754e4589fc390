//! Min-max scaling to the [0, 1] interval.
//!
//! x' = (x - min) / (max - min). A constant column maps to 0. The fitted
//! min/max pairs are the only way back to original units.

use crate::domain::error::ForecastError;
use crate::domain::frame::PriceFrame;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnRange {
    pub min: f64,
    pub max: f64,
}

impl ColumnRange {
    fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn scale(&self, value: f64) -> f64 {
        if value.is_nan() {
            return f64::NAN;
        }
        let span = self.span();
        if span > 0.0 {
            (value - self.min) / span
        } else {
            0.0
        }
    }

    pub fn unscale(&self, value: f64) -> f64 {
        value * self.span() + self.min
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinMaxScaler {
    ranges: Vec<(String, ColumnRange)>,
}

impl MinMaxScaler {
    /// Records min and max of each named column, ignoring NaN.
    pub fn fit(frame: &PriceFrame, columns: &[String]) -> Result<Self, ForecastError> {
        let mut ranges = Vec::with_capacity(columns.len());
        for name in columns {
            let values = frame.column(name)?;
            let (min, max) = values
                .iter()
                .filter(|v| !v.is_nan())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            if !min.is_finite() || !max.is_finite() {
                return Err(ForecastError::NoData {
                    source_name: format!("column {}", name),
                });
            }
            ranges.push((name.clone(), ColumnRange { min, max }));
        }
        Ok(Self { ranges })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.ranges.iter().map(|(n, _)| n.as_str())
    }

    pub fn range(&self, column: &str) -> Result<ColumnRange, ForecastError> {
        self.ranges
            .iter()
            .find(|(n, _)| n == column)
            .map(|(_, r)| *r)
            .ok_or_else(|| ForecastError::ScalerColumn {
                name: column.into(),
            })
    }

    /// Returns a copy of `frame` with every fitted column rescaled.
    pub fn transform(&self, frame: &PriceFrame) -> Result<PriceFrame, ForecastError> {
        let mut out = frame.clone();
        for (name, range) in &self.ranges {
            let column = out
                .column_mut(name)
                .map_err(|_| ForecastError::ScalerColumn { name: name.clone() })?;
            for v in column.iter_mut() {
                *v = range.scale(*v);
            }
        }
        Ok(out)
    }

    pub fn inverse_value(&self, column: &str, value: f64) -> Result<f64, ForecastError> {
        Ok(self.range(column)?.unscale(value))
    }

    pub fn inverse_column(&self, column: &str, values: &[f64]) -> Result<Vec<f64>, ForecastError> {
        let range = self.range(column)?;
        Ok(values.iter().map(|v| range.unscale(*v)).collect())
    }
}
