//! Date-indexed table of named `f64` columns.
//!
//! Every pipeline stage consumes and produces a [`PriceFrame`]. Undefined
//! values (indicator warm-up) are stored as `NaN`.

use crate::domain::error::ForecastError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::ops::Range;

pub const BASE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

#[derive(Debug, Clone, PartialEq)]
pub struct PriceFrame {
    dates: Vec<NaiveDate>,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl PriceFrame {
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Builds a frame with the five base columns. Bars must already be sorted.
    pub fn from_bars(bars: &[OhlcvBar]) -> Self {
        let mut frame = Self::new(bars.iter().map(|b| b.date).collect());
        let extract: [fn(&OhlcvBar) -> f64; 5] = [
            |b| b.open,
            |b| b.high,
            |b| b.low,
            |b| b.close,
            |b| b.volume,
        ];
        for (name, get) in BASE_COLUMNS.iter().zip(extract) {
            frame.names.push(name.to_string());
            frame.columns.push(bars.iter().map(get).collect());
        }
        frame
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Result<&[f64], ForecastError> {
        self.position(name)
            .map(|i| self.columns[i].as_slice())
            .ok_or_else(|| ForecastError::ColumnMissing { name: name.into() })
    }

    pub fn column_mut(&mut self, name: &str) -> Result<&mut Vec<f64>, ForecastError> {
        match self.position(name) {
            Some(i) => Ok(&mut self.columns[i]),
            None => Err(ForecastError::ColumnMissing { name: name.into() }),
        }
    }

    /// Adds a column, replacing any existing column of the same name.
    pub fn insert_column(&mut self, name: &str, values: Vec<f64>) -> Result<(), ForecastError> {
        if values.len() != self.len() {
            return Err(ForecastError::LengthMismatch {
                what: format!("column {}", name),
                expected: self.len(),
                actual: values.len(),
            });
        }
        match self.position(name) {
            Some(i) => self.columns[i] = values,
            None => {
                self.names.push(name.to_string());
                self.columns.push(values);
            }
        }
        Ok(())
    }

    /// Values of every column at row `i`, in column order.
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[i]).collect()
    }

    /// Removes every row holding a NaN in any column. Returns the count removed.
    pub fn drop_undefined_rows(&mut self) -> usize {
        let keep: Vec<bool> = (0..self.len())
            .map(|i| self.columns.iter().all(|c| !c[i].is_nan()))
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return 0;
        }

        let mut flags = keep.iter();
        self.dates.retain(|_| *flags.next().unwrap_or(&false));
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column.retain(|_| *flags.next().unwrap_or(&false));
        }
        removed
    }

    /// New frame holding only `columns`, in the requested order.
    pub fn select(&self, columns: &[String]) -> Result<PriceFrame, ForecastError> {
        let mut out = PriceFrame::new(self.dates.clone());
        for name in columns {
            out.insert_column(name, self.column(name)?.to_vec())?;
        }
        Ok(out)
    }

    pub fn slice_rows(&self, range: Range<usize>) -> PriceFrame {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        PriceFrame {
            dates: self.dates[start..end].to_vec(),
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c[start..end].to_vec()).collect(),
        }
    }
}
