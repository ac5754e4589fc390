//! Supervised views over a prepared frame.
//!
//! [`FeatureSet`] pairs same-day feature rows with the next day's target.
//! [`SequenceSet`] turns feature rows into sliding windows for the recurrent
//! models.

use crate::domain::error::ForecastError;
use crate::domain::frame::PriceFrame;
use chrono::NaiveDate;
use ndarray::{Array2, Array3, ArrayView2, Axis, s};

#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub feature_names: Vec<String>,
    pub target_name: String,
    /// Date of the feature row.
    pub dates: Vec<NaiveDate>,
    /// Date of the row the target comes from (the next trading day).
    pub target_dates: Vec<NaiveDate>,
    /// Shape (rows, features).
    pub x: Array2<f64>,
    /// Target value for the following row.
    pub y: Vec<f64>,
}

impl FeatureSet {
    /// x[t] = features at t, y[t] = target at t+1. The final row has no
    /// next-day target and is left out.
    pub fn from_frame(
        frame: &PriceFrame,
        feature_columns: &[String],
        target_column: &str,
    ) -> Result<Self, ForecastError> {
        if feature_columns.is_empty() {
            return Err(ForecastError::ColumnMissing {
                name: "<no feature columns>".into(),
            });
        }
        let target = frame.column(target_column)?;
        if frame.len() < 2 {
            return Err(ForecastError::InsufficientData {
                stage: "feature set".into(),
                rows: frame.len(),
                minimum: 2,
            });
        }

        let rows = frame.len() - 1;
        let mut x = Array2::zeros((rows, feature_columns.len()));
        for (j, name) in feature_columns.iter().enumerate() {
            let col = frame.column(name)?;
            for i in 0..rows {
                x[[i, j]] = col[i];
            }
        }

        Ok(Self {
            feature_names: feature_columns.to_vec(),
            target_name: target_column.to_string(),
            dates: frame.dates()[..rows].to_vec(),
            target_dates: frame.dates()[1..].to_vec(),
            x,
            y: target[1..].to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }

    /// Splits at `ratio` of the rows without shuffling; the tail is the test part.
    pub fn chronological_split(
        &self,
        ratio: f64,
    ) -> Result<(FeatureSet, FeatureSet), ForecastError> {
        let cut = split_index(self.len(), ratio, "train/test split")?;
        Ok((self.rows(0, cut), self.rows(cut, self.len())))
    }

    fn rows(&self, start: usize, end: usize) -> FeatureSet {
        FeatureSet {
            feature_names: self.feature_names.clone(),
            target_name: self.target_name.clone(),
            dates: self.dates[start..end].to_vec(),
            target_dates: self.target_dates[start..end].to_vec(),
            x: self.x.slice(s![start..end, ..]).to_owned(),
            y: self.y[start..end].to_vec(),
        }
    }
}

/// Row index at which `len` rows split into two non-empty parts.
pub fn split_index(len: usize, ratio: f64, stage: &str) -> Result<usize, ForecastError> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(ForecastError::Model {
            reason: format!("{} ratio must be in (0, 1), got {}", stage, ratio),
        });
    }
    let cut = (len as f64 * ratio).round() as usize;
    if cut == 0 || cut >= len {
        return Err(ForecastError::InsufficientData {
            stage: stage.into(),
            rows: len,
            minimum: 2,
        });
    }
    Ok(cut)
}

/// Sliding windows of feature rows.
#[derive(Debug, Clone)]
pub struct SequenceSet {
    /// Shape (samples, window, features).
    pub x: Array3<f64>,
    pub y: Vec<f64>,
    /// Date of the row each target belongs to.
    pub target_dates: Vec<NaiveDate>,
}

impl SequenceSet {
    /// Sample i covers rows i..i+window; its target is `targets[i + window]`.
    pub fn build(
        features: ArrayView2<f64>,
        targets: &[f64],
        dates: &[NaiveDate],
        window: usize,
    ) -> Result<Self, ForecastError> {
        let rows = features.nrows();
        if targets.len() != rows {
            return Err(ForecastError::LengthMismatch {
                what: "sequence targets".into(),
                expected: rows,
                actual: targets.len(),
            });
        }
        if dates.len() != rows {
            return Err(ForecastError::LengthMismatch {
                what: "sequence dates".into(),
                expected: rows,
                actual: dates.len(),
            });
        }
        if window == 0 || window >= rows {
            return Err(ForecastError::InsufficientData {
                stage: format!("sequence window {}", window),
                rows,
                minimum: window.max(1) + 1,
            });
        }

        let samples = rows - window;
        let mut x = Array3::zeros((samples, window, features.ncols()));
        for i in 0..samples {
            x.index_axis_mut(Axis(0), i)
                .assign(&features.slice(s![i..i + window, ..]));
        }

        Ok(Self {
            x,
            y: targets[window..].to_vec(),
            target_dates: dates[window..].to_vec(),
        })
    }

    /// Windows over a frame's columns, predicting `target_column` on the row
    /// right after each window.
    pub fn from_frame(
        frame: &PriceFrame,
        feature_columns: &[String],
        target_column: &str,
        window: usize,
    ) -> Result<Self, ForecastError> {
        let mut features = Array2::zeros((frame.len(), feature_columns.len()));
        for (j, name) in feature_columns.iter().enumerate() {
            for (i, v) in frame.column(name)?.iter().enumerate() {
                features[[i, j]] = *v;
            }
        }
        Self::build(
            features.view(),
            frame.column(target_column)?,
            frame.dates(),
            window,
        )
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn window(&self) -> usize {
        self.x.shape()[1]
    }

    pub fn num_features(&self) -> usize {
        self.x.shape()[2]
    }

    pub fn sample(&self, i: usize) -> ArrayView2<'_, f64> {
        self.x.index_axis(Axis(0), i)
    }

    pub fn chronological_split(
        &self,
        ratio: f64,
    ) -> Result<(SequenceSet, SequenceSet), ForecastError> {
        let cut = split_index(self.len(), ratio, "sequence split")?;
        Ok((self.range(0, cut), self.range(cut, self.len())))
    }

    fn range(&self, start: usize, end: usize) -> SequenceSet {
        SequenceSet {
            x: self.x.slice(s![start..end, .., ..]).to_owned(),
            y: self.y[start..end].to_vec(),
            target_dates: self.target_dates[start..end].to_vec(),
        }
    }
}
