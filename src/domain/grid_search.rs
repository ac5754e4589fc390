//! Exhaustive hyperparameter search over the recurrent models.

use crate::domain::error::ForecastError;
use crate::domain::forecast::evaluate_sequence_model;
use crate::domain::frame::PriceFrame;
use crate::domain::metrics::ErrorMetrics;
use crate::domain::rnn::{RecurrentKind, TrainConfig};
use crate::domain::scaler::MinMaxScaler;

#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub window_sizes: Vec<usize>,
    pub hidden_units: Vec<usize>,
    pub batch_sizes: Vec<usize>,
    pub learning_rates: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            window_sizes: vec![10, 20, 30],
            hidden_units: vec![16, 32],
            batch_sizes: vec![16, 32],
            learning_rates: vec![0.001, 0.01],
        }
    }
}

/// One point of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub window: usize,
    pub hidden_units: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

impl GridPoint {
    pub fn apply(&self, base: &TrainConfig) -> TrainConfig {
        TrainConfig {
            window: self.window,
            hidden_units: self.hidden_units,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            ..base.clone()
        }
    }
}

impl ParamGrid {
    pub fn validate(&self) -> Result<(), ForecastError> {
        let axes = [
            ("window_sizes", self.window_sizes.is_empty()),
            ("hidden_units", self.hidden_units.is_empty()),
            ("batch_sizes", self.batch_sizes.is_empty()),
            ("learning_rates", self.learning_rates.is_empty()),
        ];
        for (key, empty) in axes {
            if empty {
                return Err(ForecastError::ConfigInvalid {
                    section: "search".into(),
                    key: key.into(),
                    reason: "grid axis is empty".into(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.window_sizes.len()
            * self.hidden_units.len()
            * self.batch_sizes.len()
            * self.learning_rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product; window is the outermost axis, learning rate the innermost.
    pub fn combinations(&self) -> Vec<GridPoint> {
        let mut points = Vec::with_capacity(self.len());
        for &window in &self.window_sizes {
            for &hidden_units in &self.hidden_units {
                for &batch_size in &self.batch_sizes {
                    for &learning_rate in &self.learning_rates {
                        points.push(GridPoint {
                            window,
                            hidden_units,
                            batch_size,
                            learning_rate,
                        });
                    }
                }
            }
        }
        points
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub kind: RecurrentKind,
    pub point: GridPoint,
    pub epochs_run: usize,
    pub best_val_loss: Option<f64>,
    /// Test metrics on the scaled target.
    pub metrics: ErrorMetrics,
    pub price_metrics: Option<ErrorMetrics>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Ascending by test RMSE.
    pub results: Vec<SearchResult>,
    /// Lowest test RMSE per model kind, in the order the kinds were given.
    pub best: Vec<SearchResult>,
    pub skipped: usize,
}

/// Inputs shared by every search run.
pub struct SearchData<'a> {
    pub frame: &'a PriceFrame,
    pub features: &'a [String],
    pub target: &'a str,
    pub test_ratio: f64,
    pub price_scaler: Option<&'a MinMaxScaler>,
}

pub fn grid_search(
    data: &SearchData<'_>,
    kinds: &[RecurrentKind],
    grid: &ParamGrid,
    base: &TrainConfig,
) -> Result<SearchOutcome, ForecastError> {
    grid.validate()?;
    if kinds.is_empty() {
        return Err(ForecastError::ConfigInvalid {
            section: "search".into(),
            key: "models".into(),
            reason: "no models to search".into(),
        });
    }

    let points = grid.combinations();
    let total = points.len() * kinds.len();
    let mut results = Vec::with_capacity(total);
    let mut skipped = 0usize;
    let mut run = 0usize;

    for &kind in kinds {
        for point in &points {
            run += 1;
            let config = point.apply(base);
            log::info!(
                "search {}/{}: {} window={} hidden={} batch={} lr={}",
                run,
                total,
                kind,
                point.window,
                point.hidden_units,
                point.batch_size,
                point.learning_rate
            );
            match evaluate_sequence_model(
                kind,
                data.frame,
                data.features,
                data.target,
                &config,
                data.test_ratio,
                data.price_scaler,
            ) {
                Ok((report, forecast)) => results.push(SearchResult {
                    kind,
                    point: *point,
                    epochs_run: report.epochs_run,
                    best_val_loss: report.best_val_loss,
                    metrics: forecast.metrics,
                    price_metrics: forecast.price.map(|p| p.metrics),
                }),
                Err(e @ ForecastError::InsufficientData { .. })
                | Err(e @ ForecastError::Model { .. }) => {
                    log::warn!("skipping {} window={}: {}", kind, point.window, e);
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    if results.is_empty() {
        return Err(ForecastError::InsufficientData {
            stage: "grid search".into(),
            rows: data.frame.len(),
            minimum: grid.window_sizes.iter().min().copied().unwrap_or(1) + 2,
        });
    }

    results.sort_by(|a, b| a.metrics.rmse.total_cmp(&b.metrics.rmse));
    let best = kinds
        .iter()
        .filter_map(|kind| results.iter().find(|r| r.kind == *kind).cloned())
        .collect();

    Ok(SearchOutcome {
        results,
        best,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorType;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::pipeline::prepare;
    use chrono::NaiveDate;

    fn bars(n: usize) -> Vec<OhlcvBar> {
        (0..n)
            .map(|i| {
                let base = 20.0 + (i as f64 * 0.2).sin() * 3.0 + i as f64 * 0.05;
                OhlcvBar {
                    date: NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()
                        + chrono::Days::new(i as u64),
                    open: base,
                    high: base + 0.5 + (i % 3) as f64 * 0.1,
                    low: base - 0.5,
                    close: base + 0.1 * (i as f64).cos(),
                    volume: 100.0 + (i % 4) as f64,
                }
            })
            .collect()
    }

    fn quick() -> TrainConfig {
        TrainConfig {
            epochs: 2,
            validation_ratio: 0.0,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn combinations_nest_window_outermost() {
        let grid = ParamGrid {
            window_sizes: vec![5, 10],
            hidden_units: vec![8],
            batch_sizes: vec![16, 32],
            learning_rates: vec![0.01, 0.1],
        };
        let points = grid.combinations();
        assert_eq!(points.len(), 8);
        assert_eq!(grid.len(), 8);
        assert_eq!(points[0].window, 5);
        assert_eq!(points[1].learning_rate, 0.1);
        assert_eq!(points[2].batch_size, 32);
        assert_eq!(points[4].window, 10);
    }

    #[test]
    fn empty_axis_is_rejected() {
        let grid = ParamGrid {
            hidden_units: vec![],
            ..ParamGrid::default()
        };
        assert!(grid.is_empty());
        let err = grid.validate().unwrap_err();
        assert!(matches!(err, ForecastError::ConfigInvalid { key, .. } if key == "hidden_units"));
    }

    #[test]
    fn point_overrides_only_grid_fields() {
        let base = TrainConfig {
            epochs: 7,
            seed: 3,
            ..TrainConfig::default()
        };
        let point = GridPoint {
            window: 4,
            hidden_units: 2,
            batch_size: 1,
            learning_rate: 0.5,
        };
        let config = point.apply(&base);
        assert_eq!(config.window, 4);
        assert_eq!(config.epochs, 7);
        assert_eq!(config.seed, 3);
    }

    #[test]
    fn results_sorted_and_best_per_kind() {
        let prepared = prepare(&bars(70), &[IndicatorType::Sma(3)]).unwrap();
        let features = prepared.frame.column_names().to_vec();
        let data = SearchData {
            frame: &prepared.frame,
            features: &features,
            target: "close",
            test_ratio: 0.2,
            price_scaler: Some(&prepared.price_scaler),
        };
        let grid = ParamGrid {
            window_sizes: vec![3, 5],
            hidden_units: vec![4],
            batch_sizes: vec![16],
            learning_rates: vec![0.01],
        };
        let kinds = [RecurrentKind::Lstm, RecurrentKind::Gru];
        let outcome = grid_search(&data, &kinds, &grid, &quick()).unwrap();

        assert_eq!(outcome.results.len(), 4);
        assert_eq!(outcome.skipped, 0);
        for pair in outcome.results.windows(2) {
            assert!(pair[0].metrics.rmse <= pair[1].metrics.rmse);
        }
        assert_eq!(outcome.best.len(), 2);
        assert_eq!(outcome.best[0].kind, RecurrentKind::Lstm);
        assert_eq!(outcome.best[1].kind, RecurrentKind::Gru);
        let best_lstm = outcome
            .results
            .iter()
            .filter(|r| r.kind == RecurrentKind::Lstm)
            .map(|r| r.metrics.rmse)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(outcome.best[0].metrics.rmse, best_lstm);
        assert!(outcome.results.iter().all(|r| r.price_metrics.is_some()));
    }

    #[test]
    fn oversized_windows_are_skipped() {
        let prepared = prepare(&bars(40), &[IndicatorType::Sma(3)]).unwrap();
        let features = prepared.frame.column_names().to_vec();
        let data = SearchData {
            frame: &prepared.frame,
            features: &features,
            target: "close",
            test_ratio: 0.2,
            price_scaler: None,
        };
        let grid = ParamGrid {
            window_sizes: vec![4, 500],
            hidden_units: vec![3],
            batch_sizes: vec![8],
            learning_rates: vec![0.01],
        };
        let outcome = grid_search(&data, &[RecurrentKind::Gru], &grid, &quick()).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.results[0].point.window, 4);
    }

    #[test]
    fn diverged_points_are_skipped() {
        // 40 rows, 25% test, half of training held out for validation.
        // Row 19's target is a training target for window 10 but only a
        // validation target for window 2.
        let rows = 40;
        let dates: Vec<NaiveDate> = (0..rows)
            .map(|i| NaiveDate::from_ymd_opt(2022, 3, 1).unwrap() + chrono::Days::new(i as u64))
            .collect();
        let mut frame = PriceFrame::new(dates);
        frame
            .insert_column("x", (0..rows).map(|i| (i as f64 * 0.3).sin()).collect())
            .unwrap();
        let mut y: Vec<f64> = (0..rows).map(|i| 0.5 + 0.4 * (i as f64 * 0.3).cos()).collect();
        y[19] = 1e200;
        frame.insert_column("y", y).unwrap();

        let features = vec!["x".to_string()];
        let data = SearchData {
            frame: &frame,
            features: &features,
            target: "y",
            test_ratio: 0.25,
            price_scaler: None,
        };
        let grid = ParamGrid {
            window_sizes: vec![2, 10],
            hidden_units: vec![3],
            batch_sizes: vec![8],
            learning_rates: vec![0.01],
        };
        let base = TrainConfig {
            validation_ratio: 0.5,
            ..quick()
        };
        let outcome = grid_search(&data, &[RecurrentKind::Gru], &grid, &base).unwrap();

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].point.window, 2);
        assert!(outcome.results[0].metrics.rmse.is_finite());
    }

    #[test]
    fn nothing_fits_is_an_error() {
        let prepared = prepare(&bars(20), &[IndicatorType::Sma(3)]).unwrap();
        let features = prepared.frame.column_names().to_vec();
        let data = SearchData {
            frame: &prepared.frame,
            features: &features,
            target: "close",
            test_ratio: 0.2,
            price_scaler: None,
        };
        let grid = ParamGrid {
            window_sizes: vec![100],
            hidden_units: vec![3],
            batch_sizes: vec![8],
            learning_rates: vec![0.01],
        };
        assert!(matches!(
            grid_search(&data, &[RecurrentKind::Lstm], &grid, &quick()),
            Err(ForecastError::InsufficientData { .. })
        ));
    }
}
