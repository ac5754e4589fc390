//! Fit-and-evaluate runs for the baseline and the recurrent models.
//!
//! Both paths split chronologically, fit on the head, predict the tail and
//! score the predictions on the scaled target and, when the target column
//! was fitted by the price scaler, on prices.

use crate::domain::dataset::{FeatureSet, SequenceSet};
use crate::domain::error::ForecastError;
use crate::domain::frame::PriceFrame;
use crate::domain::linear::LinearRegression;
use crate::domain::metrics::ErrorMetrics;
use crate::domain::rnn::{RecurrentKind, SequenceRegressor, TrainConfig, TrainReport, build_model};
use crate::domain::scaler::MinMaxScaler;
use chrono::NaiveDate;

/// Held-out predictions in the original price units.
#[derive(Debug, Clone)]
pub struct PriceForecast {
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub metrics: ErrorMetrics,
}

#[derive(Debug, Clone)]
pub struct Forecast {
    pub model: String,
    /// Date each prediction is for.
    pub dates: Vec<NaiveDate>,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub metrics: ErrorMetrics,
    pub price: Option<PriceForecast>,
    pub train_samples: usize,
}

impl Forecast {
    fn new(
        model: String,
        dates: Vec<NaiveDate>,
        actual: Vec<f64>,
        predicted: Vec<f64>,
        target: &str,
        price_scaler: Option<&MinMaxScaler>,
        train_samples: usize,
    ) -> Result<Self, ForecastError> {
        let metrics = ErrorMetrics::compute(&actual, &predicted)?;
        let price = match price_scaler {
            Some(scaler) if scaler.range(target).is_ok() => {
                let actual = scaler.inverse_column(target, &actual)?;
                let predicted = scaler.inverse_column(target, &predicted)?;
                let metrics = ErrorMetrics::compute(&actual, &predicted)?;
                Some(PriceForecast {
                    actual,
                    predicted,
                    metrics,
                })
            }
            _ => None,
        };
        Ok(Self {
            model,
            dates,
            actual,
            predicted,
            metrics,
            price,
            train_samples,
        })
    }
}

pub fn evaluate_baseline(
    frame: &PriceFrame,
    features: &[String],
    target: &str,
    test_ratio: f64,
    price_scaler: Option<&MinMaxScaler>,
) -> Result<(LinearRegression, Forecast), ForecastError> {
    let set = FeatureSet::from_frame(frame, features, target)?;
    let (train, test) = set.chronological_split(1.0 - test_ratio)?;

    let model = LinearRegression::fit(train.x.view(), &train.y)?;
    let predicted = model.predict(test.x.view())?;
    log::info!(
        "baseline fitted on {} rows, evaluated on {}",
        train.len(),
        test.len()
    );

    let forecast = Forecast::new(
        "linear".into(),
        test.target_dates,
        test.y,
        predicted,
        target,
        price_scaler,
        train.len(),
    )?;
    Ok((model, forecast))
}

/// Windows the frame, trains a fresh model on the head and predicts the tail.
pub fn evaluate_sequence_model(
    kind: RecurrentKind,
    frame: &PriceFrame,
    features: &[String],
    target: &str,
    config: &TrainConfig,
    test_ratio: f64,
    price_scaler: Option<&MinMaxScaler>,
) -> Result<(TrainReport, Forecast), ForecastError> {
    config.validate()?;
    let set = SequenceSet::from_frame(frame, features, target, config.window)?;
    let (train, test) = set.chronological_split(1.0 - test_ratio)?;

    let mut model: Box<dyn SequenceRegressor> = build_model(kind, set.num_features(), config);
    log::info!(
        "training {} (window {}, hidden {}, batch {}, lr {}) on {} windows",
        kind,
        config.window,
        config.hidden_units,
        config.batch_size,
        config.learning_rate,
        train.len()
    );
    let report = model.fit(&train, config)?;
    let predicted = model.predict(&test);

    let forecast = Forecast::new(
        kind.to_string(),
        test.target_dates.clone(),
        test.y.clone(),
        predicted,
        target,
        price_scaler,
        train.len(),
    )?;
    log::info!("{}: test {}", kind, forecast.metrics);
    Ok((report, forecast))
}
