//! CLI definition and dispatch.
//!
//! Every subcommand loads the INI config, validates it, and runs one or more
//! pipeline stages against a [`DataPort`]. Results tables go to stdout,
//! progress goes through `log`.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::chart_svg;
use crate::adapters::csv_adapter::{CsvAdapter, search_results_csv};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    parse_f64_list, parse_model_list, parse_usize_list, validate_data_config, validate_model_config,
    validate_search_config,
};
use crate::domain::error::ForecastError;
use crate::domain::forecast::{Forecast, evaluate_baseline, evaluate_sequence_model};
use crate::domain::frame::PriceFrame;
use crate::domain::grid_search::{ParamGrid, SearchData, SearchOutcome, grid_search};
use crate::domain::indicator::{IndicatorType, default_indicators, parse_indicator_list};
use crate::domain::pipeline::{PreparedData, prepare};
use crate::domain::rnn::{RecurrentKind, TrainConfig, TrainReport};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "nextclose", about = "Next-day closing price forecasting pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load, normalize, add indicators and post-normalize; writes CSV snapshots
    Prepare {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Render price and indicator charts as SVG
    Plot {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Fit and evaluate the linear-regression baseline
    Baseline {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Train and evaluate one recurrent model
    Train {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        model: RecurrentKind,
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Grid search over window, hidden units, batch size and learning rate
    Search {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_delimiter = ',')]
        models: Option<Vec<RecurrentKind>>,
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Run every stage in order
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Prepare {
            config,
            input,
            out_dir,
        } => run_prepare(&config, input.as_deref(), out_dir.as_deref()),
        Command::Plot { config, out_dir } => run_plot(&config, out_dir.as_deref()),
        Command::Baseline { config, out_dir } => run_baseline(&config, out_dir.as_deref()),
        Command::Train {
            config,
            model,
            out_dir,
        } => run_train(&config, model, out_dir.as_deref()),
        Command::Search {
            config,
            models,
            out_dir,
        } => run_search(&config, models, out_dir.as_deref()),
        Command::Run { config, out_dir } => run_all(&config, out_dir.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ForecastError> {
    log::info!("loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// `[data]`, `[indicators]` and `[features]` resolved against defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub test_ratio: f64,
    pub indicators: Vec<IndicatorType>,
    /// `None` uses every column of the prepared frame.
    pub features: Option<Vec<String>>,
    pub target: String,
}

impl PipelineSettings {
    pub fn feature_columns(&self, frame: &PriceFrame) -> Vec<String> {
        match &self.features {
            Some(columns) => columns.clone(),
            None => frame.column_names().to_vec(),
        }
    }
}

pub fn build_pipeline_settings(
    config: &dyn ConfigPort,
    input_override: Option<&Path>,
    out_dir_override: Option<&Path>,
) -> Result<PipelineSettings, ForecastError> {
    validate_data_config(config)?;

    let input = match input_override {
        Some(p) => p.to_path_buf(),
        None => config
            .get_string("data", "input")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ForecastError::ConfigMissing {
                section: "data".into(),
                key: "input".into(),
            })?,
    };
    let output_dir = match out_dir_override {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(
            config
                .get_string("data", "output_dir")
                .unwrap_or_else(|| "output".to_string()),
        ),
    };

    let indicators = match config.get_string("indicators", "list") {
        Some(list) => parse_indicator_list(&list).map_err(|reason| ForecastError::ConfigInvalid {
            section: "indicators".into(),
            key: "list".into(),
            reason,
        })?,
        None => default_indicators(),
    };

    let features = config
        .get_list("features", "columns")
        .map(|cols| cols.iter().map(|c| c.to_lowercase()).collect::<Vec<_>>())
        .filter(|cols| !cols.is_empty());

    Ok(PipelineSettings {
        input,
        output_dir,
        test_ratio: config.get_double("data", "test_ratio", 0.2),
        indicators,
        features,
        target: config
            .get_string("features", "target")
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_else(|| "close".to_string()),
    })
}

pub fn build_train_config(config: &dyn ConfigPort) -> Result<TrainConfig, ForecastError> {
    validate_model_config(config)?;
    let d = TrainConfig::default();
    Ok(TrainConfig {
        window: config.get_int("model", "window", d.window as i64) as usize,
        hidden_units: config.get_int("model", "hidden_units", d.hidden_units as i64) as usize,
        batch_size: config.get_int("model", "batch_size", d.batch_size as i64) as usize,
        learning_rate: config.get_double("model", "learning_rate", d.learning_rate),
        epochs: config.get_int("model", "epochs", d.epochs as i64) as usize,
        seed: config.get_int("model", "seed", d.seed as i64) as u64,
        clip_norm: config.get_double("model", "clip_norm", d.clip_norm),
        validation_ratio: config.get_double("model", "validation_ratio", d.validation_ratio),
        patience: config.get_int("model", "patience", d.patience as i64) as usize,
    })
}

/// Grid, model kinds and the base config every grid point starts from.
pub fn build_search_config(
    config: &dyn ConfigPort,
    base: &TrainConfig,
) -> Result<(ParamGrid, Vec<RecurrentKind>, TrainConfig), ForecastError> {
    validate_search_config(config)?;
    let defaults = ParamGrid::default();

    let usize_axis = |key: &str, fallback: Vec<usize>| match config.get_string("search", key) {
        Some(raw) => parse_usize_list(&raw, "search", key),
        None => Ok(fallback),
    };
    let grid = ParamGrid {
        window_sizes: usize_axis("window_sizes", defaults.window_sizes)?,
        hidden_units: usize_axis("hidden_units", defaults.hidden_units)?,
        batch_sizes: usize_axis("batch_sizes", defaults.batch_sizes)?,
        learning_rates: match config.get_string("search", "learning_rates") {
            Some(raw) => parse_f64_list(&raw, "search", "learning_rates")?,
            None => defaults.learning_rates,
        },
    };
    let kinds = match config.get_string("search", "models") {
        Some(raw) => parse_model_list(&raw)?,
        None => vec![RecurrentKind::Lstm, RecurrentKind::Gru],
    };
    let base = TrainConfig {
        epochs: config.get_int("search", "epochs", base.epochs as i64) as usize,
        ..base.clone()
    };
    Ok((grid, kinds, base))
}

fn adapter_for(settings: &PipelineSettings) -> CsvAdapter {
    CsvAdapter::new(PathBuf::from(".")).with_output_dir(settings.output_dir.clone())
}

/// Stage 1 to 4 in memory. Downstream stages re-derive the scalers this way
/// instead of reading them back from disk.
pub fn load_prepared(
    data_port: &dyn DataPort,
    settings: &PipelineSettings,
) -> Result<PreparedData, ForecastError> {
    let source = settings.input.display().to_string();
    let bars = data_port.fetch_ohlcv(&source)?;
    prepare(&bars, &settings.indicators)
}

pub fn run_prepare_stage(
    data_port: &dyn DataPort,
    settings: &PipelineSettings,
) -> Result<PreparedData, ForecastError> {
    let prepared = load_prepared(data_port, settings)?;
    data_port.write_snapshot("normalized", &prepared.normalized)?;
    data_port.write_snapshot("indicators", &prepared.with_indicators)?;
    data_port.write_snapshot("prepared", &prepared.frame)?;

    println!(
        "Prepared {} rows ({} warm-up rows dropped), columns: {}",
        prepared.frame.len(),
        prepared.rows_dropped,
        prepared.frame.column_names().join(", ")
    );
    Ok(prepared)
}

pub fn run_plot_stage(
    data_port: &dyn DataPort,
    prepared: &PreparedData,
) -> Result<Vec<PathBuf>, ForecastError> {
    chart_svg::stage_charts(&prepared.with_indicators)?
        .into_iter()
        .map(|(name, svg)| data_port.write_artifact(&name, &svg))
        .collect()
}

/// Held-out predictions as a frame: scaled columns, then price columns when present.
pub fn forecast_frame(forecast: &Forecast) -> Result<PriceFrame, ForecastError> {
    let mut frame = PriceFrame::new(forecast.dates.clone());
    frame.insert_column("actual", forecast.actual.clone())?;
    frame.insert_column("predicted", forecast.predicted.clone())?;
    if let Some(price) = &forecast.price {
        frame.insert_column("actual_price", price.actual.clone())?;
        frame.insert_column("predicted_price", price.predicted.clone())?;
    }
    Ok(frame)
}

fn print_forecast(forecast: &Forecast) {
    println!(
        "{} ({} train / {} test samples)",
        forecast.model,
        forecast.train_samples,
        forecast.actual.len()
    );
    println!("  scaled: {}", forecast.metrics);
    if let Some(price) = &forecast.price {
        println!("  price:  {}", price.metrics);
    }
}

fn write_forecast(
    data_port: &dyn DataPort,
    name: &str,
    forecast: &Forecast,
) -> Result<(), ForecastError> {
    data_port.write_snapshot(name, &forecast_frame(forecast)?)?;
    data_port.write_artifact(&format!("{}.svg", name), &chart_svg::prediction_chart(forecast))?;
    Ok(())
}

pub fn run_baseline_stage(
    data_port: &dyn DataPort,
    settings: &PipelineSettings,
    prepared: &PreparedData,
) -> Result<Forecast, ForecastError> {
    let features = settings.feature_columns(&prepared.frame);
    let (model, forecast) = evaluate_baseline(
        &prepared.frame,
        &features,
        &settings.target,
        settings.test_ratio,
        Some(&prepared.price_scaler),
    )?;

    println!("Baseline linear regression (intercept {:.6})", model.intercept);
    for (name, coef) in features.iter().zip(model.coefficients.iter()) {
        println!("  {:<16} {:>12.6}", name, coef);
    }
    print_forecast(&forecast);
    write_forecast(data_port, "baseline_predictions", &forecast)?;
    Ok(forecast)
}

pub fn run_train_stage(
    data_port: &dyn DataPort,
    settings: &PipelineSettings,
    prepared: &PreparedData,
    kind: RecurrentKind,
    config: &TrainConfig,
) -> Result<(TrainReport, Forecast), ForecastError> {
    let features = settings.feature_columns(&prepared.frame);
    let (report, forecast) = evaluate_sequence_model(
        kind,
        &prepared.frame,
        &features,
        &settings.target,
        config,
        settings.test_ratio,
        Some(&prepared.price_scaler),
    )?;

    println!(
        "{} trained for {} epochs{}",
        kind,
        report.epochs_run,
        if report.stopped_early { " (early stop)" } else { "" }
    );
    for (epoch, loss) in report.train_loss.iter().enumerate() {
        match report.val_loss.get(epoch) {
            Some(val) => println!(
                "  epoch {:>3}: loss {:.6}  val_loss {:.6}",
                epoch + 1,
                loss,
                val
            ),
            None => println!("  epoch {:>3}: loss {:.6}", epoch + 1, loss),
        }
    }
    print_forecast(&forecast);
    write_forecast(
        data_port,
        &format!("{}_predictions", kind.to_string().to_lowercase()),
        &forecast,
    )?;
    Ok((report, forecast))
}

pub fn print_search_outcome(outcome: &SearchOutcome) {
    println!(
        "{:<4} {:<5} {:>6} {:>6} {:>6} {:>8} {:>7} {:>10} {:>10}",
        "rank", "model", "window", "hidden", "batch", "lr", "epochs", "test_rmse", "price_rmse"
    );
    for (rank, r) in outcome.results.iter().enumerate() {
        println!(
            "{:<4} {:<5} {:>6} {:>6} {:>6} {:>8} {:>7} {:>10.6} {:>10}",
            rank + 1,
            r.kind.to_string(),
            r.point.window,
            r.point.hidden_units,
            r.point.batch_size,
            r.point.learning_rate,
            r.epochs_run,
            r.metrics.rmse,
            r.price_metrics
                .map(|m| format!("{:.4}", m.rmse))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    for best in &outcome.best {
        println!(
            "best {}: window={} hidden={} batch={} lr={} (test RMSE {:.6})",
            best.kind,
            best.point.window,
            best.point.hidden_units,
            best.point.batch_size,
            best.point.learning_rate,
            best.metrics.rmse
        );
    }
    if outcome.skipped > 0 {
        println!("{} combinations skipped", outcome.skipped);
    }
}

pub fn run_search_stage(
    data_port: &dyn DataPort,
    settings: &PipelineSettings,
    prepared: &PreparedData,
    kinds: &[RecurrentKind],
    grid: &ParamGrid,
    base: &TrainConfig,
) -> Result<SearchOutcome, ForecastError> {
    let features = settings.feature_columns(&prepared.frame);
    let data = SearchData {
        frame: &prepared.frame,
        features: &features,
        target: &settings.target,
        test_ratio: settings.test_ratio,
        price_scaler: Some(&prepared.price_scaler),
    };
    let outcome = grid_search(&data, kinds, grid, base)?;
    print_search_outcome(&outcome);
    data_port.write_artifact("search_results.csv", &search_results_csv(&outcome.results)?)?;
    Ok(outcome)
}

fn run_prepare(
    config_path: &Path,
    input: Option<&Path>,
    out_dir: Option<&Path>,
) -> Result<(), ForecastError> {
    let config = load_config(config_path)?;
    let settings = build_pipeline_settings(&config, input, out_dir)?;
    run_prepare_stage(&adapter_for(&settings), &settings)?;
    Ok(())
}

fn run_plot(config_path: &Path, out_dir: Option<&Path>) -> Result<(), ForecastError> {
    let config = load_config(config_path)?;
    let settings = build_pipeline_settings(&config, None, out_dir)?;
    let port = adapter_for(&settings);
    let prepared = load_prepared(&port, &settings)?;
    for path in run_plot_stage(&port, &prepared)? {
        println!("Chart written to: {}", path.display());
    }
    Ok(())
}

fn run_baseline(config_path: &Path, out_dir: Option<&Path>) -> Result<(), ForecastError> {
    let config = load_config(config_path)?;
    let settings = build_pipeline_settings(&config, None, out_dir)?;
    let port = adapter_for(&settings);
    let prepared = load_prepared(&port, &settings)?;
    run_baseline_stage(&port, &settings, &prepared)?;
    Ok(())
}

fn run_train(
    config_path: &Path,
    kind: RecurrentKind,
    out_dir: Option<&Path>,
) -> Result<(), ForecastError> {
    let config = load_config(config_path)?;
    let settings = build_pipeline_settings(&config, None, out_dir)?;
    let train_config = build_train_config(&config)?;
    let port = adapter_for(&settings);
    let prepared = load_prepared(&port, &settings)?;
    run_train_stage(&port, &settings, &prepared, kind, &train_config)?;
    Ok(())
}

fn run_search(
    config_path: &Path,
    models: Option<Vec<RecurrentKind>>,
    out_dir: Option<&Path>,
) -> Result<(), ForecastError> {
    let config = load_config(config_path)?;
    let settings = build_pipeline_settings(&config, None, out_dir)?;
    let train_config = build_train_config(&config)?;
    let (grid, configured_kinds, base) = build_search_config(&config, &train_config)?;
    let kinds = models.unwrap_or(configured_kinds);

    let port = adapter_for(&settings);
    let prepared = load_prepared(&port, &settings)?;
    run_search_stage(&port, &settings, &prepared, &kinds, &grid, &base)?;
    Ok(())
}

fn run_all(config_path: &Path, out_dir: Option<&Path>) -> Result<(), ForecastError> {
    let config = load_config(config_path)?;
    let settings = build_pipeline_settings(&config, None, out_dir)?;
    let train_config = build_train_config(&config)?;
    let (grid, kinds, base) = build_search_config(&config, &train_config)?;
    let port = adapter_for(&settings);
    run_pipeline(&port, &settings, &train_config, &kinds, &grid, &base)
}

/// Every stage in order against one data port.
pub fn run_pipeline(
    data_port: &dyn DataPort,
    settings: &PipelineSettings,
    train_config: &TrainConfig,
    kinds: &[RecurrentKind],
    grid: &ParamGrid,
    search_base: &TrainConfig,
) -> Result<(), ForecastError> {
    let prepared = run_prepare_stage(data_port, settings)?;
    run_plot_stage(data_port, &prepared)?;
    run_baseline_stage(data_port, settings, &prepared)?;
    for &kind in kinds {
        run_train_stage(data_port, settings, &prepared, kind, train_config)?;
    }
    run_search_stage(data_port, settings, &prepared, kinds, grid, search_base)?;
    log::info!("pipeline complete, outputs in {}", settings.output_dir.display());
    Ok(())
}
