//! Configuration validation.
//!
//! Checks every INI field before a pipeline stage runs, so a bad value fails
//! fast with the section and key that caused it.

use crate::domain::error::ForecastError;
use crate::domain::indicator::parse_indicator_list;
use crate::domain::rnn::RecurrentKind;
use crate::ports::config_port::ConfigPort;

/// The input path is resolved separately since the CLI may override it.
pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), ForecastError> {
    validate_test_ratio(config)?;
    validate_indicators(config)?;
    validate_target(config)?;
    Ok(())
}

pub fn validate_model_config(config: &dyn ConfigPort) -> Result<(), ForecastError> {
    for key in ["window", "hidden_units", "batch_size", "epochs"] {
        validate_positive_int(config, "model", key)?;
    }
    validate_non_negative_int(config, "model", "patience")?;
    validate_non_negative_int(config, "model", "seed")?;
    if let Some(lr) = read_double(config, "model", "learning_rate")? {
        validate_learning_rate("model", "learning_rate", lr)?;
    }

    let clip = read_double(config, "model", "clip_norm")?.unwrap_or(5.0);
    if clip < 0.0 {
        return Err(invalid("model", "clip_norm", "clip_norm must be non-negative"));
    }
    let val = read_double(config, "model", "validation_ratio")?.unwrap_or(0.1);
    if !(0.0..1.0).contains(&val) {
        return Err(invalid(
            "model",
            "validation_ratio",
            "validation_ratio must be in [0, 1)",
        ));
    }
    Ok(())
}

pub fn validate_search_config(config: &dyn ConfigPort) -> Result<(), ForecastError> {
    for key in ["window_sizes", "hidden_units", "batch_sizes"] {
        if let Some(raw) = config.get_string("search", key) {
            parse_usize_list(&raw, "search", key)?;
        }
    }
    if let Some(raw) = config.get_string("search", "learning_rates") {
        for lr in parse_f64_list(&raw, "search", "learning_rates")? {
            validate_learning_rate("search", "learning_rates", lr)?;
        }
    }
    if let Some(raw) = config.get_string("search", "models") {
        parse_model_list(&raw)?;
    }
    if config.get_string("search", "epochs").is_some() {
        validate_positive_int(config, "search", "epochs")?;
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ForecastError {
    ForecastError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_test_ratio(config: &dyn ConfigPort) -> Result<(), ForecastError> {
    let value = read_double(config, "data", "test_ratio")?.unwrap_or(0.2);
    if value <= 0.0 || value >= 1.0 {
        return Err(invalid("data", "test_ratio", "test_ratio must be between 0 and 1"));
    }
    Ok(())
}

fn validate_indicators(config: &dyn ConfigPort) -> Result<(), ForecastError> {
    if let Some(list) = config.get_string("indicators", "list") {
        parse_indicator_list(&list).map_err(|reason| invalid("indicators", "list", reason))?;
    }
    Ok(())
}

fn validate_target(config: &dyn ConfigPort) -> Result<(), ForecastError> {
    match config.get_string("features", "target") {
        Some(s) if s.trim().is_empty() => {
            Err(invalid("features", "target", "target must not be empty"))
        }
        _ => Ok(()),
    }
}

/// Missing keys fall back to their defaults and pass; present keys must parse.
fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, ForecastError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{}' is not an integer", raw.trim()))),
    }
}

fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, ForecastError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, format!("'{}' is not a number", raw.trim()))),
        },
    }
}

fn validate_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), ForecastError> {
    match read_int(config, section, key)? {
        Some(v) if v < 1 => Err(invalid(section, key, format!("{} must be at least 1", key))),
        _ => Ok(()),
    }
}

fn validate_non_negative_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), ForecastError> {
    match read_int(config, section, key)? {
        Some(v) if v < 0 => Err(invalid(section, key, format!("{} must be non-negative", key))),
        _ => Ok(()),
    }
}

fn validate_learning_rate(section: &str, key: &str, value: f64) -> Result<(), ForecastError> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(invalid(section, key, "learning rate must be in (0, 1]"));
    }
    Ok(())
}

/// Comma-separated positive integers, e.g. `10, 20, 30`.
pub fn parse_usize_list(raw: &str, section: &str, key: &str) -> Result<Vec<usize>, ForecastError> {
    let values = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(v) if v > 0 => Ok(v),
            _ => Err(invalid(section, key, format!("'{}' is not a positive integer", s))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.is_empty() {
        return Err(invalid(section, key, "list is empty"));
    }
    Ok(values)
}

pub fn parse_f64_list(raw: &str, section: &str, key: &str) -> Result<Vec<f64>, ForecastError> {
    let values = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| invalid(section, key, format!("'{}' is not a number", s)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.is_empty() {
        return Err(invalid(section, key, "list is empty"));
    }
    Ok(values)
}

/// `lstm,gru` in the order given, duplicates removed.
pub fn parse_model_list(raw: &str) -> Result<Vec<RecurrentKind>, ForecastError> {
    let mut kinds = Vec::new();
    for part in raw.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let kind: RecurrentKind = part
            .parse()
            .map_err(|reason: String| invalid("search", "models", reason))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(invalid("search", "models", "no models listed"));
    }
    Ok(kinds)
}
