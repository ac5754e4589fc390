//! Domain error types.

/// Top-level error type for nextclose.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("csv error in {file}: {reason}")]
    Csv { file: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no usable rows in {source_name}")]
    NoData { source_name: String },

    #[error("insufficient data for {stage}: have {rows} rows, need {minimum}")]
    InsufficientData {
        stage: String,
        rows: usize,
        minimum: usize,
    },

    #[error("column not found: {name}")]
    ColumnMissing { name: String },

    #[error("length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("scaler was not fitted on column {name}")]
    ScalerColumn { name: String },

    #[error("model error: {reason}")]
    Model { reason: String },
}

impl From<&ForecastError> for std::process::ExitCode {
    fn from(err: &ForecastError) -> Self {
        let code: u8 = match err {
            ForecastError::Io(_) | ForecastError::Csv { .. } => 1,
            ForecastError::ConfigParse { .. }
            | ForecastError::ConfigMissing { .. }
            | ForecastError::ConfigInvalid { .. } => 2,
            ForecastError::NoData { .. }
            | ForecastError::InsufficientData { .. }
            | ForecastError::ColumnMissing { .. }
            | ForecastError::LengthMismatch { .. } => 5,
            ForecastError::ScalerColumn { .. } | ForecastError::Model { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
