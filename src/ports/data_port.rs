//! Data access port trait.

use crate::domain::error::ForecastError;
use crate::domain::frame::PriceFrame;
use crate::domain::ohlcv::OhlcvBar;
use std::path::PathBuf;

pub trait DataPort {
    /// Cleaned bars, sorted ascending with unique dates.
    fn fetch_ohlcv(&self, source: &str) -> Result<Vec<OhlcvBar>, ForecastError>;

    /// Persists a stage output under `name` and returns where it went.
    fn write_snapshot(&self, name: &str, frame: &PriceFrame) -> Result<PathBuf, ForecastError>;

    fn read_snapshot(&self, name: &str) -> Result<PriceFrame, ForecastError>;

    /// Writes a rendered artifact (chart, results table) as-is.
    fn write_artifact(&self, file_name: &str, contents: &str) -> Result<PathBuf, ForecastError>;
}
