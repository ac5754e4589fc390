#![allow(dead_code)]

use chrono::NaiveDate;
use nextclose::domain::error::ForecastError;
use nextclose::domain::frame::PriceFrame;
pub use nextclose::domain::ohlcv::OhlcvBar;
use nextclose::ports::data_port::DataPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

/// In-memory data port that records everything written to it.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    pub snapshots: RefCell<HashMap<String, PriceFrame>>,
    pub artifacts: RefCell<HashMap<String, String>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            snapshots: RefCell::new(HashMap::new()),
            artifacts: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_bars(mut self, source: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(source.to_string(), bars);
        self
    }

    pub fn with_error(mut self, source: &str, reason: &str) -> Self {
        self.errors.insert(source.to_string(), reason.to_string());
        self
    }

    pub fn snapshot(&self, name: &str) -> Option<PriceFrame> {
        self.snapshots.borrow().get(name).cloned()
    }

    pub fn artifact(&self, name: &str) -> Option<String> {
        self.artifacts.borrow().get(name).cloned()
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(&self, source: &str) -> Result<Vec<OhlcvBar>, ForecastError> {
        if let Some(reason) = self.errors.get(source) {
            return Err(ForecastError::Csv {
                file: source.to_string(),
                reason: reason.clone(),
            });
        }
        match self.data.get(source) {
            Some(bars) if !bars.is_empty() => Ok(bars.clone()),
            _ => Err(ForecastError::NoData {
                source_name: source.to_string(),
            }),
        }
    }

    fn write_snapshot(&self, name: &str, frame: &PriceFrame) -> Result<PathBuf, ForecastError> {
        self.snapshots
            .borrow_mut()
            .insert(name.to_string(), frame.clone());
        Ok(PathBuf::from(format!("{}.csv", name)))
    }

    fn read_snapshot(&self, name: &str) -> Result<PriceFrame, ForecastError> {
        self.snapshot(name).ok_or_else(|| ForecastError::NoData {
            source_name: name.to_string(),
        })
    }

    fn write_artifact(&self, file_name: &str, contents: &str) -> Result<PathBuf, ForecastError> {
        self.artifacts
            .borrow_mut()
            .insert(file_name.to_string(), contents.to_string());
        Ok(PathBuf::from(file_name))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Deterministic daily bars: an upward drift with two overlapping cycles so
/// every indicator has something to measure.
pub fn generate_bars(start_date: &str, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    (0..count)
        .map(|i| {
            let t = i as f64;
            let close = start_price + 0.15 * t + 3.0 * (t * 0.21).sin() + 1.2 * (t * 0.67).cos();
            OhlcvBar {
                date: start + chrono::Duration::days(i as i64),
                open: close - 0.4 * (t * 0.5).sin(),
                high: close + 1.0 + 0.3 * (t * 0.9).sin().abs(),
                low: close - 1.0 - 0.3 * (t * 0.4).cos().abs(),
                close,
                volume: 10_000.0 + 1_500.0 * (t * 0.3).sin().abs() + (i % 7) as f64 * 100.0,
            }
        })
        .collect()
}

pub fn bars_to_csv(bars: &[OhlcvBar]) -> String {
    let mut out = String::from("Date,Open,High,Low,Close,Adj Close,Volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            b.date, b.open, b.high, b.low, b.close, b.close, b.volume
        ));
    }
    out
}

pub fn write_temp_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
