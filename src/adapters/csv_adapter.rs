//! CSV loader for raw OHLCV files, plus frame snapshots.

use crate::domain::error::ForecastError;
use crate::domain::frame::PriceFrame;
use crate::domain::grid_search::SearchResult;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

const REQUIRED_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

pub struct CsvAdapter {
    base_path: PathBuf,
    output_dir: PathBuf,
}

impl CsvAdapter {
    /// Sources and snapshots both resolve against `base_path`.
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            output_dir: base_path.clone(),
            base_path,
        }
    }

    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }

    fn snapshot_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.csv", name))
    }

    fn ensure_output_dir(&self) -> Result<(), ForecastError> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(&self, source: &str) -> Result<Vec<OhlcvBar>, ForecastError> {
        load_ohlcv(&self.base_path.join(source))
    }

    fn write_snapshot(&self, name: &str, frame: &PriceFrame) -> Result<PathBuf, ForecastError> {
        self.ensure_output_dir()?;
        let path = self.snapshot_path(name);
        write_frame(frame, &path)?;
        log::info!("wrote {} ({} rows)", path.display(), frame.len());
        Ok(path)
    }

    fn read_snapshot(&self, name: &str) -> Result<PriceFrame, ForecastError> {
        read_frame(&self.snapshot_path(name))
    }

    fn write_artifact(&self, file_name: &str, contents: &str) -> Result<PathBuf, ForecastError> {
        self.ensure_output_dir()?;
        let path = self.output_dir.join(file_name);
        fs::write(&path, contents)?;
        log::info!("wrote {}", path.display());
        Ok(path)
    }
}

fn csv_error(file: &str, reason: impl std::fmt::Display) -> ForecastError {
    ForecastError::Csv {
        file: file.to_string(),
        reason: reason.to_string(),
    }
}

/// Date part of a calendar date or timestamp in one of the accepted layouts.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.date_naive());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|ts| ts.date())
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse().ok()
}

pub fn load_ohlcv(path: &Path) -> Result<Vec<OhlcvBar>, ForecastError> {
    let file = fs::File::open(path).map_err(|e| csv_error(&path.display().to_string(), e))?;
    parse_ohlcv(file, &path.display().to_string())
}

/// Reads raw OHLCV rows. Header names are matched case-insensitively and
/// extra columns (e.g. `Adj Close`) are ignored. Rows with a bad date, a
/// missing number or impossible prices are skipped; a repeated date keeps
/// the last row seen.
pub fn parse_ohlcv<R: Read>(reader: R, source_name: &str) -> Result<Vec<OhlcvBar>, ForecastError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers().map_err(|e| csv_error(source_name, e))?.clone();

    let mut index = [0usize; 6];
    for (slot, name) in index.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| csv_error(source_name, format!("missing column '{}'", name)))?;
    }
    let [date_i, open_i, high_i, low_i, close_i, volume_i] = index;

    let mut by_date: BTreeMap<NaiveDate, OhlcvBar> = BTreeMap::new();
    let mut skipped = 0usize;

    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| csv_error(source_name, e))?;
        let row = line + 2;

        let Some(date) = record.get(date_i).and_then(parse_date) else {
            log::warn!("{}:{}: unparseable date, row skipped", source_name, row);
            skipped += 1;
            continue;
        };

        let values =
            [open_i, high_i, low_i, close_i, volume_i].map(|i| parse_number(record.get(i)));
        let [Some(open), Some(high), Some(low), Some(close), Some(volume)] = values else {
            log::warn!("{}:{}: missing or non-numeric field, row skipped", source_name, row);
            skipped += 1;
            continue;
        };

        let bar = OhlcvBar {
            date,
            open,
            high,
            low,
            close,
            volume,
        };
        if !bar.is_sane() {
            log::warn!("{}:{}: implausible prices for {}, row skipped", source_name, row, date);
            skipped += 1;
            continue;
        }
        if by_date.insert(date, bar).is_some() {
            log::warn!("{}:{}: duplicate date {}, keeping the later row", source_name, row, date);
        }
    }

    if by_date.is_empty() {
        return Err(ForecastError::NoData {
            source_name: source_name.to_string(),
        });
    }
    log::info!(
        "loaded {} rows from {} ({} skipped)",
        by_date.len(),
        source_name,
        skipped
    );
    Ok(by_date.into_values().collect())
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

pub fn write_frame(frame: &PriceFrame, path: &Path) -> Result<(), ForecastError> {
    let file = path.display().to_string();
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(&file, e))?;

    let mut header = vec!["date".to_string()];
    header.extend(frame.column_names().iter().cloned());
    wtr.write_record(&header).map_err(|e| csv_error(&file, e))?;

    for (i, date) in frame.dates().iter().enumerate() {
        let mut record = vec![date.format("%Y-%m-%d").to_string()];
        record.extend(frame.row(i).into_iter().map(format_value));
        wtr.write_record(&record).map_err(|e| csv_error(&file, e))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_frame(path: &Path) -> Result<PriceFrame, ForecastError> {
    let file = path.display().to_string();
    let reader = fs::File::open(path).map_err(|e| csv_error(&file, e))?;
    parse_frame(reader, &file)
}

/// Reads a `date,<columns…>` snapshot. Empty fields become NaN.
pub fn parse_frame<R: Read>(reader: R, source_name: &str) -> Result<PriceFrame, ForecastError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().map_err(|e| csv_error(source_name, e))?.clone();
    if !headers.get(0).is_some_and(|h| h.eq_ignore_ascii_case("date")) {
        return Err(csv_error(source_name, "first column must be 'date'"));
    }

    let names: Vec<String> = headers.iter().skip(1).map(|h| h.to_string()).collect();
    let mut dates = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| csv_error(source_name, e))?;
        let row = line + 2;
        let date = record
            .get(0)
            .and_then(parse_date)
            .ok_or_else(|| csv_error(source_name, format!("row {}: invalid date", row)))?;
        if dates.last().is_some_and(|prev| *prev >= date) {
            return Err(csv_error(
                source_name,
                format!("row {}: dates must be strictly ascending", row),
            ));
        }
        dates.push(date);

        for (j, column) in columns.iter_mut().enumerate() {
            let field = record.get(j + 1).unwrap_or("").trim();
            let value = if field.is_empty() {
                f64::NAN
            } else {
                field.parse().map_err(|e| {
                    csv_error(
                        source_name,
                        format!("row {}: column '{}': {}", row, names[j], e),
                    )
                })?
            };
            column.push(value);
        }
    }

    let mut frame = PriceFrame::new(dates);
    for (name, values) in names.iter().zip(columns) {
        frame.insert_column(name, values)?;
    }
    Ok(frame)
}

/// Ranked search results as CSV text.
pub fn search_results_csv(results: &[SearchResult]) -> Result<String, ForecastError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([
        "rank",
        "model",
        "window",
        "hidden_units",
        "batch_size",
        "learning_rate",
        "epochs_run",
        "best_val_loss",
        "test_mse",
        "test_rmse",
        "test_mae",
        "price_rmse",
        "price_mape",
    ])
    .map_err(|e| csv_error("search results", e))?;

    for (rank, r) in results.iter().enumerate() {
        let price = r.price_metrics;
        wtr.write_record([
            (rank + 1).to_string(),
            r.kind.to_string(),
            r.point.window.to_string(),
            r.point.hidden_units.to_string(),
            r.point.batch_size.to_string(),
            r.point.learning_rate.to_string(),
            r.epochs_run.to_string(),
            r.best_val_loss.map(format_value).unwrap_or_default(),
            format_value(r.metrics.mse),
            format_value(r.metrics.rmse),
            format_value(r.metrics.mae),
            price.map(|m| format_value(m.rmse)).unwrap_or_default(),
            price.map(|m| format_value(m.mape)).unwrap_or_default(),
        ])
        .map_err(|e| csv_error("search results", e))?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| csv_error("search results", e.error()))?;
    String::from_utf8(bytes).map_err(|e| csv_error("search results", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn parse(content: &str) -> Result<Vec<OhlcvBar>, ForecastError> {
        parse_ohlcv(content.as_bytes(), "test.csv")
    }

    #[test]
    fn parse_ohlcv_reads_standard_layout() {
        let bars = parse(
            "Date,Open,High,Low,Close,Adj Close,Volume\n\
             2024-01-15,100.0,110.0,90.0,105.0,104.0,50000\n\
             2024-01-16,105.0,115.0,100.0,110.0,109.0,60000\n",
        )
        .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, date(2024, 1, 15));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[1].volume, 60000.0);
    }

    #[test]
    fn parse_ohlcv_skips_short_rows() {
        let bars = parse(
            "date,open,high,low,close,volume\n\
             2024-01-02,1.0,2.0,1.0,1.5,10\n\
             2024-01-03,1.0,2.0,1.0,1.5\n\
             2024-01-04,1.5,2.5,1.2,2.0,12\n",
        )
        .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, date(2024, 1, 2));
        assert_eq!(bars[1].date, date(2024, 1, 4));
    }

    #[test]
    fn parse_ohlcv_sorts_and_keeps_last_duplicate() {
        let bars = parse(
            "date,open,high,low,close,volume\n\
             2024-01-17,1,2,1,1.5,10\n\
             2024-01-15,1,2,1,1.2,10\n\
             2024-01-17,1,2,1,1.9,10\n",
        )
        .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, date(2024, 1, 15));
        assert_eq!(bars[1].close, 1.9);
    }

    #[test]
    fn parse_ohlcv_skips_bad_rows() {
        let bars = parse(
            "date,open,high,low,close,volume\n\
             not-a-date,1,2,1,1.5,10\n\
             2024-01-16,1,,1,1.5,10\n\
             2024-01-17,1,2,1,abc,10\n\
             2024-01-18,1,0.5,1,0.8,10\n\
             2024-01-19,-1,2,1,1.5,10\n\
             2024-01-22,1,2,1,1.5,10\n",
        )
        .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, date(2024, 1, 22));
    }

    #[test]
    fn parse_ohlcv_accepts_alternate_dates() {
        let bars = parse(
            "date,open,high,low,close,volume\n\
             2024/02/01,1,2,1,1.5,10\n\
             02/02/2024,1,2,1,1.5,10\n\
             2024-02-05T00:00:00Z,1,2,1,1.5,10\n\
             2024-02-06 16:00:00,1,2,1,1.5,10\n",
        )
        .unwrap();
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 2, 1), date(2024, 2, 2), date(2024, 2, 5), date(2024, 2, 6)]
        );
    }

    #[test]
    fn parse_ohlcv_requires_columns() {
        let err = parse("date,open,high,low,close\n2024-01-01,1,2,1,1\n").unwrap_err();
        assert!(matches!(err, ForecastError::Csv { reason, .. } if reason.contains("volume")));
    }

    #[test]
    fn parse_ohlcv_empty_is_no_data() {
        let err = parse("date,open,high,low,close,volume\n").unwrap_err();
        assert!(matches!(err, ForecastError::NoData { .. }));
        let err = parse("date,open,high,low,close,volume\nbad,1,1,1,1,1\n").unwrap_err();
        assert!(matches!(err, ForecastError::NoData { .. }));
    }

    #[test]
    fn missing_file_is_csv_error() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let err = adapter.fetch_ohlcv("nope.csv").unwrap_err();
        assert!(matches!(err, ForecastError::Csv { .. }));
    }

    #[test]
    fn snapshot_round_trip_keeps_nan() {
        let dir = TempDir::new().unwrap();
        let adapter =
            CsvAdapter::new(dir.path().to_path_buf()).with_output_dir(dir.path().join("out"));

        let mut frame = PriceFrame::new(vec![date(2024, 3, 1), date(2024, 3, 4)]);
        frame.insert_column("close", vec![0.25, 1.0]).unwrap();
        frame.insert_column("sma_2", vec![f64::NAN, 0.625]).unwrap();

        let path = adapter.write_snapshot("indicators", &frame).unwrap();
        assert!(path.ends_with("out/indicators.csv"));
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().nth(1), Some("2024-03-01,0.25,"));

        let back = adapter.read_snapshot("indicators").unwrap();
        assert_eq!(back.dates(), frame.dates());
        assert_eq!(back.column_names(), frame.column_names());
        assert!(back.column("sma_2").unwrap()[0].is_nan());
        assert_eq!(back.column("sma_2").unwrap()[1], 0.625);
    }

    #[test]
    fn parse_frame_rejects_unordered_dates() {
        let err = parse_frame(
            "date,close\n2024-01-02,1\n2024-01-01,2\n".as_bytes(),
            "snap.csv",
        )
        .unwrap_err();
        assert!(matches!(err, ForecastError::Csv { .. }));
    }

    #[test]
    fn write_artifact_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvAdapter::new(dir.path().join("charts"));
        let path = adapter.write_artifact("price.svg", "<svg/>").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "<svg/>");
    }
}
