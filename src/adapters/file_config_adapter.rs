//! INI file configuration adapter.

use crate::domain::error::ForecastError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ForecastError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| ForecastError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, ForecastError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| ForecastError::ConfigParse {
                file: "<string>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const FULL: &str = r#"
[data]
input = data/AAPL.csv
output_dir = out
test_ratio = 0.2

[indicators]
list = SMA(20), EMA(20), RSI(14)

[features]
columns = close, volume, sma_20
target = close

[model]
window = 30
learning_rate = 0.005
shuffle = yes

[search]
window_sizes = 10, 20, 30
models = lstm,gru
"#;

    #[test]
    fn from_string_parses_config() {
        let adapter = FileConfigAdapter::from_string(FULL).unwrap();
        assert_eq!(
            adapter.get_string("data", "input"),
            Some("data/AAPL.csv".to_string())
        );
        assert_eq!(adapter.get_int("model", "window", 0), 30);
        assert_eq!(adapter.get_double("model", "learning_rate", 0.0), 0.005);
        assert_eq!(adapter.get_double("data", "test_ratio", 0.0), 0.2);
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[model]\nwindow = 10\n").unwrap();
        assert_eq!(adapter.get_string("model", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn numeric_getters_fall_back_to_default() {
        let adapter =
            FileConfigAdapter::from_string("[model]\nwindow = abc\nlearning_rate = fast\n")
                .unwrap();
        assert_eq!(adapter.get_int("model", "window", 42), 42);
        assert_eq!(adapter.get_int("model", "missing", 7), 7);
        assert_eq!(adapter.get_double("model", "learning_rate", 0.5), 0.5);
        assert_eq!(adapter.get_double("model", "missing", 99.9), 99.9);
    }

    #[test]
    fn get_bool_values() {
        let adapter =
            FileConfigAdapter::from_string("[x]\na = true\nb = yes\nc = 0\nd = maybe\n").unwrap();
        assert!(adapter.get_bool("x", "a", false));
        assert!(adapter.get_bool("x", "b", false));
        assert!(!adapter.get_bool("x", "c", true));
        assert!(adapter.get_bool("x", "d", true));
        assert!(!adapter.get_bool("x", "missing", false));
    }

    #[test]
    fn get_list_splits_and_trims() {
        let adapter = FileConfigAdapter::from_string(FULL).unwrap();
        assert_eq!(
            adapter.get_list("features", "columns"),
            Some(vec!["close".to_string(), "volume".to_string(), "sma_20".to_string()])
        );
        assert_eq!(
            adapter.get_list("search", "models"),
            Some(vec!["lstm".to_string(), "gru".to_string()])
        );
        assert_eq!(adapter.get_list("features", "missing"), None);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[data]\ninput = /tmp/prices.csv\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "input"),
            Some("/tmp/prices.csv".to_string())
        );
    }

    #[test]
    fn from_file_missing_is_config_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").err().unwrap();
        assert!(matches!(
            err,
            ForecastError::ConfigParse { file, .. } if file.contains("config.ini")
        ));
    }
}
