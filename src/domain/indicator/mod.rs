//! Technical indicator engine.
//!
//! Each indicator maps an ordered series to an [`IndicatorSeries`] of the
//! same length. Warm-up positions hold `None`; when an indicator is written
//! into a [`PriceFrame`] they become `NaN`.

pub mod atr;
pub mod ema;
pub mod rsi;
pub mod sma;
pub mod volatility;

use crate::domain::error::ForecastError;
use crate::domain::frame::PriceFrame;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Volatility(usize),
    Atr(usize),
}

impl IndicatorType {
    pub fn period(&self) -> usize {
        match self {
            IndicatorType::Sma(n)
            | IndicatorType::Ema(n)
            | IndicatorType::Rsi(n)
            | IndicatorType::Volatility(n)
            | IndicatorType::Atr(n) => *n,
        }
    }

    /// Leading rows left undefined by this indicator.
    pub fn warmup(&self) -> usize {
        let n = self.period();
        match self {
            IndicatorType::Sma(_) | IndicatorType::Ema(_) | IndicatorType::Atr(_) => {
                n.saturating_sub(1)
            }
            IndicatorType::Rsi(_) | IndicatorType::Volatility(_) => n,
        }
    }

    /// Column name used in frames and snapshots.
    pub fn column_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(n) => write!(f, "sma_{}", n),
            IndicatorType::Ema(n) => write!(f, "ema_{}", n),
            IndicatorType::Rsi(n) => write!(f, "rsi_{}", n),
            IndicatorType::Volatility(n) => write!(f, "volatility_{}", n),
            IndicatorType::Atr(n) => write!(f, "atr_{}", n),
        }
    }
}

impl FromStr for IndicatorType {
    type Err = String;

    /// Accepts `SMA(20)` or `sma_20`, case-insensitive. `VOL` is an alias for
    /// `VOLATILITY`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (name, period) = if let Some(open) = s.find('(') {
            let close = s
                .rfind(')')
                .filter(|c| *c > open)
                .ok_or_else(|| format!("unbalanced parentheses in '{}'", s))?;
            (&s[..open], &s[open + 1..close])
        } else if let Some(sep) = s.rfind('_') {
            (&s[..sep], &s[sep + 1..])
        } else {
            return Err(format!("expected NAME(period) or name_period, got '{}'", s));
        };

        let period: usize = period
            .trim()
            .parse()
            .map_err(|_| format!("invalid period in '{}'", s))?;
        if period == 0 {
            return Err(format!("period must be positive in '{}'", s));
        }

        match name.trim() {
            "sma" => Ok(IndicatorType::Sma(period)),
            "ema" => Ok(IndicatorType::Ema(period)),
            "rsi" => Ok(IndicatorType::Rsi(period)),
            "volatility" | "vol" => Ok(IndicatorType::Volatility(period)),
            "atr" => Ok(IndicatorType::Atr(period)),
            other => Err(format!("unknown indicator '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn undefined(indicator_type: IndicatorType, len: usize) -> Self {
        Self {
            indicator_type,
            values: vec![None; len],
        }
    }

    pub fn first_valid(&self) -> Option<usize> {
        self.values.iter().position(Option::is_some)
    }

    /// Values with `None` mapped to `NaN`.
    pub fn to_column(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }
}

pub fn default_indicators() -> Vec<IndicatorType> {
    vec![
        IndicatorType::Sma(20),
        IndicatorType::Ema(20),
        IndicatorType::Rsi(14),
        IndicatorType::Volatility(20),
        IndicatorType::Atr(14),
    ]
}

/// Parses a comma separated indicator list such as `SMA(20), RSI(14)`.
pub fn parse_indicator_list(list: &str) -> Result<Vec<IndicatorType>, String> {
    let mut out = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let ind: IndicatorType = item.parse()?;
        if !out.contains(&ind) {
            out.push(ind);
        }
    }
    Ok(out)
}

pub fn calculate(
    frame: &PriceFrame,
    indicator: IndicatorType,
) -> Result<IndicatorSeries, ForecastError> {
    let close = frame.column("close")?;
    let series = match indicator {
        IndicatorType::Sma(n) => sma::calculate_sma(close, n),
        IndicatorType::Ema(n) => ema::calculate_ema(close, n),
        IndicatorType::Rsi(n) => rsi::calculate_rsi(close, n),
        IndicatorType::Volatility(n) => volatility::calculate_volatility(close, n),
        IndicatorType::Atr(n) => {
            atr::calculate_atr(frame.column("high")?, frame.column("low")?, close, n)
        }
    };
    Ok(series)
}

/// Returns a copy of `frame` with one column appended per indicator.
pub fn compute_indicators(
    frame: &PriceFrame,
    indicators: &[IndicatorType],
) -> Result<PriceFrame, ForecastError> {
    let mut out = frame.clone();
    for indicator in indicators {
        let series = calculate(frame, *indicator)?;
        log::debug!(
            "computed {} (first defined row {:?})",
            indicator,
            series.first_valid()
        );
        out.insert_column(&indicator.column_name(), series.to_column())?;
    }
    Ok(out)
}
