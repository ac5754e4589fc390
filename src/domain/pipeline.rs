//! Preparation stages: normalize, compute indicators, post-normalize.

use crate::domain::error::ForecastError;
use crate::domain::frame::{BASE_COLUMNS, PriceFrame};
use crate::domain::indicator::{IndicatorType, compute_indicators};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::scaler::MinMaxScaler;

/// Rows the post-normalizer must leave behind.
pub const MIN_PREPARED_ROWS: usize = 2;

/// Output of stages 2-4 plus the scalers needed to undo them.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub normalized: PriceFrame,
    pub with_indicators: PriceFrame,
    pub frame: PriceFrame,
    pub price_scaler: MinMaxScaler,
    pub indicator_scaler: MinMaxScaler,
    pub indicators: Vec<IndicatorType>,
    pub rows_dropped: usize,
}

/// Min-max scales the base OHLCV columns.
pub fn normalize_stage(frame: &PriceFrame) -> Result<(PriceFrame, MinMaxScaler), ForecastError> {
    if frame.is_empty() {
        return Err(ForecastError::NoData {
            source_name: "price frame".into(),
        });
    }
    let columns: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    let scaler = MinMaxScaler::fit(frame, &columns)?;
    let scaled = scaler.transform(frame)?;
    Ok((scaled, scaler))
}

pub fn indicator_stage(
    frame: &PriceFrame,
    indicators: &[IndicatorType],
) -> Result<PriceFrame, ForecastError> {
    compute_indicators(frame, indicators)
}

/// Drops warm-up rows, then rescales only the indicator columns.
pub fn post_normalize_stage(
    frame: &PriceFrame,
    indicators: &[IndicatorType],
) -> Result<(PriceFrame, MinMaxScaler, usize), ForecastError> {
    let mut out = frame.clone();
    let dropped = out.drop_undefined_rows();
    if out.len() < MIN_PREPARED_ROWS {
        return Err(ForecastError::InsufficientData {
            stage: "post-normalize".into(),
            rows: out.len(),
            minimum: MIN_PREPARED_ROWS,
        });
    }

    let columns: Vec<String> = indicators.iter().map(|i| i.column_name()).collect();
    let scaler = MinMaxScaler::fit(&out, &columns)?;
    let scaled = scaler.transform(&out)?;
    Ok((scaled, scaler, dropped))
}

pub fn prepare(
    bars: &[OhlcvBar],
    indicators: &[IndicatorType],
) -> Result<PreparedData, ForecastError> {
    let raw = PriceFrame::from_bars(bars);

    let (normalized, price_scaler) = normalize_stage(&raw)?;
    log::info!("normalized {} rows", normalized.len());

    let with_indicators = indicator_stage(&normalized, indicators)?;
    log::info!(
        "computed {} indicators: {}",
        indicators.len(),
        indicators
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let (frame, indicator_scaler, rows_dropped) =
        post_normalize_stage(&with_indicators, indicators)?;
    log::info!(
        "dropped {} warm-up rows, {} rows remain",
        rows_dropped,
        frame.len()
    );

    Ok(PreparedData {
        normalized,
        with_indicators,
        frame,
        price_scaler,
        indicator_scaler,
        indicators: indicators.to_vec(),
        rows_dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(n: usize) -> Vec<OhlcvBar> {
        (0..n)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.2;
                OhlcvBar {
                    date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
                        + chrono::Days::new(i as u64),
                    open: base - 0.5,
                    high: base + 1.0,
                    low: base - 1.0,
                    close: base,
                    volume: 1000.0 + (i % 7) as f64 * 100.0,
                }
            })
            .collect()
    }

    #[test]
    fn normalize_stage_bounds_base_columns() {
        let frame = PriceFrame::from_bars(&bars(40));
        let (scaled, scaler) = normalize_stage(&frame).unwrap();
        for name in BASE_COLUMNS {
            let col = scaled.column(name).unwrap();
            assert!(col.iter().all(|v| (0.0..=1.0).contains(v)), "{}", name);
        }
        assert_eq!(scaler.columns().count(), 5);
    }

    #[test]
    fn normalize_stage_rejects_empty() {
        let frame = PriceFrame::from_bars(&[]);
        assert!(matches!(
            normalize_stage(&frame),
            Err(ForecastError::NoData { .. })
        ));
    }

    #[test]
    fn prepare_drops_largest_warmup() {
        let indicators = vec![
            IndicatorType::Sma(5),
            IndicatorType::Rsi(10),
            IndicatorType::Atr(3),
        ];
        let prepared = prepare(&bars(50), &indicators).unwrap();
        // RSI(10) leaves the first 10 rows undefined
        assert_eq!(prepared.rows_dropped, 10);
        assert_eq!(prepared.frame.len(), 40);
        assert_eq!(prepared.normalized.len(), 50);
        assert_eq!(prepared.with_indicators.len(), 50);
        for ind in &indicators {
            let col = prepared.frame.column(&ind.column_name()).unwrap();
            assert!(col.iter().all(|v| (0.0..=1.0).contains(v)));
            let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
            assert_eq!(min, 0.0);
        }
    }

    #[test]
    fn prepare_keeps_price_scaler_for_inverse() {
        let input = bars(30);
        let prepared = prepare(&input, &[IndicatorType::Sma(3)]).unwrap();
        let scaled_close = prepared.frame.column("close").unwrap()[0];
        let restored = prepared
            .price_scaler
            .inverse_value("close", scaled_close)
            .unwrap();
        assert!((restored - input[2].close).abs() < 1e-9);
    }

    #[test]
    fn post_normalize_needs_rows() {
        let indicators = vec![IndicatorType::Sma(30)];
        let err = prepare(&bars(30), &indicators).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData { rows: 1, minimum: 2, .. }
        ));
    }
}
