//! Standalone SVG line charts for prices, indicators and predictions.

use crate::domain::error::ForecastError;
use crate::domain::forecast::Forecast;
use crate::domain::frame::PriceFrame;
use chrono::NaiveDate;

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 320.0;
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 40.0;

const PALETTE: [&str; 6] = ["#2563eb", "#dc2626", "#16a34a", "#9333ea", "#ea580c", "#0891b2"];

/// One named line.
#[derive(Debug, Clone)]
pub struct ChartSeries {
    pub label: String,
    pub values: Vec<f64>,
}

impl ChartSeries {
    pub fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn svg_open(title: &str) -> String {
    let mut svg = format!(
        r##"<svg width="{}" height="{}" viewBox="0 0 {} {}" xmlns="http://www.w3.org/2000/svg">"##,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    );
    svg.push_str("\n  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"20\" font-size=\"14\" fill=\"#111\">{}</text>\n",
        MARGIN_LEFT,
        escape(title)
    ));
    svg
}

fn placeholder(title: &str) -> String {
    let mut svg = svg_open(title);
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"14\" fill=\"#666\">No data</text>\n",
        CHART_WIDTH / 2.0,
        CHART_HEIGHT / 2.0
    ));
    svg.push_str("</svg>");
    svg
}

/// Path data for one series; a non-finite value ends the current segment.
fn path_data(
    values: &[f64],
    x_scale: impl Fn(usize) -> f64,
    y_scale: impl Fn(f64) -> f64,
) -> String {
    let mut data = String::new();
    let mut pen_down = false;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            pen_down = false;
            continue;
        }
        let cmd = if pen_down { "L" } else { "M" };
        if !data.is_empty() {
            data.push(' ');
        }
        data.push_str(&format!("{} {:.1} {:.1}", cmd, x_scale(i), y_scale(v)));
        pen_down = true;
    }
    data
}

/// Renders every series against a shared date axis. Series shorter than
/// `dates` are drawn over their own length.
pub fn render_line_chart(title: &str, dates: &[NaiveDate], series: &[ChartSeries]) -> String {
    let finite = || {
        series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .filter(|v| v.is_finite())
    };
    if dates.is_empty() || finite().next().is_none() {
        return placeholder(title);
    }

    let min = finite().fold(f64::INFINITY, f64::min);
    let max = finite().fold(f64::NEG_INFINITY, f64::max);
    let range = if max > min { max - min } else { 1.0 };

    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let last = (dates.len() - 1).max(1) as f64;

    let x_scale = |i: usize| -> f64 { MARGIN_LEFT + (i as f64 / last) * plot_width };
    let y_scale = |v: f64| -> f64 { MARGIN_TOP + plot_height - ((v - min) / range) * plot_height };

    let mut svg = svg_open(title);
    svg.push_str(&format!(
        "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        CHART_HEIGHT - MARGIN_BOTTOM
    ));
    svg.push_str(&format!(
        "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        CHART_HEIGHT - MARGIN_BOTTOM,
        CHART_WIDTH - MARGIN_RIGHT,
        CHART_HEIGHT - MARGIN_BOTTOM
    ));

    for (value, y) in [
        (max, MARGIN_TOP + 5.0),
        ((max + min) / 2.0, MARGIN_TOP + plot_height / 2.0),
        (min, CHART_HEIGHT - MARGIN_BOTTOM - 5.0),
    ] {
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{:.4}</text>\n",
            MARGIN_LEFT - 5.0,
            y,
            value
        ));
    }

    let first_date = dates[0];
    let last_date = dates[dates.len() - 1];
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" text-anchor=\"start\" font-size=\"10\" fill=\"#666\">{}</text>\n",
        MARGIN_LEFT,
        CHART_HEIGHT - 10.0,
        first_date
    ));
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{}</text>\n",
        CHART_WIDTH - MARGIN_RIGHT,
        CHART_HEIGHT - 10.0,
        last_date
    ));

    for (k, s) in series.iter().enumerate() {
        let color = PALETTE[k % PALETTE.len()];
        let len = s.values.len().min(dates.len());
        let data = path_data(&s.values[..len], x_scale, y_scale);
        if !data.is_empty() {
            svg.push_str(&format!(
                "  <path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.5\"/>\n",
                data, color
            ));
        }

        let legend_x = CHART_WIDTH - MARGIN_RIGHT - 140.0;
        let legend_y = MARGIN_TOP + 14.0 * k as f64;
        svg.push_str(&format!(
            "  <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"2\"/>\n",
            legend_x,
            legend_y,
            legend_x + 16.0,
            legend_y,
            color
        ));
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" font-size=\"10\" fill=\"#333\">{}</text>\n",
            legend_x + 20.0,
            legend_y + 3.0,
            escape(&s.label)
        ));
    }

    svg.push_str("</svg>");
    svg
}

fn frame_series(frame: &PriceFrame, names: &[&str]) -> Vec<ChartSeries> {
    names
        .iter()
        .filter_map(|name| {
            frame
                .column(name)
                .ok()
                .map(|values| ChartSeries::new(*name, values.to_vec()))
        })
        .collect()
}

fn columns_with_prefix<'a>(frame: &'a PriceFrame, prefixes: &[&str]) -> Vec<&'a str> {
    frame
        .column_names()
        .iter()
        .map(|n| n.as_str())
        .filter(|n| prefixes.iter().any(|p| n.starts_with(p)))
        .collect()
}

/// Close with any moving averages present in the frame.
pub fn price_chart(frame: &PriceFrame) -> String {
    let mut names = vec!["close"];
    names.extend(columns_with_prefix(frame, &["sma_", "ema_"]));
    render_line_chart("Close and moving averages", frame.dates(), &frame_series(frame, &names))
}

pub fn oscillator_chart(frame: &PriceFrame) -> String {
    let names = columns_with_prefix(frame, &["rsi_"]);
    render_line_chart("RSI", frame.dates(), &frame_series(frame, &names))
}

pub fn risk_chart(frame: &PriceFrame) -> String {
    let names = columns_with_prefix(frame, &["volatility_", "atr_"]);
    render_line_chart("Volatility and ATR", frame.dates(), &frame_series(frame, &names))
}

/// Actual against predicted, in price units when available.
pub fn prediction_chart(forecast: &Forecast) -> String {
    let (actual, predicted, unit) = match &forecast.price {
        Some(p) => (p.actual.clone(), p.predicted.clone(), "price"),
        None => (forecast.actual.clone(), forecast.predicted.clone(), "scaled"),
    };
    render_line_chart(
        &format!("{} next-day forecast ({})", forecast.model, unit),
        &forecast.dates,
        &[
            ChartSeries::new("actual", actual),
            ChartSeries::new("predicted", predicted),
        ],
    )
}

/// Charts written by the `plot` stage: (file name, svg).
pub fn stage_charts(frame: &PriceFrame) -> Result<Vec<(String, String)>, ForecastError> {
    if frame.is_empty() {
        return Err(ForecastError::NoData {
            source_name: "chart input".into(),
        });
    }
    Ok(vec![
        ("price.svg".to_string(), price_chart(frame)),
        ("rsi.svg".to_string(), oscillator_chart(frame)),
        ("risk.svg".to_string(), risk_chart(frame)),
    ])
}
