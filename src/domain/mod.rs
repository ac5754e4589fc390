//! Core domain types and logic.

pub mod ohlcv;
pub mod frame;
pub mod scaler;
pub mod indicator;
pub mod pipeline;
pub mod dataset;
pub mod linear;
pub mod rnn;
pub mod metrics;
pub mod forecast;
pub mod grid_search;
pub mod config_validation;
pub mod error;
