//! Resource footprint dashboard for Cortex / Prometheus ingestion setups.
//!
//! The library holds everything that does not draw pixels: loading the
//! measurements, filtering, chart aggregation and the estimators. The
//! `footprint-dash` binary wraps it in an egui window.

pub mod chart;
pub mod color;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod estimate;
