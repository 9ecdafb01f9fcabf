//! Metrics collection and export module.
//!
//! This module owns the Prometheus registry the exporter renders on every
//! scrape. Nothing is registered in the process-wide default registry.
//!
//! # Submodules
//!
//! - `prom` - Prometheus gauge family and text exposition

pub mod prom;

pub use prom::{ExpiryGauges, METRIC_NAME};
