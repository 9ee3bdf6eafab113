//! Observability for ltigate.
//!
//! This crate provides:
//! - Structured logging (JSON or pretty) with standard event names
//! - A Prometheus metrics registry for launches, grades and outbound calls
//!
//! # Usage
//!
//! ```ignore
//! use ltigate_telemetry::{Telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::new().with_log_level("debug");
//! let telemetry = Telemetry::init(config)?;
//! telemetry.metrics().record_launch("legacy", "verified");
//! ```

pub mod config;
pub mod logging;
pub mod metrics;
pub mod prometheus;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::events;
pub use metrics::MetricsRegistry;
pub use prometheus::{render_metrics, PROMETHEUS_CONTENT_TYPE};

use std::sync::Arc;
use thiserror::Error;

/// Telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}

/// Telemetry handle holding the shared metrics registry.
pub struct Telemetry {
    config: TelemetryConfig,
    metrics: Arc<MetricsRegistry>,
}

impl Telemetry {
    /// Install the global log subscriber and create the metrics registry.
    pub fn init(config: TelemetryConfig) -> Result<Self, TelemetryError> {
        logging::init_logging(&config)?;
        Ok(Self::init_without_logging(config))
    }

    /// Create the metrics registry only.
    ///
    /// Use this when a subscriber is already installed (e.g., in tests).
    pub fn init_without_logging(config: TelemetryConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Shared metrics registry.
    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = TelemetryConfig::new()
            .with_service_name("grader")
            .with_log_level("debug")
            .with_log_format(LogFormat::Pretty);

        assert_eq!(config.service_name, "grader");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_telemetry_init_without_logging_shares_registry() {
        let telemetry = Telemetry::init_without_logging(TelemetryConfig::default());
        telemetry.metrics().record_launch("token", "verified");

        let output = render_metrics(&telemetry.metrics());
        assert!(output.contains("ltigate_launches_total"));
        assert_eq!(telemetry.config().service_name, "ltigate");
    }
}
