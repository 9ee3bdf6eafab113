//! Structured logging to stdout.
//!
//! Secrets, signatures and raw tokens are never passed to these macros.
//! Callers log identifiers (client id, key id, issuer, user id) only.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when it is set.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .flatten_event(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Standard log event names.
pub mod events {
    /// Service is starting up.
    pub const STARTUP: &str = "startup";

    /// HTTP listener is bound.
    pub const LISTENING: &str = "listening";

    /// A launch passed verification.
    pub const LAUNCH_VERIFIED: &str = "launch_verified";

    /// A launch was rejected.
    pub const LAUNCH_REJECTED: &str = "launch_rejected";

    /// A score was accepted by the platform.
    pub const GRADE_SUBMITTED: &str = "grade_submitted";

    /// Grade passback failed at any step.
    pub const GRADE_FAILED: &str = "grade_failed";

    /// A platform key set was fetched and cached.
    pub const KEYSET_REFRESHED: &str = "keyset_refreshed";

    /// The code runner could not be reached or returned garbage.
    pub const EXECUTION_FAILED: &str = "execution_failed";
}

#[macro_export]
macro_rules! log_startup {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::STARTUP,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_listening {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::LISTENING,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_launch_verified {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::LAUNCH_VERIFIED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_launch_rejected {
    ($($field:tt)*) => {
        tracing::warn!(
            event = $crate::logging::events::LAUNCH_REJECTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_grade_submitted {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::GRADE_SUBMITTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_grade_failed {
    ($($field:tt)*) => {
        tracing::error!(
            event = $crate::logging::events::GRADE_FAILED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_keyset_refreshed {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::KEYSET_REFRESHED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_execution_failed {
    ($($field:tt)*) => {
        tracing::error!(
            event = $crate::logging::events::EXECUTION_FAILED,
            $($field)*
        )
    };
}
