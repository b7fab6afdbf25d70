//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and `RUST_LOG`

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: &str) -> String {
    format!("task_api={level},tower_http={level}")
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(&config.log_level).into());

    let (json, pretty) = match config.log_format {
        LogFormat::Json => (Some(fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter("debug"), "task_api=debug,tower_http=debug");
        assert!(EnvFilter::try_new(default_filter("info")).is_ok());
    }
}
