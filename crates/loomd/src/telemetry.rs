//! Tracing subscriber installation.
//!
//! Logs always go to stderr; stdout carries the protocol stream.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::EnvFilter;

use loom_config::{Config, LogFormat};

static SUBSCRIBER_INSTALLED: OnceCell<()> = OnceCell::new();

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter directive did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another global subscriber was already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber described by `config`.
///
/// Only the first successful call has an effect; later calls return `Ok`
/// without inspecting `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for a malformed filter and
/// [`TelemetryError::Subscriber`] when a foreign subscriber is already set.
pub fn initialise(config: &Config) -> Result<(), TelemetryError> {
    SUBSCRIBER_INSTALLED
        .get_or_try_init(|| install(config))
        .copied()
}

fn install(config: &Config) -> Result<(), TelemetryError> {
    let subscriber = build_subscriber(config)?;
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn build_subscriber(config: &Config) -> Result<Box<dyn Subscriber + Send + Sync>, TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());

    Ok(match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn rejects_malformed_filter() {
        let config = Config::load_from_iter(["loomd", "--log-filter", "loom=verbose"])
            .expect("flags should parse");
        let result = build_subscriber(&config);
        assert!(matches!(result, Err(TelemetryError::Filter(_))));
    }

    #[rstest]
    #[case("compact")]
    #[case("json")]
    fn builds_each_format(#[case] format: &str) {
        let config = Config::load_from_iter(["loomd", "--log-format", format])
            .expect("flags should parse");
        assert!(build_subscriber(&config).is_ok());
    }
}
