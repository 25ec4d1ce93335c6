//! Runtime configuration shared by the Loom server binaries.
//!
//! Configuration is resolved from command-line flags first, then from
//! `LOOM_*` environment variables, then from the defaults in this crate.
//! Editors usually launch the server with no flags at all (or with
//! `--stdio`), so every field has a sensible default.

mod defaults;
mod logging;

use std::ffi::OsString;

use clap::Parser;
use thiserror::Error;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_QUEUE_CAPACITY, default_log_filter, default_log_format,
    default_queue_capacity,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Flags or environment variables could not be parsed.
    #[error(transparent)]
    Arguments(#[from] clap::Error),
}

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(
    name = "loomd",
    version,
    about = "Language-intelligence server speaking LSP over stdio"
)]
pub struct Config {
    /// Tracing filter directive, e.g. `info` or `loom_rpc=debug`.
    #[arg(long, env = "LOOM_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,

    /// Log output format written to stderr.
    #[arg(long, env = "LOOM_LOG_FORMAT", default_value_t = default_log_format())]
    log_format: LogFormat,

    /// Capacity of the inbound and outbound message queues.
    #[arg(
        long,
        env = "LOOM_QUEUE_CAPACITY",
        default_value_t = DEFAULT_QUEUE_CAPACITY,
        value_parser = parse_queue_capacity
    )]
    queue_capacity: usize,

    /// Accepted for compatibility with clients that always pass it; stdio is
    /// the only transport.
    #[arg(long, hide = true)]
    stdio: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: String::from(DEFAULT_LOG_FILTER),
            log_format: default_log_format(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            stdio: false,
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Arguments`] when a flag or environment variable
    /// holds an invalid value. `--help` and `--version` also surface here so
    /// the caller can print them.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is the program name, as with [`std::env::args_os`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Arguments`] when parsing fails.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::try_parse_from(args)?)
    }

    /// Tracing filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Capacity of each connection queue. Always at least one.
    #[must_use]
    pub const fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Whether the client passed `--stdio`.
    #[must_use]
    pub const fn stdio_requested(&self) -> bool {
        self.stdio
    }
}

fn parse_queue_capacity(value: &str) -> Result<usize, String> {
    let capacity: usize = value
        .parse()
        .map_err(|error| format!("invalid queue capacity '{value}': {error}"))?;
    if capacity == 0 {
        return Err(String::from("queue capacity must be at least 1"));
    }
    Ok(capacity)
}
