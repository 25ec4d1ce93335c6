//! Entry point for the `loomd` binary.

use std::io::{self, Write};
use std::process::ExitCode;

use loom_config::{Config, ConfigError};

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(loaded) => loaded,
        Err(ConfigError::Arguments(error)) => {
            // Also covers `--help` and `--version`, which clap reports as errors.
            error.print().ok();
            return ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(2));
        }
    };

    match loomd::run(&config) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(error) => {
            writeln!(io::stderr(), "loomd: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
