//! Session bootstrap: telemetry, the stdio connection and the dispatch loop.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use loom_config::Config;
use loom_rpc::{Connection, DispatchError};

use crate::frontend::Frontend;
use crate::placeholder_frontend::PlaceholderFrontend;
use crate::server::Server;
use crate::telemetry::{self, TelemetryError};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Errors that stop a session before it can serve requests.
#[derive(Debug, Error)]
pub enum RunError {
    /// The tracing subscriber could not be installed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The method table could not be built.
    #[error("failed to register handlers: {source}")]
    Dispatch {
        /// Underlying registration error.
        #[source]
        source: DispatchError,
    },
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The client sent `shutdown` before the connection ended.
    Clean,
    /// The connection ended without a `shutdown` request.
    Abandoned,
}

impl SessionOutcome {
    /// Process exit status for this outcome.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Clean => 0,
            Self::Abandoned => 1,
        }
    }
}

/// Serves one session over stdin and stdout with the built-in front end.
///
/// # Errors
///
/// Returns [`RunError`] when telemetry or handler registration fails.
pub fn run(config: &Config) -> Result<SessionOutcome, RunError> {
    telemetry::initialise(config).map_err(|source| RunError::Telemetry { source })?;
    info!(
        target: BOOTSTRAP_TARGET,
        version = env!("CARGO_PKG_VERSION"),
        queue_capacity = config.queue_capacity(),
        "starting language server on stdio"
    );
    let connection = Arc::new(Connection::new(
        io::stdin(),
        io::stdout(),
        config.queue_capacity(),
    ));
    serve_connection(&connection, PlaceholderFrontend)
}

/// Serves one session over an existing, not yet started connection.
///
/// Returns once the connection has ended and every queued response has been
/// written.
///
/// # Errors
///
/// Returns [`RunError::Dispatch`] when handler registration fails; the
/// connection is not started in that case.
pub fn serve_connection<F>(
    connection: &Arc<Connection>,
    frontend: F,
) -> Result<SessionOutcome, RunError>
where
    F: Frontend + 'static,
{
    let server = Arc::new(Server::new(frontend, Arc::clone(connection)));
    let table = server
        .dispatch_table()
        .map_err(|source| RunError::Dispatch { source })?;

    connection.start();
    table.serve(connection);
    connection.close();
    connection.join_writer();

    for error in connection.errors() {
        warn!(target: BOOTSTRAP_TARGET, %error, "connection failed");
    }

    let outcome = if server.shutdown_requested() {
        SessionOutcome::Clean
    } else {
        SessionOutcome::Abandoned
    };
    info!(target: BOOTSTRAP_TARGET, ?outcome, "session ended");
    Ok(outcome)
}
