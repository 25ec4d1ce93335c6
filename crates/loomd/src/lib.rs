//! The Loom language server.
//!
//! `loomd` wires the transport from [`loom_rpc`] and the document store from
//! [`loom_documents`] into an LSP session: it answers the lifecycle requests,
//! keeps open documents in sync with the editor, and republishes diagnostics
//! from a pluggable [`Frontend`] after every change.
//!
//! The session runs on stdio. Logs go to stderr through [`tracing`], filtered
//! and formatted according to [`loom_config::Config`].

mod bootstrap;
mod client;
mod diagnostics;
mod frontend;
mod placeholder_frontend;
mod server;
mod telemetry;

pub use bootstrap::{RunError, SessionOutcome, run, serve_connection};
pub use client::Client;
pub use diagnostics::{SEMANTIC_SOURCE, SYNTAX_SOURCE, analyse, cleared};
pub use frontend::{Frontend, SourceError};
pub use placeholder_frontend::PlaceholderFrontend;
pub use server::Server;
pub use telemetry::{TelemetryError, initialise as initialise_telemetry};

#[cfg(test)]
mod tests;
