//! Language-server session state and the handlers bound to each method.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lsp_types::notification::{
    DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument, Exit, Initialized,
    Notification as LspNotification, PublishDiagnostics,
};
use lsp_types::request::{HoverRequest, Initialize, Request as LspRequest, Shutdown};
use lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams, Hover,
    HoverContents, HoverParams, HoverProviderCapability, InitializeParams, InitializeResult,
    InitializedParams, MarkupContent, MarkupKind, Position, PublishDiagnosticsParams, Range,
    ServerCapabilities, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, Uri,
};
use tracing::{debug, info, warn};

use loom_documents::DocumentStore;
use loom_rpc::{
    DispatchError, DispatchTable, ErrorCode, Notification, ResponseError, adapt_notification,
    adapt_request,
};

use crate::client::Client;
use crate::diagnostics;
use crate::frontend::Frontend;

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// One language-server session.
///
/// Holds the open documents and the lifecycle flags, and publishes
/// diagnostics through `C` whenever a document's text changes.
#[derive(Debug)]
pub struct Server<F, C> {
    frontend: F,
    client: C,
    documents: DocumentStore,
    initialized: AtomicBool,
    shutdown_requested: AtomicBool,
}

impl<F, C> Server<F, C>
where
    F: Frontend + 'static,
    C: Client + 'static,
{
    /// Creates a session with no open documents.
    #[must_use]
    pub fn new(frontend: F, client: C) -> Self {
        Self {
            frontend,
            client,
            documents: DocumentStore::new(),
            initialized: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
        }
    }

    /// Documents currently open in the session.
    #[must_use]
    pub const fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Whether the client has sent `shutdown`.
    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Builds the dispatch table routing every supported method to this
    /// session.
    ///
    /// # Errors
    ///
    /// Propagates [`DispatchError`] from registration.
    pub fn dispatch_table(self: &Arc<Self>) -> Result<DispatchTable, DispatchError> {
        let mut table = DispatchTable::new();

        table.register_request(
            Initialize::METHOD,
            adapt_request({
                let server = Arc::clone(self);
                move |params| server.initialize(&params)
            }),
        )?;
        table.register_request(
            Shutdown::METHOD,
            adapt_request({
                let server = Arc::clone(self);
                move |()| server.shutdown()
            }),
        )?;
        table.register_request(
            HoverRequest::METHOD,
            adapt_request({
                let server = Arc::clone(self);
                move |params| server.hover(&params)
            }),
        )?;

        table.register_notification(
            Initialized::METHOD,
            adapt_notification({
                let server = Arc::clone(self);
                move |params| server.initialized(&params)
            }),
        )?;
        table.register_notification(
            Exit::METHOD,
            adapt_notification({
                let server = Arc::clone(self);
                move |()| server.exit()
            }),
        )?;
        table.register_notification(
            DidOpenTextDocument::METHOD,
            adapt_notification({
                let server = Arc::clone(self);
                move |params| server.did_open(params)
            }),
        )?;
        table.register_notification(
            DidChangeTextDocument::METHOD,
            adapt_notification({
                let server = Arc::clone(self);
                move |params| server.did_change(&params)
            }),
        )?;
        table.register_notification(
            DidCloseTextDocument::METHOD,
            adapt_notification({
                let server = Arc::clone(self);
                move |params| server.did_close(params)
            }),
        )?;

        Ok(table)
    }

    pub(crate) fn initialize(
        &self,
        params: &InitializeParams,
    ) -> Result<InitializeResult, ResponseError> {
        self.reject_after_shutdown()?;
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(ResponseError::invalid_request(
                "initialize may only be sent once",
            ));
        }
        let client_name = params
            .client_info
            .as_ref()
            .map_or("unknown", |client| client.name.as_str());
        info!(target: SERVER_TARGET, client = client_name, "session initialised");

        Ok(InitializeResult {
            capabilities: capabilities(),
            server_info: Some(ServerInfo {
                name: String::from(env!("CARGO_PKG_NAME")),
                version: Some(String::from(env!("CARGO_PKG_VERSION"))),
            }),
        })
    }

    pub(crate) fn initialized(&self, _params: &InitializedParams) {
        debug!(
            target: SERVER_TARGET,
            initialized = self.initialized.load(Ordering::Acquire),
            "client confirmed initialisation"
        );
    }

    pub(crate) fn shutdown(&self) -> Result<(), ResponseError> {
        self.require_initialized()?;
        if !self.shutdown_requested.swap(true, Ordering::AcqRel) {
            info!(target: SERVER_TARGET, "shutdown requested");
        }
        Ok(())
    }

    pub(crate) fn exit(&self) {
        info!(
            target: SERVER_TARGET,
            clean = self.shutdown_requested(),
            "exit received, closing connection"
        );
        self.client.close();
    }

    pub(crate) fn did_open(&self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        debug!(target: SERVER_TARGET, uri = item.uri.as_str(), version = item.version, "opened");
        self.documents.open(item.uri.as_str(), item.text, item.version);
        self.publish(item.uri);
    }

    pub(crate) fn did_change(&self, params: &DidChangeTextDocumentParams) {
        let identifier = &params.text_document;
        let accepted = self.documents.apply_full_change(
            identifier.uri.as_str(),
            &params.content_changes,
            identifier.version,
        );
        if accepted {
            self.publish(identifier.uri.clone());
        }
    }

    pub(crate) fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        if !self.documents.close(uri.as_str()) {
            debug!(target: SERVER_TARGET, uri = uri.as_str(), "closed a document that was not open");
        }
        self.send_diagnostics(diagnostics::cleared(uri));
    }

    pub(crate) fn hover(&self, params: &HoverParams) -> Result<Option<Hover>, ResponseError> {
        self.reject_after_shutdown()?;
        self.require_initialized()?;
        let location = &params.text_document_position_params;
        let uri = location.text_document.uri.as_str();
        let Some(document) = self.documents.get(uri) else {
            return Err(ResponseError::invalid_params(format!(
                "document not open: {uri}"
            )));
        };

        let line_number = location.position.line;
        let Some(line) = usize::try_from(line_number)
            .ok()
            .and_then(|index| document.line(index))
        else {
            return Ok(None);
        };

        let width = u32::try_from(line.encode_utf16().count()).unwrap_or(u32::MAX);
        Ok(Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::PlainText,
                value: String::from(line),
            }),
            range: Some(Range::new(
                Position::new(line_number, 0),
                Position::new(line_number, width),
            )),
        }))
    }

    fn publish(&self, uri: Uri) {
        let Some(snapshot) = self.documents.get(uri.as_str()) else {
            return;
        };
        self.send_diagnostics(diagnostics::analyse(&self.frontend, uri, &snapshot));
    }

    fn send_diagnostics(&self, params: PublishDiagnosticsParams) {
        let count = params.diagnostics.len();
        let notification = match Notification::with_params(PublishDiagnostics::METHOD, &params) {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(target: SERVER_TARGET, %error, "failed to encode diagnostics");
                return;
            }
        };
        match self.client.notify(notification) {
            Ok(()) => debug!(
                target: SERVER_TARGET,
                uri = params.uri.as_str(),
                count,
                "published diagnostics"
            ),
            Err(error) => warn!(target: SERVER_TARGET, %error, "failed to publish diagnostics"),
        }
    }

    fn reject_after_shutdown(&self) -> Result<(), ResponseError> {
        if self.shutdown_requested() {
            return Err(ResponseError::invalid_request("server is shutting down"));
        }
        Ok(())
    }

    fn require_initialized(&self) -> Result<(), ResponseError> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(ResponseError::new(
                ErrorCode::ServerNotInitialized,
                "server has not been initialised",
            ));
        }
        Ok(())
    }
}

fn capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::INCREMENTAL),
                ..TextDocumentSyncOptions::default()
            },
        )),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        ..ServerCapabilities::default()
    }
}
