//! Turns front-end findings into `textDocument/publishDiagnostics` payloads.

use lsp_types::{Diagnostic, DiagnosticSeverity, PublishDiagnosticsParams, Uri};

use loom_documents::Document;

use crate::frontend::{Frontend, SourceError};

/// `source` tag on diagnostics raised by the parser.
pub const SYNTAX_SOURCE: &str = "syntax";
/// `source` tag on diagnostics raised by name resolution.
pub const SEMANTIC_SOURCE: &str = "semantic";

/// Runs every front-end phase over `document` and collects the findings.
///
/// Syntax diagnostics come first, then semantic ones, each in the order the
/// front end reported them. The payload carries the version of the snapshot
/// that was analysed.
#[must_use]
pub fn analyse<F: Frontend>(
    frontend: &F,
    uri: Uri,
    document: &Document,
) -> PublishDiagnosticsParams {
    let (module, syntax_errors) = frontend.parse(document.text());
    let scopes = frontend.build_scopes(&module);
    let (semantic_errors, _symbols) = frontend.resolve(&module, &scopes);

    let diagnostics = syntax_errors
        .into_iter()
        .map(|error| to_diagnostic(error, SYNTAX_SOURCE))
        .chain(
            semantic_errors
                .into_iter()
                .map(|error| to_diagnostic(error, SEMANTIC_SOURCE)),
        )
        .collect();

    PublishDiagnosticsParams::new(uri, diagnostics, Some(document.version()))
}

/// Payload that clears every diagnostic for `uri`.
#[must_use]
pub const fn cleared(uri: Uri) -> PublishDiagnosticsParams {
    PublishDiagnosticsParams {
        uri,
        diagnostics: Vec::new(),
        version: None,
    }
}

fn to_diagnostic(error: SourceError, source: &str) -> Diagnostic {
    Diagnostic {
        range: error.range,
        severity: Some(DiagnosticSeverity::ERROR),
        source: Some(String::from(source)),
        message: error.message,
        ..Diagnostic::default()
    }
}
