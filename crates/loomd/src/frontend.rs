//! The analysis seam between the server and a language front end.

use lsp_types::Range;

/// A located problem reported by a front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    /// Where the problem is, in LSP coordinates.
    pub range: Range,
    /// Human-readable description.
    pub message: String,
}

impl SourceError {
    /// Creates an error covering `range`.
    #[must_use]
    pub fn new(range: Range, message: impl Into<String>) -> Self {
        Self {
            range,
            message: message.into(),
        }
    }
}

/// Parser and semantic analyser for one language.
///
/// The server runs the three phases in order on a snapshot of a document
/// every time its text changes. Each phase returns its problems alongside its
/// product so a partial result can still feed the next phase.
pub trait Frontend: Send + Sync {
    /// Syntax tree produced by [`Frontend::parse`].
    type Module;
    /// Scope tree produced by [`Frontend::build_scopes`].
    type Scopes;
    /// Resolved symbol table produced by [`Frontend::resolve`].
    type Symbols;

    /// Parses `text`, returning the tree and syntax errors in source order.
    fn parse(&self, text: &str) -> (Self::Module, Vec<SourceError>);

    /// Builds the scope tree of a parsed module.
    fn build_scopes(&self, module: &Self::Module) -> Self::Scopes;

    /// Resolves names, returning semantic errors in source order.
    fn resolve(
        &self,
        module: &Self::Module,
        scopes: &Self::Scopes,
    ) -> (Vec<SourceError>, Self::Symbols);
}
