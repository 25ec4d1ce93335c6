//! Authoritative in-memory store of open documents.
//!
//! The store tracks the text and version of every document the client has
//! opened and applies `textDocument/didChange` batches to it, either as
//! whole-document replacements or as incremental range edits expressed in LSP
//! positions (zero-based lines, UTF-16 columns). Readers always receive
//! clones, so analysis running on a snapshot never observes a half-applied
//! batch and cannot mutate the store behind its back.

mod document;
mod edit;
mod line_index;
mod store;

pub use document::Document;
pub use edit::{apply_range_edit, offset_at};
pub use line_index::LineIndex;
pub use store::DocumentStore;

/// Tracing target for document synchronisation.
pub(crate) const DOCUMENTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::store");

#[cfg(test)]
mod tests;
