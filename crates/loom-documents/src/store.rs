//! Concurrent store of open documents keyed by URI.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lsp_types::TextDocumentContentChangeEvent;
use tracing::debug;

use crate::{DOCUMENTS_TARGET, Document, apply_range_edit};

/// Thread-safe map from URI to the latest known [`Document`].
///
/// Reads may run concurrently; every mutation, including a whole batch of
/// incremental changes, happens under a single write lock. Updates whose
/// version does not exceed the stored version are ignored, as are updates to
/// documents that are not open.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl DocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `text` as the content of `uri`, replacing any existing entry
    /// regardless of its version.
    pub fn open(&self, uri: &str, text: impl Into<String>, version: i32) {
        let document = Document::new(uri, text, version);
        debug!(target: DOCUMENTS_TARGET, uri, version, "document opened");
        self.write().insert(String::from(uri), document);
    }

    /// Returns a copy of the document stored for `uri`.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<Document> {
        self.read().get(uri).cloned()
    }

    /// Forgets `uri`. Returns whether the document was open.
    #[must_use]
    pub fn close(&self, uri: &str) -> bool {
        let removed = self.write().remove(uri).is_some();
        debug!(target: DOCUMENTS_TARGET, uri, removed, "document closed");
        removed
    }

    /// Replaces the text of `uri` when `version` is newer than the stored
    /// one. Returns whether the store changed.
    #[must_use]
    pub fn update(&self, uri: &str, text: impl Into<String>, version: i32) -> bool {
        let mut documents = self.write();
        let Some(document) = accept_version(&mut documents, uri, version) else {
            return false;
        };
        document.replace(text, version);
        true
    }

    /// Applies a `didChange` batch declared as full-document sync.
    ///
    /// When the last change carries no range its text becomes the new
    /// content and earlier changes are superseded. When it carries a range
    /// the batch is applied in order through [`Self::apply_incremental`]. An
    /// empty batch changes nothing.
    #[must_use]
    pub fn apply_full_change(
        &self,
        uri: &str,
        changes: &[TextDocumentContentChangeEvent],
        version: i32,
    ) -> bool {
        match changes.last() {
            None => false,
            Some(last) if last.range.is_none() => self.update(uri, last.text.as_str(), version),
            Some(_) => self.apply_incremental(uri, changes, version),
        }
    }

    /// Applies `changes` in order and stores the result at `version`.
    ///
    /// Each ranged change edits the text produced by the previous change; a
    /// change without a range replaces everything accumulated so far. The
    /// version is checked before any change is applied, and the whole batch
    /// commits under one write lock. An empty batch changes nothing.
    #[must_use]
    pub fn apply_incremental(
        &self,
        uri: &str,
        changes: &[TextDocumentContentChangeEvent],
        version: i32,
    ) -> bool {
        if changes.is_empty() {
            return false;
        }
        let mut documents = self.write();
        let Some(document) = accept_version(&mut documents, uri, version) else {
            return false;
        };
        let updated = changes
            .iter()
            .fold(String::from(document.text()), |current, change| {
                match change.range {
                    Some(range) => apply_range_edit(&current, range, &change.text),
                    None => change.text.clone(),
                }
            });
        document.replace(updated, version);
        true
    }

    /// Number of open documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no documents are open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// URIs of all open documents, sorted.
    #[must_use]
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.read().keys().cloned().collect();
        uris.sort_unstable();
        uris
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Document>> {
        self.documents.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Document>> {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn accept_version<'a>(
    documents: &'a mut HashMap<String, Document>,
    uri: &str,
    version: i32,
) -> Option<&'a mut Document> {
    let Some(document) = documents.get_mut(uri) else {
        debug!(target: DOCUMENTS_TARGET, uri, version, "ignoring change to unopened document");
        return None;
    };
    if version <= document.version() {
        debug!(
            target: DOCUMENTS_TARGET,
            uri,
            version,
            stored = document.version(),
            "ignoring stale change"
        );
        return None;
    }
    Some(document)
}
