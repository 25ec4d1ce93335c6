//! Unit and behavioural tests for the language server.

mod support;

use std::sync::{Arc, Mutex, PoisonError};

use loom_rpc::{ConnectionError, Notification};
use lsp_types::PublishDiagnosticsParams;
use mockall::mock;

use crate::Client;

mock! {
    Editor {}
    impl Client for Editor {
        fn notify(&self, notification: Notification) -> Result<(), ConnectionError>;
        fn close(&self);
    }
}

/// Notifications captured by an editor mock.
type Published = Arc<Mutex<Vec<Notification>>>;

/// Builds a `MockEditor` that accepts any number of notifications and records
/// them, and never expects `close`.
fn recording_editor() -> (MockEditor, Published) {
    let published = Published::default();
    let sink = Arc::clone(&published);
    let mut editor = MockEditor::new();
    editor.expect_notify().returning(move |notification| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    });
    editor.expect_close().never();
    (editor, published)
}

/// Decodes every recorded `publishDiagnostics` payload.
fn diagnostics_of(published: &Published) -> Vec<PublishDiagnosticsParams> {
    published
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|notification| {
            assert_eq!(notification.method, "textDocument/publishDiagnostics");
            notification
                .params_as()
                .expect("diagnostics payload should decode")
        })
        .collect()
}
