//! Front-end double and editor peer shared by the server tests.

use std::io::BufReader;
use std::sync::Arc;

use loom_rpc::test_support::{PipeReader, PipeWriter, pipe};
use loom_rpc::{Connection, FrameReader, FrameWriter, Message};
use lsp_types::{Position, Range};

use crate::{Frontend, SourceError};

/// Front end that reports the same findings for any text.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedFrontend {
    pub(crate) syntax: Vec<SourceError>,
    pub(crate) semantic: Vec<SourceError>,
}

impl ScriptedFrontend {
    pub(crate) fn reporting(syntax: &[&str], semantic: &[&str]) -> Self {
        Self {
            syntax: syntax.iter().map(|message| error_at(0, message)).collect(),
            semantic: semantic.iter().map(|message| error_at(1, message)).collect(),
        }
    }
}

impl Frontend for ScriptedFrontend {
    type Module = usize;
    type Scopes = ();
    type Symbols = ();

    fn parse(&self, text: &str) -> (Self::Module, Vec<SourceError>) {
        (text.len(), self.syntax.clone())
    }

    fn build_scopes(&self, _module: &Self::Module) -> Self::Scopes {}

    fn resolve(
        &self,
        _module: &Self::Module,
        _scopes: &Self::Scopes,
    ) -> (Vec<SourceError>, Self::Symbols) {
        (self.semantic.clone(), ())
    }
}

fn error_at(line: u32, message: &str) -> SourceError {
    SourceError::new(
        Range::new(Position::new(line, 0), Position::new(line, 1)),
        message,
    )
}

/// The editor side of a session under test.
pub(crate) struct EditorPeer {
    writer: Option<FrameWriter<PipeWriter>>,
    reader: FrameReader<BufReader<PipeReader>>,
}

impl EditorPeer {
    pub(crate) fn send(&mut self, message: impl Into<Message>) {
        self.writer
            .as_mut()
            .expect("editor input is open")
            .write_message(&message.into())
            .expect("editor write should succeed");
    }

    /// Next message from the server, or `None` once its output has ended.
    pub(crate) fn receive(&mut self) -> Option<Message> {
        self.reader
            .read_message()
            .expect("server output should be well framed")
    }

    /// Ends the server's input stream.
    pub(crate) fn hang_up(&mut self) {
        self.writer = None;
    }
}

/// Creates an unstarted connection wired to a fresh editor.
pub(crate) fn connected() -> (Arc<Connection>, EditorPeer) {
    let (editor_output, server_input) = pipe();
    let (server_output, editor_input) = pipe();
    let connection = Arc::new(Connection::new(server_input, server_output, 10));
    let editor = EditorPeer {
        writer: Some(FrameWriter::new(editor_output)),
        reader: FrameReader::new(BufReader::new(editor_input)),
    };
    (connection, editor)
}
