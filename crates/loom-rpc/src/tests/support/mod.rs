//! In-memory stream doubles and a client-side peer for connection tests.

use std::io::{self, BufReader, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};

pub(crate) use crate::test_support::pipe;
use crate::test_support::{PipeReader, PipeWriter};
use crate::{Connection, FrameReader, FrameWriter, Message};

/// Reader whose every read fails.
pub(crate) struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("boom"))
    }
}

/// Writer whose every write fails.
pub(crate) struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream gone"))
    }
}

/// Writer whose writes block until its gate is dropped, then fail.
pub(crate) struct StalledWriter {
    gate: Receiver<()>,
}

impl Write for StalledWriter {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        self.gate.recv().ok();
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream released"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Creates a stalled writer and the gate that releases it.
pub(crate) fn stalled_writer() -> (Sender<()>, StalledWriter) {
    let (gate, receiver) = mpsc::channel();
    (gate, StalledWriter { gate: receiver })
}

/// The client side of a connection under test.
pub(crate) struct Peer {
    writer: Option<FrameWriter<PipeWriter>>,
    raw: Option<PipeWriter>,
    reader: FrameReader<BufReader<PipeReader>>,
}

impl Peer {
    pub(crate) fn send(&mut self, message: impl Into<Message>) {
        self.writer
            .as_mut()
            .expect("peer input is open")
            .write_message(&message.into())
            .expect("peer write should succeed");
    }

    pub(crate) fn send_raw(&mut self, bytes: &[u8]) {
        self.raw
            .as_mut()
            .expect("peer input is open")
            .write_all(bytes)
            .expect("peer write should succeed");
    }

    /// Next message written by the connection, or `None` once its write
    /// thread has exited.
    pub(crate) fn receive(&mut self) -> Option<Message> {
        self.reader
            .read_message()
            .expect("connection output should be well framed")
    }

    /// Ends the connection's input stream.
    pub(crate) fn close_input(&mut self) {
        self.writer = None;
        self.raw = None;
    }
}

/// Creates an unstarted connection wired to a fresh peer.
pub(crate) fn connected(capacity: usize) -> (Connection, Peer) {
    let (peer_output, connection_input) = pipe();
    let (connection_output, peer_input) = pipe();
    let raw = peer_output.clone();
    let connection = Connection::new(connection_input, connection_output, capacity);
    let peer = Peer {
        writer: Some(FrameWriter::new(peer_output)),
        raw: Some(raw),
        reader: FrameReader::new(BufReader::new(peer_input)),
    };
    (connection, peer)
}
