//! In-memory byte pipes for driving a [`Connection`](crate::Connection) in
//! tests.
//!
//! Compiled for this crate's own tests and, through the `test-support`
//! feature, for dependants' tests.

use std::io::{self, Cursor, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};

/// Write end of an in-memory pipe. Clones write into the same pipe.
#[derive(Debug, Clone)]
pub struct PipeWriter {
    chunks: Sender<Vec<u8>>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.chunks
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read end of an in-memory pipe; reports EOF once every writer is dropped.
#[derive(Debug)]
pub struct PipeReader {
    chunks: Receiver<Vec<u8>>,
    pending: Cursor<Vec<u8>>,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let read = self.pending.read(buf)?;
            if read > 0 || buf.is_empty() {
                return Ok(read);
            }
            match self.chunks.recv() {
                Ok(chunk) => self.pending = Cursor::new(chunk),
                Err(_) => return Ok(0),
            }
        }
    }
}

/// Creates a blocking in-memory pipe.
#[must_use]
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (sender, receiver) = mpsc::channel();
    (
        PipeWriter { chunks: sender },
        PipeReader {
            chunks: receiver,
            pending: Cursor::new(Vec::new()),
        },
    )
}
