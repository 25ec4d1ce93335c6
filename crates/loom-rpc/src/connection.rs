//! Threaded connection with bounded queues and exactly-once shutdown.
//!
//! A read thread decodes frames into the inbound queue and a write thread
//! drains the outbound queue onto the stream. Both queues are bounded: a slow
//! consumer stalls the reader and a slow stream stalls senders, instead of
//! buffering without limit. Whichever of a read failure, a write failure or
//! [`Connection::close`] happens first runs the shutdown sequence; later
//! triggers are ignored.
//!
//! A clean end of input is not a failure: the read thread stops, the
//! inbound queue drains, and the outbound side stays open so requests
//! already received can still be answered before the owner closes the
//! connection.

use std::fmt;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ConnectionError;
use crate::frame::{FrameReader, FrameWriter};
use crate::message::{Message, Notification, Response};

const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

/// Only the first report matters; the spare slot absorbs a racing second one.
const ERROR_QUEUE_CAPACITY: usize = 2;

/// How often an idle [`Incoming`] iterator re-checks for shutdown.
const CLOSED_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long a sender facing a full queue waits before retrying.
const SEND_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Action run once during shutdown, typically closing the underlying stream.
pub type CloseHook = Box<dyn FnOnce() -> io::Result<()> + Send>;

type BoxedReader = Box<dyn Read + Send>;
type BoxedWriter = Box<dyn Write + Send>;

/// Stream ends and queue ends handed to the worker threads by `start`.
struct Streams {
    reader: BoxedReader,
    writer: BoxedWriter,
    inbound: SyncSender<Message>,
    outbound: Receiver<Message>,
}

/// State shared between the caller and the worker threads.
struct Shared {
    closed: AtomicBool,
    outbound: Mutex<Option<SyncSender<Message>>>,
    errors: SyncSender<ConnectionError>,
    close_hook: Mutex<Option<CloseHook>>,
    released: Mutex<bool>,
    latch: Condvar,
}

/// A JSON-RPC connection over a pair of byte streams.
pub struct Connection {
    shared: Arc<Shared>,
    streams: Mutex<Option<Streams>>,
    inbound: Mutex<Receiver<Message>>,
    errors: Mutex<Receiver<ConnectionError>>,
    writer_thread: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("started", &lock(&self.streams).is_none())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a connection reading from `reader` and writing to `writer`.
    ///
    /// `capacity` bounds both the inbound and the outbound queue; zero is
    /// treated as one. Nothing is read or written until [`Self::start`].
    #[must_use]
    pub fn new<R, W>(reader: R, writer: W, capacity: usize) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::build(Box::new(reader), Box::new(writer), capacity, None)
    }

    /// Creates a connection that runs `hook` once when it shuts down.
    ///
    /// A failing hook is logged and otherwise ignored.
    #[must_use]
    pub fn with_close_hook<R, W, F>(reader: R, writer: W, capacity: usize, hook: F) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        Self::build(
            Box::new(reader),
            Box::new(writer),
            capacity,
            Some(Box::new(hook)),
        )
    }

    fn build(
        reader: BoxedReader,
        writer: BoxedWriter,
        capacity: usize,
        close_hook: Option<CloseHook>,
    ) -> Self {
        let bound = capacity.max(1);
        let (inbound_tx, inbound_rx) = mpsc::sync_channel(bound);
        let (outbound_tx, outbound_rx) = mpsc::sync_channel(bound);
        let (error_tx, error_rx) = mpsc::sync_channel(ERROR_QUEUE_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                closed: AtomicBool::new(false),
                outbound: Mutex::new(Some(outbound_tx)),
                errors: error_tx,
                close_hook: Mutex::new(close_hook),
                released: Mutex::new(false),
                latch: Condvar::new(),
            }),
            streams: Mutex::new(Some(Streams {
                reader,
                writer,
                inbound: inbound_tx,
                outbound: outbound_rx,
            })),
            inbound: Mutex::new(inbound_rx),
            errors: Mutex::new(error_rx),
            writer_thread: Mutex::new(None),
        }
    }

    /// Spawns the read and write threads. Later calls do nothing.
    pub fn start(&self) {
        let Some(streams) = lock(&self.streams).take() else {
            debug!(target: CONNECTION_TARGET, "connection already started");
            return;
        };
        let Streams {
            reader,
            writer,
            inbound,
            outbound,
        } = streams;

        let read_shared = Arc::clone(&self.shared);
        thread::spawn(move || read_loop(reader, &inbound, &read_shared));
        let write_shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || write_loop(writer, outbound, &write_shared));
        *lock(&self.writer_thread) = Some(handle);
        debug!(target: CONNECTION_TARGET, "connection started");
    }

    /// Queues a response for the write thread, blocking while the queue is
    /// full.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] once shutdown has begun, including
    /// when shutdown begins while the call is waiting for room.
    pub fn send_response(&self, response: Response) -> Result<(), ConnectionError> {
        self.shared.enqueue(Message::Response(response))
    }

    /// Queues a server-initiated notification, blocking while the queue is
    /// full.
    ///
    /// # Errors
    ///
    /// As for [`Self::send_response`].
    pub fn send_notification(&self, notification: Notification) -> Result<(), ConnectionError> {
        self.shared.enqueue(Message::Notification(notification))
    }

    /// Iterates over inbound messages in arrival order.
    ///
    /// The iterator blocks while the queue is empty and ends when the read
    /// thread stops, or when the connection has shut down and nothing is
    /// left to deliver. Only one iterator can be active at a time.
    #[must_use]
    pub fn incoming(&self) -> Incoming<'_> {
        Incoming {
            receiver: lock(&self.inbound),
            shared: &self.shared,
        }
    }

    /// Iterates, without blocking, over errors that caused shutdown.
    ///
    /// At most the first fatal error is guaranteed to be retained.
    #[must_use]
    pub fn errors(&self) -> Errors<'_> {
        Errors {
            receiver: lock(&self.errors),
        }
    }

    /// Blocks until shutdown has begun.
    pub fn wait(&self) {
        let released = lock(&self.shared.released);
        drop(
            self.shared
                .latch
                .wait_while(released, |is_released| !*is_released)
                .unwrap_or_else(PoisonError::into_inner),
        );
    }

    /// Blocks until shutdown has begun or `timeout` elapses. Returns whether
    /// the connection shut down.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let released = lock(&self.shared.released);
        let (guard, _) = self
            .shared
            .latch
            .wait_timeout_while(released, timeout, |is_released| !*is_released)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Shuts the connection down. Does nothing if it is already closed.
    pub fn close(&self) {
        self.shared.shutdown(None);
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Waits for the write thread to flush what was queued before shutdown.
    ///
    /// Returns immediately if the connection was never started. Blocks until
    /// the connection has shut down otherwise.
    pub fn join_writer(&self) {
        let Some(handle) = lock(&self.writer_thread).take() else {
            return;
        };
        if handle.join().is_err() {
            warn!(target: CONNECTION_TARGET, "write thread panicked");
        }
    }

    #[cfg(test)]
    pub(crate) fn fail(&self, error: ConnectionError) {
        self.shared.shutdown(Some(error));
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Queues `message`, retrying while the queue is full and giving up as
    /// soon as shutdown begins.
    fn enqueue(&self, message: Message) -> Result<(), ConnectionError> {
        let mut pending = message;
        loop {
            if self.is_closed() {
                return Err(ConnectionError::Closed);
            }
            let sender = lock(&self.outbound)
                .clone()
                .ok_or(ConnectionError::Closed)?;
            match sender.try_send(pending) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => return Err(ConnectionError::Closed),
                Err(TrySendError::Full(returned)) => {
                    drop(sender);
                    pending = returned;
                    self.wait_released(SEND_RETRY_INTERVAL);
                }
            }
        }
    }

    fn wait_released(&self, timeout: Duration) {
        let released = lock(&self.released);
        drop(
            self.latch
                .wait_timeout_while(released, timeout, |is_released| !*is_released)
                .unwrap_or_else(PoisonError::into_inner),
        );
    }

    fn shutdown(&self, cause: Option<ConnectionError>) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            if let Some(error) = cause {
                debug!(target: CONNECTION_TARGET, %error, "ignoring error after shutdown");
            }
            return;
        }

        match cause {
            Some(error) => {
                warn!(target: CONNECTION_TARGET, %error, "connection failed");
                if self.errors.try_send(error).is_err() {
                    debug!(target: CONNECTION_TARGET, "error queue full; report dropped");
                }
            }
            None => info!(target: CONNECTION_TARGET, "connection closing"),
        }

        drop(lock(&self.outbound).take());

        let hook = lock(&self.close_hook).take();
        if let Some(hook) = hook
            && let Err(error) = hook()
        {
            warn!(target: CONNECTION_TARGET, %error, "close hook failed");
        }

        *lock(&self.released) = true;
        self.latch.notify_all();
    }
}

fn read_loop(reader: BoxedReader, inbound: &SyncSender<Message>, shared: &Shared) {
    let mut frames = FrameReader::new(BufReader::new(reader));
    loop {
        let outcome = frames.read_message();
        if shared.is_closed() {
            break;
        }
        match outcome {
            Ok(Some(message)) => {
                if inbound.send(message).is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!(target: CONNECTION_TARGET, "peer closed the stream");
                break;
            }
            Err(error) if error.is_fatal() => {
                shared.shutdown(Some(ConnectionError::Read(error)));
                break;
            }
            Err(error) => {
                warn!(target: CONNECTION_TARGET, %error, "answering undecodable message");
                if let Some(response) = error.to_response()
                    && shared.enqueue(Message::Response(response)).is_err()
                {
                    break;
                }
            }
        }
    }
    debug!(target: CONNECTION_TARGET, "read thread finished");
}

fn write_loop(writer: BoxedWriter, outbound: Receiver<Message>, shared: &Shared) {
    let mut frames = FrameWriter::new(BufWriter::new(writer));
    for message in outbound {
        match frames.write_message(&message) {
            Ok(()) => {}
            Err(error) if error.is_fatal() => {
                shared.shutdown(Some(ConnectionError::Write(error)));
                break;
            }
            Err(error) => {
                warn!(target: CONNECTION_TARGET, %error, "dropping message that failed to encode");
            }
        }
    }
    debug!(target: CONNECTION_TARGET, "write thread finished");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Blocking iterator over inbound messages; see [`Connection::incoming`].
pub struct Incoming<'a> {
    receiver: MutexGuard<'a, Receiver<Message>>,
    shared: &'a Shared,
}

impl Iterator for Incoming<'_> {
    type Item = Message;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.receiver.recv_timeout(CLOSED_POLL_INTERVAL) {
                Ok(message) => return Some(message),
                Err(RecvTimeoutError::Disconnected) => return None,
                Err(RecvTimeoutError::Timeout) if self.shared.is_closed() => return None,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }
}

/// Non-blocking iterator over shutdown causes; see [`Connection::errors`].
pub struct Errors<'a> {
    receiver: MutexGuard<'a, Receiver<ConnectionError>>,
}

impl Iterator for Errors<'_> {
    type Item = ConnectionError;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.try_recv().ok()
    }
}
