//! JSON-RPC 2.0 transport and dispatch over a framed byte stream.
//!
//! Messages travel as `Content-Length`-prefixed JSON bodies, as in the
//! Language Server Protocol. A [`Connection`] owns one read thread and one
//! write thread connected to the caller through bounded queues, and shuts
//! down exactly once whichever side fails first. A [`DispatchTable`] routes
//! decoded requests and notifications to handlers bound through the typed
//! adapters in this crate, and pairs every request with exactly one response.

mod adapter;
mod connection;
mod dispatch;
mod error;
mod frame;
mod message;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use adapter::{adapt_notification, adapt_request};
pub use connection::{CloseHook, Connection, Errors, Incoming};
pub use dispatch::{DispatchTable, HandlerEntry, NotificationHandler, RequestHandler};
pub use error::{ConnectionError, DispatchError, ErrorCode, FrameError, ResponseError};
pub use frame::{FrameReader, FrameWriter};
pub use message::{JSONRPC_VERSION, Message, Notification, Request, RequestId, Response};

#[cfg(test)]
mod tests;
