//! Method routing for requests and notifications.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{DispatchError, ResponseError};
use crate::message::{Message, Notification, Request, Response};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Handler for a request: raw parameters in, raw result or error out.
pub type RequestHandler = Box<dyn Fn(Option<Value>) -> Result<Value, ResponseError> + Send + Sync>;

/// Handler for a notification: raw parameters in, nothing out.
pub type NotificationHandler = Box<dyn Fn(Option<Value>) + Send + Sync>;

/// A registered handler, tagged by the kind of message it accepts.
pub enum HandlerEntry {
    /// Answers requests.
    Request(RequestHandler),
    /// Consumes notifications.
    Notification(NotificationHandler),
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(_) => f.write_str("Request(..)"),
            Self::Notification(_) => f.write_str("Notification(..)"),
        }
    }
}

/// Routes messages to handlers by exact method name.
///
/// Each method has at most one handler; registering a method twice is an
/// error rather than an override.
#[derive(Default)]
pub struct DispatchTable {
    entries: HashMap<String, HandlerEntry>,
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("methods", &self.methods())
            .finish()
    }
}

impl DispatchTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request handler for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EmptyMethod`] for an empty name and
    /// [`DispatchError::DuplicateMethod`] when `method` already has a handler.
    pub fn register_request(
        &mut self,
        method: impl Into<String>,
        handler: RequestHandler,
    ) -> Result<(), DispatchError> {
        self.register(method.into(), HandlerEntry::Request(handler))
    }

    /// Registers a notification handler for `method`.
    ///
    /// # Errors
    ///
    /// As for [`Self::register_request`].
    pub fn register_notification(
        &mut self,
        method: impl Into<String>,
        handler: NotificationHandler,
    ) -> Result<(), DispatchError> {
        self.register(method.into(), HandlerEntry::Notification(handler))
    }

    fn register(&mut self, method: String, entry: HandlerEntry) -> Result<(), DispatchError> {
        if method.is_empty() {
            return Err(DispatchError::EmptyMethod);
        }
        match self.entries.entry(method) {
            Entry::Occupied(occupied) => Err(DispatchError::DuplicateMethod {
                method: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                debug!(target: DISPATCH_TARGET, method = vacant.key().as_str(), "registered handler");
                vacant.insert(entry);
                Ok(())
            }
        }
    }

    /// Whether `method` has a handler.
    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.entries.contains_key(method)
    }

    /// Registered method names, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    /// Runs the handler for `request` and builds its response.
    ///
    /// A handler that panics is answered with `InternalError`.
    #[must_use]
    pub fn handle_request(&self, request: Request) -> Response {
        let Request { id, method, params } = request;
        match self.entries.get(&method) {
            Some(HandlerEntry::Request(handler)) => {
                debug!(target: DISPATCH_TARGET, %id, %method, "handling request");
                let result = panic::catch_unwind(AssertUnwindSafe(|| handler(params)))
                    .unwrap_or_else(|payload| {
                        let reason = panic_reason(payload.as_ref());
                        warn!(target: DISPATCH_TARGET, %id, %method, reason, "request handler panicked");
                        Err(ResponseError::internal(format!(
                            "handler for '{method}' panicked: {reason}"
                        )))
                    });
                if let Err(error) = &result {
                    debug!(target: DISPATCH_TARGET, %id, %method, %error, "request failed");
                }
                Response { id: Some(id), result }
            }
            Some(HandlerEntry::Notification(_)) => {
                debug!(target: DISPATCH_TARGET, %id, %method, "notification called as a request");
                Response::error(
                    Some(id),
                    ResponseError::invalid_request(format!(
                        "'{method}' is a notification and cannot be called as a request"
                    )),
                )
            }
            None => {
                debug!(target: DISPATCH_TARGET, %id, %method, "method not found");
                Response::error(Some(id), ResponseError::method_not_found(&method))
            }
        }
    }

    /// Runs the handler for `notification`, if one is registered. A panic in
    /// the handler is logged and contained.
    pub fn handle_notification(&self, notification: Notification) {
        let Notification { method, params } = notification;
        match self.entries.get(&method) {
            Some(HandlerEntry::Notification(handler)) => {
                debug!(target: DISPATCH_TARGET, %method, "handling notification");
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(params))) {
                    warn!(
                        target: DISPATCH_TARGET,
                        %method,
                        reason = panic_reason(payload.as_ref()),
                        "notification handler panicked"
                    );
                }
            }
            Some(HandlerEntry::Request(_)) => {
                debug!(target: DISPATCH_TARGET, %method, "dropping notification for request method");
            }
            None => {
                debug!(target: DISPATCH_TARGET, %method, "dropping unknown notification");
            }
        }
    }

    /// Routes one message, returning the response owed for it.
    #[must_use]
    pub fn dispatch(&self, message: Message) -> Option<Response> {
        match message {
            Message::Request(request) => Some(self.handle_request(request)),
            Message::Notification(notification) => {
                self.handle_notification(notification);
                None
            }
            Message::Response(response) => {
                debug!(
                    target: DISPATCH_TARGET,
                    id = ?response.id,
                    "dropping response to a request the server never sent"
                );
                None
            }
        }
    }

    /// Handles inbound messages from `connection` one at a time until the
    /// connection stops delivering or refuses a response.
    pub fn serve(&self, connection: &Connection) {
        for message in connection.incoming() {
            let Some(response) = self.dispatch(message) else {
                continue;
            };
            if let Err(error) = connection.send_response(response) {
                warn!(target: DISPATCH_TARGET, %error, "stopping dispatch loop");
                break;
            }
        }
        debug!(target: DISPATCH_TARGET, "dispatch loop finished");
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
