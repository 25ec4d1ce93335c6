//! Outbound side of the server: how handlers reach the editor.

use std::sync::Arc;

use loom_rpc::{Connection, ConnectionError, Notification};

/// Channel from the server back to the editor.
///
/// [`Connection`] is the production implementation; tests substitute a mock.
pub trait Client: Send + Sync {
    /// Queues a server-initiated notification.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] once the session has ended.
    fn notify(&self, notification: Notification) -> Result<(), ConnectionError>;

    /// Ends the session.
    fn close(&self);
}

impl Client for Connection {
    fn notify(&self, notification: Notification) -> Result<(), ConnectionError> {
        self.send_notification(notification)
    }

    fn close(&self) {
        Self::close(self);
    }
}

impl<T> Client for Arc<T>
where
    T: Client + ?Sized,
{
    fn notify(&self, notification: Notification) -> Result<(), ConnectionError> {
        (**self).notify(notification)
    }

    fn close(&self) {
        (**self).close();
    }
}
