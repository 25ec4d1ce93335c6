use crate::logging::LogFormat;

/// Default log filter expression used by the server.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default capacity of the inbound and outbound message queues.
///
/// The bound is backpressure: a client that floods the server stalls on its
/// own writes instead of growing the server's memory.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default log filter expression used by the server.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the server.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default queue capacity for a connection.
#[must_use]
pub const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
