//! Error types for framing, transport, dispatch and the wire error object.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::message::{RequestId, Response};

/// Reserved JSON-RPC and LSP error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The body was not valid JSON.
    ParseError,
    /// The JSON was not a valid request object.
    InvalidRequest,
    /// No handler is registered for the method.
    MethodNotFound,
    /// Parameters did not match what the method expects.
    InvalidParams,
    /// The server failed while handling the message.
    InternalError,
    /// A request arrived before `initialize`.
    ServerNotInitialized,
    /// The request was valid but could not be completed.
    RequestFailed,
}

impl ErrorCode {
    /// Numeric value sent on the wire.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::ParseError => -32_700,
            Self::InvalidRequest => -32_600,
            Self::MethodNotFound => -32_601,
            Self::InvalidParams => -32_602,
            Self::InternalError => -32_603,
            Self::ServerNotInitialized => -32_002,
            Self::RequestFailed => -32_803,
        }
    }

    /// Maps a numeric code back to a known variant.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            -32_700 => Some(Self::ParseError),
            -32_600 => Some(Self::InvalidRequest),
            -32_601 => Some(Self::MethodNotFound),
            -32_602 => Some(Self::InvalidParams),
            -32_603 => Some(Self::InternalError),
            -32_002 => Some(Self::ServerNotInitialized),
            -32_803 => Some(Self::RequestFailed),
            _ => None,
        }
    }
}

/// JSON-RPC error object carried by a failed [`Response`].
///
/// Handlers return it to fail a request; the dispatcher sends it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message} (code {code})")]
pub struct ResponseError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable description.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseError {
    /// Creates an error with a reserved code.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured detail.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The reserved code this error carries, if any.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }

    /// `MethodNotFound` naming `method`.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("method not found: {method}"))
    }

    /// `InvalidParams` with `message`.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    /// `InvalidRequest` with `message`.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// `InternalError` with `message`.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

/// Errors raised while reading or writing framed messages.
#[derive(Debug, Error)]
pub enum FrameError {
    /// I/O error on the underlying stream, including a stream that ends
    /// inside a header block or body.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The header block carried no `Content-Length`.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// The `Content-Length` value was not a byte count.
    #[error("invalid Content-Length value '{value}'")]
    InvalidContentLength {
        /// Raw header value.
        value: String,
    },

    /// The body was not valid JSON.
    #[error("message body is not valid JSON: {source}")]
    Decode {
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// The body was JSON but not a request, notification or response.
    #[error("invalid message envelope: {reason}")]
    InvalidEnvelope {
        /// Request id, when one could be recovered from the body.
        id: Option<RequestId>,
        /// What was wrong with the envelope.
        reason: String,
    },

    /// A message could not be serialised.
    #[error("failed to encode message: {source}")]
    Encode {
        /// Serialiser error.
        #[source]
        source: serde_json::Error,
    },
}

impl FrameError {
    /// Whether the stream can no longer be trusted after this error.
    ///
    /// Framing and I/O failures are fatal; a body that fails to decode is
    /// answered and the connection keeps reading.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::MissingContentLength | Self::InvalidContentLength { .. }
        )
    }

    /// Response owed to the peer for a body that failed to decode.
    #[must_use]
    pub fn to_response(&self) -> Option<Response> {
        match self {
            Self::Decode { source } => Some(Response::error(
                None,
                ResponseError::new(ErrorCode::ParseError, format!("parse error: {source}")),
            )),
            Self::InvalidEnvelope { id, reason } => Some(Response::error(
                id.clone(),
                ResponseError::invalid_request(reason.clone()),
            )),
            Self::Io(_)
            | Self::MissingContentLength
            | Self::InvalidContentLength { .. }
            | Self::Encode { .. } => None,
        }
    }
}

/// Errors surfaced by a [`crate::Connection`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Reading from the stream failed.
    #[error("read error: {0}")]
    Read(#[source] FrameError),

    /// Writing to the stream failed.
    #[error("write error: {0}")]
    Write(#[source] FrameError),

    /// The connection has shut down.
    #[error("connection closed")]
    Closed,
}

/// Errors raised while building a [`crate::DispatchTable`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Method names must not be empty.
    #[error("method name must not be empty")]
    EmptyMethod,

    /// The method already has a handler.
    #[error("method '{method}' is already registered")]
    DuplicateMethod {
        /// Method name.
        method: String,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ErrorCode::ParseError, -32_700)]
    #[case(ErrorCode::InvalidRequest, -32_600)]
    #[case(ErrorCode::MethodNotFound, -32_601)]
    #[case(ErrorCode::InvalidParams, -32_602)]
    #[case(ErrorCode::InternalError, -32_603)]
    #[case(ErrorCode::ServerNotInitialized, -32_002)]
    #[case(ErrorCode::RequestFailed, -32_803)]
    fn codes_match_the_protocol(#[case] kind: ErrorCode, #[case] expected: i64) {
        assert_eq!(kind.code(), expected);
        assert_eq!(ErrorCode::from_code(expected), Some(kind));
    }

    #[rstest]
    fn unknown_codes_have_no_kind() {
        let error = ResponseError {
            code: 7,
            message: String::from("custom"),
            data: None,
        };
        assert_eq!(error.kind(), None);
    }

    #[rstest]
    #[case(FrameError::MissingContentLength, true)]
    #[case(FrameError::InvalidContentLength { value: String::from("x") }, true)]
    #[case(FrameError::Io(io::Error::other("boom")), true)]
    #[case(FrameError::InvalidEnvelope { id: None, reason: String::from("bad") }, false)]
    fn classifies_fatal_errors(#[case] error: FrameError, #[case] fatal: bool) {
        assert_eq!(error.is_fatal(), fatal);
        assert_eq!(error.to_response().is_none(), fatal);
    }

    #[rstest]
    fn parse_errors_reply_with_null_id() {
        let source = serde_json::from_str::<Value>("{").expect_err("should fail to parse");
        let response = FrameError::Decode { source }
            .to_response()
            .expect("decode errors are answered");

        assert_eq!(response.id, None);
        let error = response.result.expect_err("should be an error response");
        assert_eq!(error.kind(), Some(ErrorCode::ParseError));
    }
}
