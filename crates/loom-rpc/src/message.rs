//! JSON-RPC 2.0 message model and its wire envelope.

use std::fmt;

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::ResponseError;

/// Protocol version stamped on every outgoing message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Caller-chosen request identifier, echoed verbatim in the response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer identifier.
    Number(i64),
    /// String identifier.
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::String(text) => write!(f, "{text:?}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(String::from(value))
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// A call that expects exactly one [`Response`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Correlation id.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Raw parameters, if any were sent.
    pub params: Option<Value>,
}

impl Request {
    /// Creates a request.
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A one-way message that never receives a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Method name.
    pub method: String,
    /// Raw parameters, if any were sent.
    pub params: Option<Value>,
}

impl Notification {
    /// Creates a notification from raw parameters.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Creates a notification by serialising typed parameters.
    ///
    /// # Errors
    ///
    /// Returns the serialiser error when `params` cannot be encoded as JSON.
    pub fn with_params<P>(method: impl Into<String>, params: &P) -> Result<Self, serde_json::Error>
    where
        P: Serialize,
    {
        Ok(Self::new(method, Some(serde_json::to_value(params)?)))
    }

    /// Decodes the parameters into `P`, treating absent parameters as `null`.
    ///
    /// # Errors
    ///
    /// Returns the deserialiser error when the parameters do not match `P`.
    pub fn params_as<P>(&self) -> Result<P, serde_json::Error>
    where
        P: DeserializeOwned,
    {
        serde_json::from_value(self.params.clone().unwrap_or(Value::Null))
    }
}

/// Reply to a [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Id of the request being answered; `None` only when the request could
    /// not be read far enough to recover its id.
    pub id: Option<RequestId>,
    /// Result on success, error object on failure.
    pub result: Result<Value, ResponseError>,
}

impl Response {
    /// Successful response carrying `result`.
    #[must_use]
    pub const fn ok(id: RequestId, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Ok(result),
        }
    }

    /// Failed response carrying `error`.
    #[must_use]
    pub const fn error(id: Option<RequestId>, error: ResponseError) -> Self {
        Self {
            id,
            result: Err(error),
        }
    }

    /// The error object of a failed response.
    #[must_use]
    pub const fn error_object(&self) -> Option<&ResponseError> {
        match &self.result {
            Ok(_) => None,
            Err(error) => Some(error),
        }
    }
}

/// Any JSON-RPC message that can cross the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Call expecting a response.
    Request(Request),
    /// One-way message.
    Notification(Notification),
    /// Reply to an earlier request.
    Response(Response),
}

impl From<Request> for Message {
    fn from(value: Request) -> Self {
        Self::Request(value)
    }
}

impl From<Notification> for Message {
    fn from(value: Notification) -> Self {
        Self::Notification(value)
    }
}

impl From<Response> for Message {
    fn from(value: Response) -> Self {
        Self::Response(value)
    }
}

/// A body that parsed as JSON but is not a message.
#[derive(Debug)]
pub(crate) struct EnvelopeRejection {
    pub(crate) id: Option<RequestId>,
    pub(crate) reason: String,
}

impl Message {
    /// Classifies a decoded JSON body.
    pub(crate) fn from_value(value: Value) -> Result<Self, EnvelopeRejection> {
        let id_hint = value
            .get("id")
            .and_then(|id| RequestId::deserialize(id).ok());
        let reject = |reason: String| EnvelopeRejection {
            id: id_hint.clone(),
            reason,
        };

        let envelope: InboundEnvelope =
            serde_json::from_value(value).map_err(|error| reject(error.to_string()))?;
        if let Some(version) = envelope.jsonrpc.as_deref()
            && version != JSONRPC_VERSION
        {
            return Err(reject(format!("unsupported jsonrpc version '{version}'")));
        }

        match (envelope.method, envelope.id) {
            (Some(method), Some(raw_id)) => {
                let id = parse_id(raw_id)
                    .ok_or_else(|| reject(String::from("request id must be an integer or string")))?;
                Ok(Self::Request(Request {
                    id,
                    method,
                    params: envelope.params,
                }))
            }
            (Some(method), None) => Ok(Self::Notification(Notification {
                method,
                params: envelope.params,
            })),
            (None, raw_id) => {
                let id = match raw_id {
                    None | Some(Value::Null) => None,
                    Some(other) => Some(parse_id(other).ok_or_else(|| {
                        reject(String::from("response id must be an integer, string or null"))
                    })?),
                };
                let result = match (envelope.result, envelope.error) {
                    (Some(result), None) => Ok(result),
                    (None, Some(error)) => Err(error),
                    _ => {
                        return Err(reject(String::from(
                            "message has no method and is not a response with exactly one of \
                             result or error",
                        )));
                    }
                };
                Ok(Self::Response(Response { id, result }))
            }
        }
    }

    /// Method name of a request or notification.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(request) => Some(&request.method),
            Self::Notification(notification) => Some(&notification.method),
            Self::Response(_) => None,
        }
    }
}

fn parse_id(raw: Value) -> Option<RequestId> {
    serde_json::from_value(raw).ok()
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OutboundEnvelope::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(|rejection| de::Error::custom(rejection.reason))
    }
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    jsonrpc: &'static str,
    // `Some(None)` writes `"id": null`; `None` omits the field.
    #[expect(
        clippy::option_option,
        reason = "responses need a null id while notifications omit it"
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Option<&'a RequestId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ResponseError>,
}

impl<'a> From<&'a Message> for OutboundEnvelope<'a> {
    fn from(message: &'a Message) -> Self {
        let empty = Self {
            jsonrpc: JSONRPC_VERSION,
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
        };
        match message {
            Message::Request(request) => Self {
                id: Some(Some(&request.id)),
                method: Some(&request.method),
                params: request.params.as_ref(),
                ..empty
            },
            Message::Notification(notification) => Self {
                method: Some(&notification.method),
                params: notification.params.as_ref(),
                ..empty
            },
            Message::Response(response) => {
                let (result, error) = match &response.result {
                    Ok(result) => (Some(result), None),
                    Err(error) => (None, Some(error)),
                };
                Self {
                    id: Some(response.id.as_ref()),
                    result,
                    error,
                    ..empty
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct InboundEnvelope {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default, deserialize_with = "present")]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ResponseError>,
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}
