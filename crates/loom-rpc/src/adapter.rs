//! Binds typed handlers to the raw handler signatures of the dispatch table.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::dispatch::{NotificationHandler, RequestHandler};
use crate::error::ResponseError;

const ADAPTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::adapter");

/// Wraps a typed request handler.
///
/// Absent parameters decode as `null`, so `()` and `Option<_>` parameter
/// types accept requests without `params`. Parameters that do not decode
/// into `P` fail with `InvalidParams`, carrying the decoder message as
/// `data`. A result that cannot be encoded fails with `InternalError`.
#[must_use]
pub fn adapt_request<P, R, F>(handler: F) -> RequestHandler
where
    P: DeserializeOwned,
    R: Serialize,
    F: Fn(P) -> Result<R, ResponseError> + Send + Sync + 'static,
{
    Box::new(move |params| {
        let typed: P = decode_params(params).map_err(|error| {
            ResponseError::invalid_params("invalid params").with_data(Value::String(error.to_string()))
        })?;
        let result = handler(typed)?;
        serde_json::to_value(result)
            .map_err(|error| ResponseError::internal(format!("failed to encode result: {error}")))
    })
}

/// Wraps a typed notification handler.
///
/// Notifications whose parameters do not decode into `P` are logged and
/// dropped, since there is nobody to reply to.
#[must_use]
pub fn adapt_notification<P, F>(handler: F) -> NotificationHandler
where
    P: DeserializeOwned,
    F: Fn(P) + Send + Sync + 'static,
{
    Box::new(move |params| match decode_params(params) {
        Ok(typed) => handler(typed),
        Err(error) => {
            warn!(target: ADAPTER_TARGET, %error, "dropping notification with invalid params");
        }
    })
}

fn decode_params<P: DeserializeOwned>(params: Option<Value>) -> Result<P, serde_json::Error> {
    serde_json::from_value(params.unwrap_or(Value::Null))
}
