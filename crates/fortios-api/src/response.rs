// Response envelope and normalization
//
// FortiOS answers with `{ "http_status": N, "status": "success", ... }`,
// or, for global-scope requests, a JSON array holding one such object per
// VDOM. Normalization always yields a `Response`: either the decoded
// envelope or the raw body when decoding is impossible. Callers that want
// hard failures use `Response::into_decoded`.

use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::endpoint::Scope;
use crate::error::Error;

/// Outcome reported in the envelope's `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    #[serde(other)]
    Other,
}

/// Decoded FortiOS response envelope.
///
/// The commonly used fields are typed; everything else the appliance sends
/// lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub http_status: u16,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vdom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mkey: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
    /// Catch-all for `path`, `name`, `revision`, `build`, `error`, `cli_error`...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// A response whose body could not be decoded as the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Transport-level status code.
    pub http_status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Normalized result of every call that talks to the appliance.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Decoded(ApiResponse),
    Raw(RawResponse),
}

impl Response {
    /// `http_status` from the envelope, or the transport status for raw bodies.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Decoded(resp) => resp.http_status,
            Self::Raw(raw) => raw.http_status,
        }
    }

    /// `true` only for a decoded envelope reporting `status: success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Decoded(resp) if resp.is_success())
    }

    pub fn as_decoded(&self) -> Option<&ApiResponse> {
        match self {
            Self::Decoded(resp) => Some(resp),
            Self::Raw(_) => None,
        }
    }

    /// Strict view: a raw body becomes [`Error::MalformedResponse`].
    pub fn into_decoded(self) -> Result<ApiResponse, Error> {
        match self {
            Self::Decoded(resp) => Ok(resp),
            Self::Raw(raw) => Err(Error::MalformedResponse {
                message: format!("undecodable body (HTTP {})", raw.http_status),
                body: raw.text(),
            }),
        }
    }

    /// The `results` payload of a decoded response.
    pub fn results(&self) -> Option<&Value> {
        self.as_decoded().and_then(|resp| resp.results.as_ref())
    }
}

/// Decode a raw body into a [`Response`].
///
/// Global-scope bodies are a sequence of per-VDOM results: only the first
/// element is kept and it is tagged `vdom: "global"`.
pub(crate) fn normalize(status: StatusCode, body: Bytes, scope: &Scope) -> Response {
    match decode(&body, scope) {
        Ok(resp) => Response::Decoded(resp),
        Err(e) => {
            warn!(http_status = status.as_u16(), error = %e, "response body is not a FortiOS envelope");
            trace!(body = %String::from_utf8_lossy(&body), "raw response");
            Response::Raw(RawResponse {
                http_status: status.as_u16(),
                body,
            })
        }
    }
}

fn decode(body: &[u8], scope: &Scope) -> Result<ApiResponse, serde_json::Error> {
    if !scope.is_global() {
        return serde_json::from_slice(body);
    }

    let value: Value = serde_json::from_slice(body)?;
    let first = match value {
        Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
        other => other,
    };
    let mut resp: ApiResponse = serde_json::from_value(first)?;
    resp.vdom = Some("global".into());
    Ok(resp)
}
