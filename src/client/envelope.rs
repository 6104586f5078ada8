//! Decoding of the service's response envelope.
//!
//! Every JSON response may carry a top-level `error` string and a `response`
//! object describing the request state:
//!
//! ```json
//! { "response": { "status": "poll", "progress": 3, "progress_total": 6 } }
//! { "response": { "status": "redirect", "redirect_request": "RFView",
//!                 "redirect_request_args": { "model_key": "m1" } } }
//! ```
//!
//! A body without `response` is a plain finished result.

use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

use crate::RemoteError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ResponseStatus {
    Done,
    Poll,
    Redirect,
    Error,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponseInfo {
    pub(crate) status: ResponseStatus,
    #[serde(default)]
    pub(crate) progress: Option<f64>,
    #[serde(default)]
    pub(crate) progress_total: Option<f64>,
    #[serde(default)]
    pub(crate) redirect_request: Option<String>,
    #[serde(default)]
    pub(crate) redirect_request_args: Option<Map<String, Value>>,
}

/// A decoded body that is not an error
#[derive(Debug, Clone)]
pub(crate) struct Envelope {
    pub(crate) info: Option<ResponseInfo>,
    pub(crate) body: Value,
}

impl Envelope {
    /// Splits `body` into its envelope, turning service-reported errors into
    /// [`RemoteError::Service`].
    pub(crate) fn decode(
        request: &str,
        body: Value,
    ) -> Result<Self> {
        if let Some(message) = error_message(&body) {
            return Err(RemoteError::Service {
                request: request.to_string(),
                message,
            }
            .into());
        }

        let info = match body.get("response") {
            Some(raw) => Some(
                ResponseInfo::deserialize(raw).map_err(|source| RemoteError::Decode {
                    request: request.to_string(),
                    source,
                })?,
            ),
            None => None,
        };

        if let Some(ResponseInfo {
            status: ResponseStatus::Error,
            ..
        }) = info
        {
            return Err(RemoteError::Service {
                request: request.to_string(),
                message: "service reported error status without a message".to_string(),
            }
            .into());
        }

        Ok(Self { info, body })
    }

    pub(crate) fn status(&self) -> ResponseStatus {
        self.info.as_ref().map(|i| i.status).unwrap_or(ResponseStatus::Done)
    }

    /// `(progress, total)` as integers; missing values count as zero
    pub(crate) fn progress(&self) -> (u64, u64) {
        let info = match &self.info {
            Some(info) => info,
            None => return (0, 0),
        };
        let to_u64 = |v: Option<f64>| v.filter(|v| v.is_finite() && *v > 0.0).map(|v| v as u64).unwrap_or(0);
        (to_u64(info.progress), to_u64(info.progress_total))
    }

    /// Request name and arguments to follow for a `redirect`
    pub(crate) fn redirect(&self) -> Option<(String, Vec<(String, String)>)> {
        let info = self.info.as_ref()?;
        let request = info.redirect_request.clone()?;
        let args = info
            .redirect_request_args
            .as_ref()
            .map(|map| map.iter().map(|(k, v)| (k.clone(), query_value(v))).collect())
            .unwrap_or_default();
        Some((request, args))
    }

    /// String field of the body, or `MissingField`
    pub(crate) fn require_str(
        &self,
        request: &str,
        fields: &[&str],
    ) -> Result<String> {
        fields
            .iter()
            .find_map(|f| self.body.get(*f).and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| {
                RemoteError::MissingField {
                    request: request.to_string(),
                    field: fields.join("|"),
                }
                .into()
            })
    }
}

/// The top-level `error` field when it carries a message
pub(crate) fn error_message(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
