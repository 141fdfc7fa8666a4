//! JSON-RPC 2.0 frame model.
//!
//! Both legs speak JSON-RPC over text frames. The bridge only needs to
//! classify a frame and read its identity; params and results are carried
//! opaquely as [`serde_json::Value`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;

/// Protocol version stamped on every frame we originate.
pub const JSONRPC_VERSION: &str = "2.0";

/// A call correlation id. The protocol allows integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallId {
    Number(u64),
    Text(String),
}

impl core::fmt::Display for CallId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CallId::Number(n) => write!(f, "{n}"),
            CallId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<u64> for CallId {
    fn from(n: u64) -> Self {
        CallId::Number(n)
    }
}

/// A classified JSON-RPC frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A call expecting a response under the same id.
    Request {
        id: CallId,
        method: String,
        params: Option<Value>,
    },
    /// A one-way message; no response may be sent for it.
    Notification {
        method: String,
        params: Option<Value>,
    },
    /// The answer to a request, carrying either a result or an error.
    Response {
        id: CallId,
        result: Option<Value>,
        error: Option<Value>,
    },
}

/// On-the-wire shape for encoding; a superset of all three frame kinds.
///
/// `result`/`error` carry `Value::Null` as an explicit JSON `null`, so a
/// null success result survives re-encoding.
#[derive(Debug, Serialize)]
struct Envelope {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<CallId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
}

impl Frame {
    pub fn request(id: impl Into<CallId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Frame::Request {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Frame::Notification {
            method: method.into(),
            params,
        }
    }

    pub fn response(id: CallId, result: Value) -> Self {
        Frame::Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error_response(id: CallId, error: Value) -> Self {
        Frame::Response {
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Classify a raw text frame.
    ///
    /// A frame with a method and an id is a request; a method without an id
    /// is a notification; an id with a `result` or `error` key is a
    /// response. Classification goes by key presence, so an explicit
    /// `"result": null` is still a (null-valued) response.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] on invalid JSON or an unclassifiable shape.
    pub fn decode(raw: &str) -> Result<Self, CodecError> {
        let Value::Object(mut envelope) = serde_json::from_str(raw)? else {
            return Err(CodecError::Unclassifiable);
        };

        let id = match envelope.remove("id") {
            None | Some(Value::Null) => None,
            Some(id) => Some(serde_json::from_value::<CallId>(id)?),
        };
        let method = match envelope.remove("method") {
            None => None,
            Some(Value::String(method)) => Some(method),
            Some(_) => return Err(CodecError::Unclassifiable),
        };

        match (method, id) {
            (Some(method), Some(id)) => Ok(Frame::Request {
                id,
                method,
                params: envelope.remove("params"),
            }),
            (Some(method), None) => Ok(Frame::Notification {
                method,
                params: envelope.remove("params"),
            }),
            (None, Some(id))
                if envelope.contains_key("result") || envelope.contains_key("error") =>
            {
                Ok(Frame::Response {
                    id,
                    result: envelope.remove("result"),
                    error: envelope.remove("error"),
                })
            }
            _ => Err(CodecError::Unclassifiable),
        }
    }

    /// Encode back to a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if serialization fails.
    pub fn encode(&self) -> Result<String, CodecError> {
        let env = match self.clone() {
            Frame::Request { id, method, params } => Envelope {
                jsonrpc: JSONRPC_VERSION,
                method: Some(method),
                params,
                id: Some(id),
                result: None,
                error: None,
            },
            Frame::Notification { method, params } => Envelope {
                jsonrpc: JSONRPC_VERSION,
                method: Some(method),
                params,
                id: None,
                result: None,
                error: None,
            },
            Frame::Response { id, result, error } => Envelope {
                jsonrpc: JSONRPC_VERSION,
                method: None,
                params: None,
                id: Some(id),
                result,
                error,
            },
        };
        Ok(serde_json::to_string(&env)?)
    }
}
