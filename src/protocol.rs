//! JSON-RPC-style envelope shared by every instrument conversation.
//!
//! The wire format is a single text frame per message. A request carries
//! `{jsonrpc, method, params?, id}` and the reply carries `{jsonrpc, result}`
//! or `{jsonrpc, error}`. Request ids are hand-assigned literals per method
//! and are NOT unique across a session; the transport is strictly
//! request-then-reply, so an id collision can never cause misrouting.
//!
//! Result shapes are method-specific and untyped. Callers extract known keys
//! (e.g. `"Temperature (K)"`) defensively through the accessors here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol tag sent with every frame.
pub const PROTOCOL_VERSION: &str = "2.0";

/// A single outbound command frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    pub id: String,
}

impl Request {
    /// Creates a request with no parameters.
    pub fn new(method: &str, id: &str) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            method: method.to_string(),
            params: None,
            id: id.to_string(),
        }
    }

    /// Adds one named scalar parameter, creating the map on first use.
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }
}

/// An inbound reply frame: either a `result` payload or an `error` object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcFault>,
}

/// Error object carried by a rejecting reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcFault {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

impl Response {
    /// Looks up a scalar under the given key of the result mapping.
    ///
    /// Returns `None` when the reply has no result, the result is not a
    /// mapping, or the key is absent. Absence means "unknown", not a
    /// distinguishable failure reason.
    pub fn result_f64(&self, key: &str) -> Option<f64> {
        self.result
            .as_ref()
            .and_then(|result| result.get(key))
            .and_then(Value::as_f64)
    }
}
