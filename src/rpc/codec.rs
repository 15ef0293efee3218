//! Request and response envelopes.
//!
//! ```text
//! → {"method": "Group.DescribeGroup", "params": {"ID": "workers"}, "id": 7}
//! ← {"id": 7, "result": {"Description": {...}}, "error": null}
//! ```
//!
//! `params` may also be wrapped in a one-element array.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// `"<Service>.<Method>"`.
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Echoed back unchanged.
    #[serde(default)]
    pub id: Value,
}

/// Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: Value,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.is_empty() {
            message = "unknown error".to_string();
        }
        Self {
            id,
            result: None,
            error: Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Decode one request line. Bytes that are not UTF-8 fail like any other bad JSON.
pub fn decode_request(line: &[u8]) -> Result<RpcRequest, serde_json::Error> {
    serde_json::from_slice(line)
}

/// Unwrap the parameter payload.
///
/// A one-element array yields its element; a missing, `null` or empty payload
/// yields an empty object so that all-default input shapes decode.
pub fn payload(params: Value) -> Value {
    match params {
        Value::Array(mut items) if items.len() <= 1 => match items.pop() {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(inner) => inner,
        },
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}
