//! JSON-RPC 2.0 message types.
//!
//! MCP frames are plain JSON-RPC 2.0 objects. The version field is modelled
//! as a zero-sized newtype whose serde impls enforce the literal `"2.0"`, so
//! a frame with the wrong version fails at deserialisation rather than deep
//! inside a handler.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::types::RequestId;

/// JSON-RPC version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC version marker type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "invalid JSON-RPC version: expected '{JSONRPC_VERSION}', got '{version}'"
            )))
        }
    }
}

/// JSON-RPC request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Version marker, always `"2.0"`.
    pub jsonrpc: JsonRpcVersion,
    /// Method name, e.g. `tools/call`.
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request identifier echoed in the response.
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Build a request.
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC notification (no id, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Version marker, always `"2.0"`.
    pub jsonrpc: JsonRpcVersion,
    /// Method name, e.g. `notifications/initialized`.
    pub method: String,
    /// Notification parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Response payload; the untagged enum keeps `result` and `error` mutually
/// exclusive at the type level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    /// Successful response.
    Success {
        /// The result value.
        result: Value,
    },
    /// Error response.
    Error {
        /// The error object.
        error: JsonRpcError,
    },
}

/// Response id; parse errors carry `null` where the request id would be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub Option<RequestId>);

impl ResponseId {
    /// Id for a response to a well-formed request.
    pub fn from_request(id: RequestId) -> Self {
        Self(Some(id))
    }

    /// Null id, used when the request could not even be parsed.
    pub fn null() -> Self {
        Self(None)
    }
}

/// JSON-RPC response message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Version marker, always `"2.0"`.
    pub jsonrpc: JsonRpcVersion,
    /// Either `result` or `error`, flattened into the object.
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
    /// Request id, or null for parse errors.
    pub id: ResponseId,
}

impl JsonRpcResponse {
    /// Successful response carrying `result`.
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Success { result },
            id: ResponseId::from_request(id),
        }
    }

    /// Error response for a known request id.
    pub fn error(error: JsonRpcError, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Error { error },
            id: ResponseId::from_request(id),
        }
    }

    /// Parse-error response with a null id.
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Error {
                error: JsonRpcError::parse_error(detail),
            },
            id: ResponseId::null(),
        }
    }

    /// True when the payload is an error.
    pub fn is_error(&self) -> bool {
        matches!(self.payload, JsonRpcResponsePayload::Error { .. })
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Arbitrary code/message error.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Parse error (-32700).
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(-32700, format!("Parse error: {}", detail.into()))
    }

    /// Invalid request (-32600).
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(-32600, format!("Invalid Request: {}", reason.into()))
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, format!("Method not found: {method}"))
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(-32602, format!("Invalid params: {}", detail.into()))
    }

    /// Internal error (-32603).
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(-32603, format!("Internal error: {}", detail.into()))
    }

    /// Tool not found (-32001, server-defined range).
    pub fn tool_not_found(name: &str) -> Self {
        Self::new(-32001, format!("Tool not found: {name}"))
    }
}

/// Any inbound JSON-RPC message.
///
/// Order matters: a request is a notification plus an `id`, so the request
/// variant must be tried first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// Request expecting a response.
    Request(JsonRpcRequest),
    /// Fire-and-forget notification.
    Notification(JsonRpcNotification),
    /// A response (a client answering a server-initiated request).
    Response(JsonRpcResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn version_round_trip() {
        let s = serde_json::to_string(&JsonRpcVersion).unwrap();
        assert_eq!(s, "\"2.0\"");
        assert!(serde_json::from_str::<JsonRpcVersion>("\"2.0\"").is_ok());
        assert!(serde_json::from_str::<JsonRpcVersion>("\"1.0\"").is_err());
    }

    #[test]
    fn request_round_trip() {
        let raw = json!({
            "jsonrpc": "2.0",
            "id": "init-1",
            "method": "initialize",
            "params": {"protocolVersion": "2024-11-05"}
        });
        let req: JsonRpcRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.method, "initialize");
        assert_eq!(req.id, RequestId::String("init-1".into()));
    }

    #[test]
    fn numeric_ids_supported() {
        let raw = json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"});
        let req: JsonRpcRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.id, RequestId::Number(7));
    }

    #[test]
    fn response_flattens_payload() {
        let resp = JsonRpcResponse::success(json!({"ok": true}), RequestId::Number(1));
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["result"]["ok"], json!(true));
        assert!(v.get("error").is_none());

        let resp = JsonRpcResponse::error(
            JsonRpcError::method_not_found("nope"),
            RequestId::String("x".into()),
        );
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["error"]["code"], json!(-32601));
        assert!(v.get("result").is_none());
    }

    #[test]
    fn parse_error_has_null_id() {
        let resp = JsonRpcResponse::parse_error("bad json");
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["id"], Value::Null);
        assert_eq!(v["error"]["code"], json!(-32700));
    }

    #[test]
    fn message_union_distinguishes_kinds() {
        let req: JsonRpcMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "method": "m"})).unwrap();
        assert!(matches!(req, JsonRpcMessage::Request(_)));

        let notif: JsonRpcMessage = serde_json::from_value(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .unwrap();
        assert!(matches!(notif, JsonRpcMessage::Notification(_)));

        let resp: JsonRpcMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": {}})).unwrap();
        assert!(matches!(resp, JsonRpcMessage::Response(_)));
    }
}
