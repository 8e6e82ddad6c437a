use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ErrorCode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// `None` only when the member is absent; an explicit `null` id is kept.
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcRequest {
    /// A request without an id is a notification and never gets a response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub fn success(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: Some(result),
        error: None,
    }
}

pub fn error(id: Value, code: ErrorCode, message: impl Into<String>, data: Option<Value>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: None,
        error: Some(JsonRpcError {
            code: code.code(),
            message: message.into(),
            data,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_without_id_is_notification() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(req.is_notification());
        assert_eq!(req.params, Value::Null);
    }

    #[test]
    fn test_null_id_is_a_request() {
        let req: JsonRpcRequest = serde_json::from_str(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap();
        assert!(!req.is_notification());
        assert_eq!(req.id, Some(Value::Null));
    }

    #[test]
    fn test_success_omits_error_field() {
        let resp = success(json!(7), json!({"ok": true}));
        let text = serde_json::to_string(&resp).unwrap();
        assert!(text.contains("\"result\""));
        assert!(!text.contains("\"error\""));
    }

    #[test]
    fn test_error_carries_numeric_code() {
        let resp = error(json!("abc"), ErrorCode::MethodNotFound, "method not found: foo", None);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["error"]["code"], json!(-32601));
        assert_eq!(value["id"], json!("abc"));
        assert!(value.get("result").is_none());
    }
}
