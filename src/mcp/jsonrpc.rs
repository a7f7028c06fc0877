//! Minimal JSON-RPC 2.0 envelope handling.
//!
//! Requests are parsed leniently into [`McpRequest`]; the original `id`
//! value is preserved exactly as received (string, integer or null) so
//! responses echo the same type. A message without an `id` field is a
//! notification and receives no response.

use serde_json::{json, Value};

/// A parsed JSON-RPC message.
#[derive(Debug, Clone)]
pub struct McpRequest {
    /// Request id as received; `None` marks a notification.
    pub id: Option<Value>,
    pub method: String,
    pub params: Value,
}

impl McpRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Validate the envelope shape: `jsonrpc` must be `"2.0"` and `method` a
/// string. The error string feeds the structured error response.
pub fn parse_request(message: &Value) -> Result<McpRequest, String> {
    if !message.is_object() {
        return Err("request must be a JSON object".to_string());
    }
    match message.get("jsonrpc").and_then(Value::as_str) {
        Some("2.0") => {}
        Some(other) => return Err(format!("unsupported jsonrpc version: {other}")),
        None => return Err("missing jsonrpc field".to_string()),
    }
    let method = message
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing method field".to_string())?
        .to_string();
    Ok(McpRequest {
        id: message.get("id").cloned(),
        method,
        params: message.get("params").cloned().unwrap_or_else(|| json!({})),
    })
}

/// True when the body is an initialize request, the only message allowed
/// to create a session.
pub fn is_initialize(message: &Value) -> bool {
    message.get("method").and_then(Value::as_str) == Some("initialize")
}

pub fn success(id: Option<Value>, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "result": result,
    })
}

pub fn error(id: Option<Value>, code: i64, message: impl AsRef<str>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "error": {
            "code": code,
            "message": message.as_ref(),
        },
    })
}
