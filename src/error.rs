//! Error types shared across the protocol and REST surfaces.
//!
//! Protocol-shaped failures ([`RpcError`]) carry both a JSON-RPC error code
//! and the HTTP status that accompanies the envelope, so the session router
//! can answer every failure with a well-formed structured response instead
//! of a dropped connection.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use thiserror::Error;

/// JSON-RPC error codes used on the wire.
pub mod code {
    /// Request/session-shape errors (missing, unknown or stale session,
    /// malformed envelope).
    pub const SESSION: i64 = -32000;
    /// Standard JSON-RPC "method not found".
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Standard JSON-RPC "invalid params".
    pub const INVALID_PARAMS: i64 = -32602;
    /// Unexpected internal failure.
    pub const INTERNAL: i64 = -32603;
}

/// Protocol-level failures produced by the session router.
#[derive(Debug, Error)]
pub enum RpcError {
    /// POST without a session header whose body is not an initialize request.
    #[error("Bad Request: no valid session ID provided")]
    MissingSession,

    /// A well-formed session token the session map does not contain.
    /// Tokens are never client-assigned, so this is authoritative: the
    /// session expired or never existed and the caller must re-initialize.
    #[error("Session not found: {0}")]
    UnknownSession(String),

    /// GET/DELETE in stateless mode, where no session can exist.
    #[error("Method not allowed in stateless mode")]
    StatelessMethod,

    /// Malformed JSON-RPC envelope or request body.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Anything unexpected while dispatching a request.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::MissingSession | RpcError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::UnknownSession(_) => StatusCode::NOT_FOUND,
            RpcError::StatelessMethod => StatusCode::METHOD_NOT_ALLOWED,
            RpcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            RpcError::Internal(_) => code::INTERNAL,
            _ => code::SESSION,
        }
    }

    /// Render the structured error envelope, echoing the request id when the
    /// body yielded one.
    pub fn envelope(&self, id: Option<Value>) -> Value {
        json!({
            "jsonrpc": "2.0",
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            },
            "id": id.unwrap_or(Value::Null),
        })
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self.envelope(None))).into_response()
    }
}

/// Startup and configuration failures. These abort the process with a
/// non-zero exit code rather than being translated onto the wire.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Capability registration failed: {0}")]
    Registry(#[from] crate::capability::RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_echoes_request_id() {
        let err = RpcError::UnknownSession("abc".into());
        let envelope = err.envelope(Some(json!(7)));
        assert_eq!(envelope["jsonrpc"], "2.0");
        assert_eq!(envelope["id"], 7);
        assert_eq!(envelope["error"]["code"], code::SESSION);
        assert!(envelope["error"]["message"]
            .as_str()
            .unwrap()
            .contains("abc"));
    }

    #[test]
    fn envelope_defaults_to_null_id() {
        let envelope = RpcError::MissingSession.envelope(None);
        assert!(envelope["id"].is_null());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(RpcError::MissingSession.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RpcError::UnknownSession(String::new()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RpcError::StatelessMethod.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            RpcError::Internal(String::new()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(RpcError::Internal(String::new()).code(), code::INTERNAL);
    }
}
