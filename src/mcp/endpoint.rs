//! The per-session protocol endpoint.
//!
//! An [`McpEndpoint`] owns one conversation's capability set and its
//! handshake state machine. The session router creates one endpoint per
//! session (stateful mode) or per request (stateless mode) and forwards
//! decoded message bodies to [`McpEndpoint::handle`].
//!
//! Handshake states: initialize is only accepted once, and every other
//! request is rejected until the initialize exchange happened. Stateless
//! endpoints skip the handshake requirement because each request stands
//! alone.

use std::sync::{Arc, Mutex, OnceLock};

use serde_json::{json, Map, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::capability::CapabilitySet;
use crate::error::code;
use crate::mcp::jsonrpc::{self, McpRequest};

/// Protocol revision answered to clients that do not request a specific one.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Events the endpoint reports back to the router, consumed synchronously
/// within the dispatch that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    /// The initialize handshake completed and this token now identifies
    /// the session.
    Initialized { session_id: String },
}

/// Result of handling one message: the response to send (if any) plus an
/// optional lifecycle event.
pub struct HandleOutcome {
    pub response: Option<Value>,
    pub event: Option<EndpointEvent>,
}

pub struct McpEndpoint {
    caps: Arc<CapabilitySet>,
    state: Mutex<HandshakeState>,
    /// Enforce the initialize-first handshake. Stateless endpoints accept
    /// any method immediately.
    strict_handshake: bool,
    session_id: OnceLock<String>,
    /// Server-to-client stream; taken (and thereby closed) on close.
    notifications: Mutex<Option<broadcast::Sender<Value>>>,
}

impl McpEndpoint {
    /// A session-bound endpoint with the full handshake state machine.
    pub fn new(caps: Arc<CapabilitySet>) -> Self {
        Self::build(caps, true, HandshakeState::Uninitialized)
    }

    /// A per-request endpoint for stateless mode: no handshake required,
    /// no session token ever reported.
    pub fn detached(caps: Arc<CapabilitySet>) -> Self {
        Self::build(caps, false, HandshakeState::Ready)
    }

    fn build(caps: Arc<CapabilitySet>, strict_handshake: bool, state: HandshakeState) -> Self {
        let (notifications, _) = broadcast::channel(32);
        McpEndpoint {
            caps,
            state: Mutex::new(state),
            strict_handshake,
            session_id: OnceLock::new(),
            notifications: Mutex::new(Some(notifications)),
        }
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.caps
    }

    /// The session token, available once the handshake completed.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.get().map(String::as_str)
    }

    /// Subscribe to the server-to-client stream. `None` once closed.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<Value>> {
        self.notifications
            .lock()
            .expect("notifications lock poisoned")
            .as_ref()
            .map(broadcast::Sender::subscribe)
    }

    /// Push a notification to every open server-to-client stream.
    pub fn notify(&self, method: &str, params: Value) {
        let guard = self
            .notifications
            .lock()
            .expect("notifications lock poisoned");
        if let Some(sender) = guard.as_ref() {
            // No receivers is fine; streams are optional.
            let _ = sender.send(json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
            }));
        }
    }

    /// Close the endpoint: ends open streams and refuses further requests.
    pub fn close(&self) {
        *self.state.lock().expect("state lock poisoned") = HandshakeState::Closed;
        self.notifications
            .lock()
            .expect("notifications lock poisoned")
            .take();
    }

    /// Handle one decoded message body.
    pub async fn handle(&self, message: Value) -> HandleOutcome {
        let request = match jsonrpc::parse_request(&message) {
            Ok(request) => request,
            Err(reason) => {
                return HandleOutcome {
                    response: Some(jsonrpc::error(
                        message.get("id").cloned(),
                        code::SESSION,
                        format!("Invalid request: {reason}"),
                    )),
                    event: None,
                };
            }
        };

        if request.is_notification() {
            self.handle_notification(&request);
            return HandleOutcome {
                response: None,
                event: None,
            };
        }

        let id = request.id.clone();
        match self.dispatch(&request).await {
            Ok((result, event)) => HandleOutcome {
                response: Some(jsonrpc::success(id, result)),
                event,
            },
            Err((error_code, message)) => HandleOutcome {
                response: Some(jsonrpc::error(id, error_code, message)),
                event: None,
            },
        }
    }

    fn handle_notification(&self, request: &McpRequest) {
        match request.method.as_str() {
            "notifications/initialized" => {
                let mut state = self.state.lock().expect("state lock poisoned");
                if *state == HandshakeState::Initializing {
                    *state = HandshakeState::Ready;
                }
            }
            "notifications/cancelled" => {
                tracing::debug!(params = %request.params, "request cancelled by client");
            }
            other => {
                tracing::debug!(method = %other, "ignoring notification");
            }
        }
    }

    async fn dispatch(
        &self,
        request: &McpRequest,
    ) -> Result<(Value, Option<EndpointEvent>), (i64, String)> {
        let method = request.method.as_str();
        let params = &request.params;

        if method == "initialize" {
            return self.handle_initialize(params);
        }

        {
            let state = *self.state.lock().expect("state lock poisoned");
            if state == HandshakeState::Closed {
                return Err((code::SESSION, "Session is closed".to_string()));
            }
            if self.strict_handshake && state == HandshakeState::Uninitialized && method != "ping"
            {
                return Err((
                    code::SESSION,
                    "Server not initialized: send initialize first".to_string(),
                ));
            }
        }

        match method {
            "ping" => Ok((json!({}), None)),

            "tools/list" => Ok((json!({ "tools": self.caps.list_tools() }), None)),

            "tools/call" => {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| (code::INVALID_PARAMS, "Missing tool name".to_string()))?;
                let tool = self
                    .caps
                    .tool(name)
                    .ok_or_else(|| (code::INVALID_PARAMS, format!("Unknown tool: {name}")))?;
                let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                let result = tool.invoke(args).await;
                let result = serde_json::to_value(result)
                    .map_err(|e| (code::INTERNAL, format!("Failed to serialize result: {e}")))?;
                Ok((result, None))
            }

            "prompts/list" => Ok((json!({ "prompts": self.caps.list_prompts() }), None)),

            "prompts/get" => {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| (code::INVALID_PARAMS, "Missing prompt name".to_string()))?;
                let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                let result = self
                    .caps
                    .get_prompt(name, args)
                    .await
                    .ok_or_else(|| (code::INVALID_PARAMS, format!("Unknown prompt: {name}")))?
                    .map_err(|e| (code::INTERNAL, e.to_string()))?;
                let result = serde_json::to_value(result)
                    .map_err(|e| (code::INTERNAL, format!("Failed to serialize result: {e}")))?;
                Ok((result, None))
            }

            "resources/list" => {
                let resources = self
                    .caps
                    .list_resources()
                    .await
                    .map_err(|e| (code::INTERNAL, e.to_string()))?;
                Ok((json!({ "resources": resources }), None))
            }

            "resources/templates/list" => Ok((
                json!({ "resourceTemplates": self.caps.list_resource_templates() }),
                None,
            )),

            "resources/read" => {
                let uri = params
                    .get("uri")
                    .and_then(Value::as_str)
                    .ok_or_else(|| (code::INVALID_PARAMS, "Missing resource uri".to_string()))?;
                let contents = self
                    .caps
                    .read_resource(uri)
                    .await
                    .ok_or_else(|| (code::INVALID_PARAMS, format!("Unknown resource: {uri}")))?
                    .map_err(|e| (code::INTERNAL, e.to_string()))?;
                Ok((json!({ "contents": contents }), None))
            }

            other => Err((code::METHOD_NOT_FOUND, format!("Method not found: {other}"))),
        }
    }

    fn handle_initialize(
        &self,
        params: &Value,
    ) -> Result<(Value, Option<EndpointEvent>), (i64, String)> {
        if self.strict_handshake {
            let mut state = self.state.lock().expect("state lock poisoned");
            if *state != HandshakeState::Uninitialized {
                return Err((code::SESSION, "Server already initialized".to_string()));
            }
            *state = HandshakeState::Initializing;
        }

        let protocol_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);

        let mut capabilities = Map::new();
        if self.caps.has_tools() {
            capabilities.insert("tools".to_string(), json!({}));
        }
        if self.caps.has_prompts() {
            capabilities.insert("prompts".to_string(), json!({}));
        }
        if self.caps.has_resources() {
            capabilities.insert("resources".to_string(), json!({}));
        }

        let mut result = Map::new();
        result.insert("protocolVersion".to_string(), json!(protocol_version));
        result.insert("capabilities".to_string(), Value::Object(capabilities));
        result.insert(
            "serverInfo".to_string(),
            json!({
                "name": self.caps.server_name,
                "version": self.caps.server_version,
            }),
        );
        if let Some(instructions) = &self.caps.instructions {
            result.insert("instructions".to_string(), json!(instructions));
        }

        let event = if self.strict_handshake {
            let session_id = self
                .session_id
                .get_or_init(|| Uuid::new_v4().to_string())
                .clone();
            Some(EndpointEvent::Initialized { session_id })
        } else {
            None
        };

        Ok((Value::Object(result), event))
    }
}
