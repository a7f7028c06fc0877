//! The session router.
//!
//! Multiplexes many concurrent logical conversations over stateless HTTP
//! requests. The router owns the only map from session token to live
//! endpoint; nothing else holds a reference. Per request it decides to
//! create, reuse, or reject a session:
//!
//! - token present and known: reuse the bound endpoint as-is
//! - token present and unknown: structured "not found" - tokens are never
//!   client-assigned, so an unknown token is authoritative and no session
//!   is created even for an initialize-shaped body
//! - no token, valid initialize body: build a fresh capability set from
//!   this request's query flags, bind a new endpoint, and store the minted
//!   token the moment the handshake completes
//! - no token, anything else: structured "missing session"
//!
//! In stateless mode every POST gets a fresh detached endpoint and the map
//! is never touched; GET and DELETE are meaningless and answer 405.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, RwLock};

use crate::capability::{CapabilitySet, ServerSpec};
use crate::config::ProcessFlags;
use crate::error::RpcError;
use crate::flags::FeatureFlags;
use crate::mcp::endpoint::{EndpointEvent, McpEndpoint};
use crate::mcp::jsonrpc;

/// Whether the router keeps a session map across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Stateful,
    Stateless,
}

struct SessionEntry {
    endpoint: Arc<McpEndpoint>,
    /// Creation order, used to sweep sessions deterministically on
    /// shutdown.
    seq: u64,
}

/// Outcome of a POST dispatch: the response body (absent for
/// notifications) and the token of a session created by this request.
#[derive(Debug)]
pub struct PostOutcome {
    pub response: Option<Value>,
    pub new_session: Option<String>,
}

pub struct SessionRouter<C> {
    mode: SessionMode,
    context: C,
    spec: Arc<ServerSpec<C>>,
    process_flags: ProcessFlags,
    sessions: RwLock<HashMap<String, Arc<SessionEntry>>>,
    next_seq: AtomicU64,
}

impl<C: Send + Sync> SessionRouter<C> {
    pub fn new(
        mode: SessionMode,
        context: C,
        spec: Arc<ServerSpec<C>>,
        process_flags: ProcessFlags,
    ) -> Self {
        SessionRouter {
            mode,
            context,
            spec,
            process_flags,
            sessions: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn server_name(&self) -> &str {
        &self.spec.name
    }

    pub fn server_version(&self) -> &str {
        &self.spec.version
    }

    pub fn instructions(&self) -> Option<&str> {
        self.spec.instructions.as_deref()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Build a capability set from one request's query flags layered over
    /// the process defaults.
    fn build_capabilities(&self, query: &str) -> Result<Arc<CapabilitySet>, RpcError> {
        let flags = FeatureFlags::from_query(query);
        CapabilitySet::build(&self.context, &self.process_flags, &flags, &self.spec)
            .map(Arc::new)
            .map_err(|error| RpcError::Internal(error.to_string()))
    }

    /// The capability set for surfaces that exist outside any session
    /// (REST mounting): process defaults only.
    pub fn default_capabilities(
        &self,
    ) -> Result<Arc<CapabilitySet>, crate::capability::RegistryError> {
        CapabilitySet::build(
            &self.context,
            &self.process_flags,
            &FeatureFlags::default(),
            &self.spec,
        )
        .map(Arc::new)
    }

    /// Dispatch one POST body per the state machine above.
    pub async fn dispatch_post(
        &self,
        session: Option<&str>,
        query: &str,
        body: Value,
    ) -> Result<PostOutcome, RpcError> {
        if self.mode == SessionMode::Stateless {
            let caps = self.build_capabilities(query)?;
            let endpoint = McpEndpoint::detached(caps);
            let outcome = endpoint.handle(body).await;
            // The endpoint and everything it opened drops with this scope,
            // whether the response is delivered or the connection died.
            return Ok(PostOutcome {
                response: outcome.response,
                new_session: None,
            });
        }

        match session {
            Some(token) => {
                let entry = self.sessions.read().await.get(token).cloned();
                let Some(entry) = entry else {
                    return Err(RpcError::UnknownSession(token.to_string()));
                };
                let outcome = entry.endpoint.handle(body).await;
                Ok(PostOutcome {
                    response: outcome.response,
                    new_session: None,
                })
            }
            None => {
                if !jsonrpc::is_initialize(&body) {
                    return Err(RpcError::MissingSession);
                }
                let caps = self.build_capabilities(query)?;
                let endpoint = Arc::new(McpEndpoint::new(caps));
                let outcome = endpoint.handle(body).await;

                let new_session = match outcome.event {
                    Some(EndpointEvent::Initialized { session_id }) => {
                        // Stored before the response (and therefore the
                        // token) can reach the client, so there is no
                        // window where a known token is not yet routable.
                        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                        let entry = Arc::new(SessionEntry {
                            endpoint: endpoint.clone(),
                            seq,
                        });
                        self.sessions
                            .write()
                            .await
                            .insert(session_id.clone(), entry);
                        tracing::info!(session_id = %session_id, "session initialized");
                        Some(session_id)
                    }
                    None => None,
                };

                Ok(PostOutcome {
                    response: outcome.response,
                    new_session,
                })
            }
        }
    }

    /// Open the server-to-client stream for an existing session.
    pub async fn open_stream(
        &self,
        session: Option<&str>,
    ) -> Result<broadcast::Receiver<Value>, RpcError> {
        if self.mode == SessionMode::Stateless {
            return Err(RpcError::StatelessMethod);
        }
        let token = session.ok_or(RpcError::MissingSession)?;
        let entry = self
            .sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| RpcError::UnknownSession(token.to_string()))?;
        entry
            .endpoint
            .subscribe()
            .ok_or_else(|| RpcError::UnknownSession(token.to_string()))
    }

    /// Look up a live endpoint, e.g. to push notifications into its
    /// stream.
    pub async fn endpoint(&self, token: &str) -> Option<Arc<McpEndpoint>> {
        self.sessions
            .read()
            .await
            .get(token)
            .map(|entry| entry.endpoint.clone())
    }

    /// Explicit termination (DELETE): close the endpoint and forget the
    /// token.
    pub async fn terminate(&self, session: Option<&str>) -> Result<(), RpcError> {
        if self.mode == SessionMode::Stateless {
            return Err(RpcError::StatelessMethod);
        }
        let token = session.ok_or(RpcError::MissingSession)?;
        let entry = self
            .sessions
            .write()
            .await
            .remove(token)
            .ok_or_else(|| RpcError::UnknownSession(token.to_string()))?;
        entry.endpoint.close();
        tracing::info!(session_id = %token, "session terminated");
        Ok(())
    }

    /// Shutdown sweep: close every session in creation order. Best-effort,
    /// one failing endpoint does not stop the others.
    pub async fn close_all(&self) {
        let mut entries: Vec<(String, Arc<SessionEntry>)> =
            self.sessions.write().await.drain().collect();
        entries.sort_by_key(|(_, entry)| entry.seq);
        for (token, entry) in entries {
            tracing::info!(session_id = %token, "closing session");
            entry.endpoint.close();
        }
    }
}
