//! manifoldmcp - a session-routing MCP server framework.
//!
//! Declare tools, prompts and resources once as factories on a
//! [`ServerSpec`]; serve them over stdio, streamable HTTP (with many
//! concurrent sessions multiplexed over stateless requests) and plain REST
//! routes, all under one layered visibility policy and one instrumented
//! invocation path.
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use manifoldmcp::{ServerSpec, SessionMode, SessionRouter, ToolDef};
//! use manifoldmcp::config::ProcessFlags;
//!
//! let spec = ServerSpec::new("my-server", "1.0.0").tool(|_ctx: &(), _flags| {
//!     ToolDef::new("echo", json!({"type": "object"}), |args| async move { Ok(args) })
//! });
//! let sessions = Arc::new(SessionRouter::new(
//!     SessionMode::Stateful,
//!     (),
//!     Arc::new(spec),
//!     ProcessFlags::from_env(),
//! ));
//! let app = manifoldmcp::server::build_app(sessions).unwrap();
//! # let _ = app;
//! ```

pub mod capability;
pub mod config;
pub mod demo;
pub mod error;
pub mod flags;
pub mod mcp;
pub mod rest;
pub mod server;
pub mod shutdown;
pub mod stdio;

pub use capability::{
    CapabilitySet, PromptDef, PromptMessage, PromptResult, ResourceContents, ResourceDef,
    ResourceDescriptor, RestMethod, ServerSpec, ToolDef,
};
pub use config::{HttpConfig, ProcessFlags};
pub use error::{RpcError, ServerError};
pub use flags::{Category, FeatureFlags};
pub use mcp::{SessionMode, SessionRouter, SESSION_HEADER};
pub use shutdown::ShutdownCoordinator;
