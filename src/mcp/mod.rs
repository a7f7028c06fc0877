//! The MCP protocol surface.
//!
//! - [`jsonrpc`] - envelope parsing and response building
//! - [`endpoint`] - the per-session protocol endpoint and its handshake
//!   state machine
//! - [`session`] - the session router multiplexing conversations over
//!   stateless HTTP requests
//! - [`http`] - the axum handlers binding the router to `POST`/`GET`/
//!   `DELETE`

pub mod endpoint;
pub mod http;
pub mod jsonrpc;
pub mod session;

pub use endpoint::{EndpointEvent, HandleOutcome, McpEndpoint, PROTOCOL_VERSION};
pub use http::{mcp_routes, SESSION_HEADER};
pub use session::{PostOutcome, SessionMode, SessionRouter};
