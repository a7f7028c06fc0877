//! Streamable HTTP transport handlers.
//!
//! The protocol surface is three methods on one path:
//!
//! - `POST /` - submit a protocol message; creates or continues a session
//! - `GET /` - open the server-to-client stream for an existing session,
//!   or return a human-readable info page to browsers
//! - `DELETE /` - terminate a session
//!
//! Session identity travels in the `mcp-session-id` request header. Every
//! failure is answered with the structured JSON-RPC error envelope and a
//! matching HTTP status; connections are never just dropped.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::RawQuery,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Json, Response,
    },
    routing::post,
    Router,
};
use futures::StreamExt;
use serde_json::Value;
use tokio_stream::wrappers::BroadcastStream;
use tracing::Instrument;

use crate::error::RpcError;
use crate::mcp::session::SessionRouter;

/// Request/response header carrying the session token.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Build the protocol routes mounted at `path` (e.g. `/mcp`).
pub fn mcp_routes<C>(path: &str, sessions: Arc<SessionRouter<C>>) -> Router
where
    C: Send + Sync + 'static,
{
    let post_sessions = sessions.clone();
    let get_sessions = sessions.clone();
    let delete_sessions = sessions;

    Router::new().route(
        path,
        post(
            move |headers: HeaderMap, RawQuery(query): RawQuery, body: Bytes| {
                let sessions = post_sessions.clone();
                async move {
                    handle_post(sessions, headers, query.unwrap_or_default(), body).await
                }
            },
        )
        .get(move |headers: HeaderMap| {
            let sessions = get_sessions.clone();
            async move { handle_get(sessions, headers).await }
        })
        .delete(move |headers: HeaderMap| {
            let sessions = delete_sessions.clone();
            async move { handle_delete(sessions, headers).await }
        }),
    )
}

fn session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn prefers_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

async fn handle_post<C>(
    sessions: Arc<SessionRouter<C>>,
    headers: HeaderMap,
    query: String,
    body: Bytes,
) -> Response
where
    C: Send + Sync,
{
    let session = session_header(&headers);

    let body: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(error) => {
            let err = RpcError::InvalidRequest(format!("malformed JSON body: {error}"));
            return (err.status(), Json(err.envelope(None))).into_response();
        }
    };
    let request_id = body.get("id").cloned();
    let method = body
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let span = tracing::info_span!(
        "mcp.request",
        method = %method,
        session_id = session.as_deref().unwrap_or(""),
    );

    match sessions
        .dispatch_post(session.as_deref(), &query, body)
        .instrument(span)
        .await
    {
        Ok(outcome) => {
            let mut response = match outcome.response {
                Some(payload) => (StatusCode::OK, Json(payload)).into_response(),
                // Notifications are accepted without a body.
                None => StatusCode::ACCEPTED.into_response(),
            };
            if let Some(token) = outcome.new_session {
                if let Ok(value) = HeaderValue::from_str(&token) {
                    response.headers_mut().insert(SESSION_HEADER, value);
                }
            }
            response
        }
        Err(error) => {
            tracing::debug!(error = %error, "request rejected");
            (error.status(), Json(error.envelope(request_id))).into_response()
        }
    }
}

async fn handle_get<C>(sessions: Arc<SessionRouter<C>>, headers: HeaderMap) -> Response
where
    C: Send + Sync,
{
    if prefers_html(&headers) {
        return Html(info_page(&sessions)).into_response();
    }

    match sessions.open_stream(session_header(&headers).as_deref()).await {
        Ok(receiver) => {
            let stream = BroadcastStream::new(receiver)
                .filter_map(|message| async move { message.ok() })
                .map(|value| Ok::<Event, Infallible>(Event::default().data(value.to_string())));
            Sse::new(stream)
                .keep_alive(KeepAlive::default())
                .into_response()
        }
        Err(error) => (error.status(), Json(error.envelope(None))).into_response(),
    }
}

async fn handle_delete<C>(sessions: Arc<SessionRouter<C>>, headers: HeaderMap) -> Response
where
    C: Send + Sync,
{
    match sessions.terminate(session_header(&headers).as_deref()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => (error.status(), Json(error.envelope(None))).into_response(),
    }
}

fn info_page<C>(sessions: &SessionRouter<C>) -> String
where
    C: Send + Sync,
{
    let instructions = sessions
        .instructions()
        .map(|text| format!("<p>{text}</p>"))
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{name}</title></head>\n<body>\n\
         <h1>{name} v{version}</h1>\n{instructions}\
         <p>This is an MCP endpoint. POST JSON-RPC messages to this path, \
         starting with an <code>initialize</code> request.</p>\n</body>\n</html>\n",
        name = sessions.server_name(),
        version = sessions.server_version(),
    )
}
