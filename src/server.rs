//! HTTP server assembly.
//!
//! Mounts the protocol surface at `/mcp` and the REST surface at `/api`,
//! with CORS and request tracing layered on both. The listener shuts down
//! gracefully through the [`ShutdownCoordinator`]: cleanup actions are
//! registered here in startup order (listener close, then session sweep).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderName, Method};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::HttpConfig;
use crate::error::ServerError;
use crate::mcp::http::{mcp_routes, SESSION_HEADER};
use crate::mcp::session::SessionRouter;
use crate::rest::rest_router;
use crate::shutdown::ShutdownCoordinator;

/// Build the complete application router. Separated from [`serve_http`] so
/// tests can drive it without a socket.
pub fn build_app<C>(sessions: Arc<SessionRouter<C>>) -> Result<Router, ServerError>
where
    C: Send + Sync + 'static,
{
    // The REST surface lives outside any session, so it is mounted once
    // from the process-level capability set.
    let rest_caps = sessions.default_capabilities()?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("mcp-protocol-version"),
            HeaderName::from_static(SESSION_HEADER),
        ])
        .expose_headers([HeaderName::from_static(SESSION_HEADER)])
        .max_age(std::time::Duration::from_secs(3600));

    Ok(Router::new()
        .merge(mcp_routes("/mcp", sessions.clone()))
        .nest("/api", rest_router(rest_caps))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

pub async fn serve_http<C>(
    sessions: Arc<SessionRouter<C>>,
    config: &HttpConfig,
    shutdown: &Arc<ShutdownCoordinator>,
) -> Result<(), ServerError>
where
    C: Send + Sync + 'static,
{
    let app = build_app(sessions.clone())?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", config.host, config.port)))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    let token = CancellationToken::new();
    {
        let token = token.clone();
        shutdown.register("http-listener", move || async move {
            token.cancel();
            Ok(())
        });
    }
    {
        let sessions = sessions.clone();
        shutdown.register("session-sweep", move || async move {
            sessions.close_all().await;
            Ok(())
        });
    }

    tracing::info!(
        addr = %addr,
        mode = ?sessions.mode(),
        "HTTP server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(token.cancelled_owned())
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    Ok(())
}
