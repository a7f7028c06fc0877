//! Integration tests for the stateful session router over HTTP.
//!
//! Drives the full axum app the way a streamable-HTTP client would:
//! initialize to get a session token, then route follow-up requests with
//! the `mcp-session-id` header.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

use manifoldmcp::{
    config::ProcessFlags,
    demo::{demo_spec, DemoContext},
    server::build_app,
    SessionMode, SessionRouter, SESSION_HEADER,
};

fn test_app() -> (Arc<SessionRouter<DemoContext>>, Router) {
    let sessions = Arc::new(SessionRouter::new(
        SessionMode::Stateful,
        DemoContext::default(),
        Arc::new(demo_spec()),
        ProcessFlags::default(),
    ));
    let app = build_app(sessions.clone()).expect("failed to build app");
    (sessions, app)
}

fn post_mcp(body: &Value, session: Option<&str>, query: &str) -> Request<Body> {
    let uri = if query.is_empty() {
        "/mcp".to_string()
    } else {
        format!("/mcp?{query}")
    };
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(session) = session {
        builder = builder.header(SESSION_HEADER, session);
    }
    builder
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn initialize_body() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": { "protocolVersion": "2025-03-26" }
    })
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response was not JSON")
}

/// Run initialize and return the minted session token.
async fn start_session(app: &Router, query: &str) -> String {
    let response = app
        .clone()
        .oneshot(post_mcp(&initialize_body(), None, query))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response
        .headers()
        .get(SESSION_HEADER)
        .expect("initialize response should carry a session token")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn initialize_creates_a_routable_session() {
    let (sessions, app) = test_app();
    let token = start_session(&app, "").await;
    assert_eq!(sessions.session_count().await, 1);

    // Every request with the token routes to the same live endpoint.
    for id in 2..5 {
        let response = app
            .clone()
            .oneshot(post_mcp(
                &json!({"jsonrpc": "2.0", "id": id, "method": "tools/list"}),
                Some(&token),
                "",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["id"], id);
        let names: Vec<&str> = body["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["echo", "uptime"]);
    }
}

#[tokio::test]
async fn unknown_token_yields_not_found_and_no_session() {
    let (sessions, app) = test_app();

    let response = app
        .clone()
        .oneshot(post_mcp(&initialize_body(), Some("no-such-token"), ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], -32000);
    assert_eq!(sessions.session_count().await, 0);
}

#[tokio::test]
async fn missing_session_on_non_initialize_is_bad_request() {
    let (sessions, app) = test_app();

    let response = app
        .clone()
        .oneshot(post_mcp(
            &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
            None,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], -32000);
    assert_eq!(body["id"], 1);
    assert_eq!(sessions.session_count().await, 0);
}

#[tokio::test]
async fn two_initializes_get_independent_sessions() {
    let (sessions, app) = test_app();
    let first = start_session(&app, "").await;
    let second = start_session(&app, "").await;
    assert_ne!(first, second);
    assert_eq!(sessions.session_count().await, 2);

    // Terminating one leaves the other reachable.
    let delete = Request::builder()
        .method("DELETE")
        .uri("/mcp")
        .header(SESSION_HEADER, &first)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(post_mcp(
            &json!({"jsonrpc": "2.0", "id": 5, "method": "ping"}),
            Some(&second),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_mcp(
            &json!({"jsonrpc": "2.0", "id": 6, "method": "ping"}),
            Some(&first),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_flags_stick_for_the_whole_session() {
    let (_sessions, app) = test_app();
    let token = start_session(&app, "disabled_tools=echo").await;

    let response = app
        .clone()
        .oneshot(post_mcp(
            &json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            Some(&token),
            // Flags on follow-up requests are ignored; the set was bound at
            // initialize time.
            "disabled_tools=",
        ))
        .await
        .unwrap();
    let body = response_json(response).await;
    let names: Vec<&str> = body["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["uptime"]);
}

#[tokio::test]
async fn notifications_are_accepted_without_a_body() {
    let (_sessions, app) = test_app();
    let token = start_session(&app, "").await;

    let response = app
        .clone()
        .oneshot(post_mcp(
            &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            Some(&token),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn malformed_json_body_is_a_structured_error() {
    let (_sessions, app) = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], -32000);
}

#[tokio::test]
async fn get_without_token_is_bad_request() {
    let (_sessions, app) = test_app();
    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .header("accept", "text/event-stream")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_with_unknown_token_is_not_found() {
    let (_sessions, app) = test_app();
    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .header("accept", "text/event-stream")
        .header(SESSION_HEADER, "gone")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_with_valid_token_opens_an_event_stream() {
    let (_sessions, app) = test_app();
    let token = start_session(&app, "").await;

    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .header("accept", "text/event-stream")
        .header(SESSION_HEADER, &token)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
}

#[tokio::test]
async fn server_push_reaches_open_streams() {
    let (sessions, app) = test_app();
    let token = start_session(&app, "").await;

    let mut receiver = sessions.open_stream(Some(&token)).await.unwrap();
    let endpoint = sessions.endpoint(&token).await.unwrap();
    endpoint.notify(
        "notifications/message",
        json!({ "level": "info", "data": "hello" }),
    );

    let message = receiver.recv().await.unwrap();
    assert_eq!(message["method"], "notifications/message");
    assert_eq!(message["params"]["data"], "hello");
}

#[tokio::test]
async fn browsers_get_an_info_page() {
    let (_sessions, app) = test_app();
    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .header("accept", "text/html,application/xhtml+xml")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("manifoldmcp"));
}

#[tokio::test]
async fn delete_without_token_is_bad_request() {
    let (_sessions, app) = test_app();
    let request = Request::builder()
        .method("DELETE")
        .uri("/mcp")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tool_failure_is_a_normal_response_not_a_transport_error() {
    use manifoldmcp::{ServerSpec, ToolDef};

    let spec = ServerSpec::new("failing", "0.0.1").tool(|_ctx: &(), _flags| {
        ToolDef::new("broken", json!({"type": "object"}), |_| async move {
            Err(anyhow::anyhow!("backend unavailable"))
        })
    });
    let sessions = Arc::new(SessionRouter::new(
        SessionMode::Stateful,
        (),
        Arc::new(spec),
        ProcessFlags::default(),
    ));
    let app = build_app(sessions).unwrap();
    let token = start_session(&app, "").await;

    let response = app
        .clone()
        .oneshot(post_mcp(
            &json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/call",
                "params": { "name": "broken", "arguments": {} }
            }),
            Some(&token),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert!(body.get("error").is_none());
    assert_eq!(body["result"]["isError"], true);
    assert!(body["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("backend unavailable"));
}

#[tokio::test]
async fn prompt_failure_surfaces_as_a_protocol_error() {
    let (_sessions, app) = test_app();
    let token = start_session(&app, "").await;

    // The greeting prompt requires a name.
    let response = app
        .clone()
        .oneshot(post_mcp(
            &json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "prompts/get",
                "params": { "name": "greeting", "arguments": {} }
            }),
            Some(&token),
            "",
        ))
        .await
        .unwrap();
    // Prompt failures surface as protocol-level errors.
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], -32603);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("missing required argument"));
}

#[tokio::test]
async fn resources_are_served_through_the_session() {
    let (_sessions, app) = test_app();
    let token = start_session(&app, "").await;

    let response = app
        .clone()
        .oneshot(post_mcp(
            &json!({
                "jsonrpc": "2.0",
                "id": 8,
                "method": "resources/read",
                "params": { "uri": "demo://guides/sessions" }
            }),
            Some(&token),
            "",
        ))
        .await
        .unwrap();
    let body = response_json(response).await;
    assert!(body["result"]["contents"][0]["text"]
        .as_str()
        .unwrap()
        .contains("initialize"));

    let response = app
        .clone()
        .oneshot(post_mcp(
            &json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "resources/list",
                "params": {}
            }),
            Some(&token),
            "",
        ))
        .await
        .unwrap();
    let body = response_json(response).await;
    let uris: Vec<&str> = body["result"]["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["uri"].as_str().unwrap())
        .collect();
    assert!(uris.contains(&"demo://server/info"));
    assert!(uris.contains(&"demo://guides/sessions"));
}
