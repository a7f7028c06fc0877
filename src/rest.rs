//! REST surface: conventional HTTP routes for tools that declared one.
//!
//! Each visible tool with a method + route is mounted at that path. The
//! input object is merged from path parameters, query string and JSON body
//! (body wins conflicts), validated against the tool's declared input
//! schema, and handed to the same instrumented invocation path the
//! protocol surface uses. The response body is the structured result, or
//! the tool's declared projection of it.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{RawPathParams, RawQuery},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Map, Value};

use crate::capability::{CapabilitySet, ContentBlock, RestMethod};

pub fn rest_router(caps: Arc<CapabilitySet>) -> Router {
    let mut router = Router::new();

    let routes: Vec<(RestMethod, String, String)> = caps
        .rest_tools()
        .map(|tool| {
            (
                tool.def.method.expect("rest tool has method"),
                tool.def.route.clone().expect("rest tool has route"),
                tool.def.name.clone(),
            )
        })
        .collect();

    for (method, route, name) in routes {
        let caps = caps.clone();
        let handler = move |params: RawPathParams, RawQuery(query): RawQuery, body: Bytes| {
            let caps = caps.clone();
            let name = name.clone();
            async move { handle_call(caps, name, params, query, body).await }
        };
        let method_router = match method {
            RestMethod::Get => get(handler),
            RestMethod::Post => post(handler),
            RestMethod::Put => put(handler),
            RestMethod::Delete => delete(handler),
        };
        router = router.route(&route, method_router);
        tracing::debug!(route = %route, "mounted REST route");
    }

    router
}

async fn handle_call(
    caps: Arc<CapabilitySet>,
    name: String,
    params: RawPathParams,
    query: Option<String>,
    body: Bytes,
) -> Response {
    let Some(tool) = caps.tool(&name) else {
        // Routes are built from the same set we look up in, so this only
        // fires if the set was rebuilt underneath us.
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Unknown tool: {name}") })),
        )
            .into_response();
    };

    let mut input = Map::new();
    for (key, value) in &params {
        input.insert(key.to_string(), coerce(&tool.def.input_schema, key, value));
    }
    if let Some(query) = &query {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let coerced = coerce(&tool.def.input_schema, &key, &value);
            input.insert(key.into_owned(), coerced);
        }
    }
    if !body.is_empty() {
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(fields)) => {
                for (key, value) in fields {
                    input.insert(key, value);
                }
            }
            Ok(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "request body must be a JSON object" })),
                )
                    .into_response();
            }
            Err(error) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("malformed JSON body: {error}") })),
                )
                    .into_response();
            }
        }
    }

    let input = Value::Object(input);
    if let Err(issues) = tool.validate_input(&input) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "input validation failure", "issues": issues })),
        )
            .into_response();
    }

    let result = tool.invoke(input).await;
    if result.is_error {
        let message = result
            .content
            .first()
            .map(|ContentBlock::Text { text }| text.clone())
            .unwrap_or_else(|| "tool invocation failed".to_string());
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": message })),
        )
            .into_response();
    }

    let structured = result.structured_content.unwrap_or(Value::Null);
    let payload = match &tool.def.pick_result {
        Some(pick) => pick(structured),
        None => structured,
    };
    Json(payload).into_response()
}

/// Path and query values arrive as strings; cast them to the scalar type
/// the input schema declares for that property so validation sees the
/// intended value.
fn coerce(schema: &Value, key: &str, raw: &str) -> Value {
    let declared = schema
        .get("properties")
        .and_then(|properties| properties.get(key))
        .and_then(|property| property.get("type"))
        .and_then(Value::as_str);
    match declared {
        Some("integer") => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Some("number") => raw
            .parse::<f64>()
            .map(|n| json!(n))
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Some("boolean") => match raw {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}
