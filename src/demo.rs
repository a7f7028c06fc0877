//! The built-in demo capability set served by the `manifoldmcp` binary.
//!
//! Small but real: it exercises every capability category, both REST
//! exposures, a result projection, and the error paths. Also reused by the
//! integration tests as a known capability surface.

use std::time::Instant;

use anyhow::bail;
use serde_json::json;

use crate::capability::{
    PromptDef, PromptMessage, PromptResult, ResourceContents, ResourceDef, ResourceDescriptor,
    RestMethod, ServerSpec, ToolDef,
};

#[derive(Debug, Clone)]
pub struct DemoContext {
    pub started: Instant,
}

impl Default for DemoContext {
    fn default() -> Self {
        DemoContext {
            started: Instant::now(),
        }
    }
}

const GUIDE_TOPICS: [(&str, &str); 2] = [
    ("sessions", "Sessions are created by POSTing an initialize request."),
    ("flags", "Capability visibility is controlled with query-string flags."),
];

pub fn demo_spec() -> ServerSpec<DemoContext> {
    ServerSpec::new("manifoldmcp", env!("CARGO_PKG_VERSION"))
        .instructions("Demo server. Try the echo tool, or read demo://server/info.")
        .tool(|_ctx: &DemoContext, _flags| {
            ToolDef::new(
                "echo",
                json!({
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" }
                    },
                    "required": ["message"]
                }),
                |args| async move {
                    let message = args
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_default();
                    Ok(json!({ "message": message, "length": message.len() }))
                },
            )
            .title("Echo")
            .description("Echoes a message back, with its length")
            .output_schema(json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string" },
                    "length": { "type": "integer" }
                }
            }))
            .rest_route(RestMethod::Post, "/echo")
            .pick_result(|result| result.get("message").cloned().unwrap_or_default())
        })
        .tool(|ctx, _flags| {
            let started = ctx.started;
            ToolDef::new(
                "uptime",
                json!({ "type": "object", "properties": {} }),
                move |_args| async move {
                    Ok(json!({ "uptime_seconds": started.elapsed().as_secs() }))
                },
            )
            .title("Uptime")
            .description("Seconds since the server started")
            .rest_route(RestMethod::Get, "/uptime")
        })
        .prompt(|_ctx, _flags| {
            PromptDef::new("greeting", |args| async move {
                let Some(name) = args.get("name").and_then(|n| n.as_str()) else {
                    bail!("missing required argument: name");
                };
                Ok(PromptResult {
                    description: Some("A friendly greeting".to_string()),
                    messages: vec![PromptMessage::user(format!(
                        "Please write a short, warm greeting for {name}."
                    ))],
                })
            })
            .description("Drafts a greeting for someone")
            .arguments(json!([
                { "name": "name", "description": "Who to greet", "required": true }
            ]))
        })
        .resource(|ctx, _flags| {
            let started = ctx.started;
            ResourceDef::fixed("server-info", "demo://server/info", move |request| {
                let uptime = started.elapsed().as_secs();
                async move {
                    Ok(vec![ResourceContents {
                        uri: request.uri,
                        mime_type: Some("application/json".to_string()),
                        text: json!({
                            "name": "manifoldmcp",
                            "version": env!("CARGO_PKG_VERSION"),
                            "uptime_seconds": uptime,
                        })
                        .to_string(),
                    }])
                }
            })
            .description("Server identity and uptime")
            .mime_type("application/json")
        })
        .resource(|_ctx, _flags| {
            ResourceDef::templated("guides", "demo://guides/{topic}", |request| async move {
                let topic = request
                    .variables
                    .get("topic")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string();
                let Some((_, text)) = GUIDE_TOPICS.iter().find(|(name, _)| *name == topic)
                else {
                    bail!("no guide for topic: {topic}");
                };
                Ok(vec![ResourceContents {
                    uri: request.uri,
                    mime_type: Some("text/plain".to_string()),
                    text: (*text).to_string(),
                }])
            })
            .description("Short usage guides")
            .mime_type("text/plain")
            .list(|| async move {
                Ok(GUIDE_TOPICS
                    .iter()
                    .map(|(topic, _)| ResourceDescriptor {
                        uri: format!("demo://guides/{topic}"),
                        name: (*topic).to_string(),
                        description: None,
                        mime_type: Some("text/plain".to_string()),
                    })
                    .collect())
            })
        })
}
