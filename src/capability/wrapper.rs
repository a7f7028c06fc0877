//! The invocation wrapper.
//!
//! Every capability call passes through here: a span per invocation with
//! the arguments recorded, result size on success, and the failure recorded
//! on error. Tool failures are converted into an error-flagged result so
//! the calling agent receives a normal response it can reason about;
//! prompt and resource failures propagate to the endpoint, which surfaces
//! them as protocol-level errors.
//!
//! Spans are closed by drop on every exit path, including error returns.

use serde_json::Value;
use tracing::Instrument;

use super::def::{
    ContentBlock, ListHandler, PromptHandler, PromptResult, ReadHandler, ResourceContents,
    ResourceDescriptor, ResourceRequest, ToolCallResult, ToolHandler,
};

pub async fn invoke_tool(name: &str, handler: &ToolHandler, args: Value) -> ToolCallResult {
    let span = tracing::info_span!("mcp.tool", tool = %name);
    async move {
        tracing::debug!(args = %args, "invoking tool");
        match handler(args).await {
            Ok(result) => {
                let text = serde_json::to_string(&result)
                    .unwrap_or_else(|_| result.to_string());
                tracing::debug!(response_bytes = text.len(), "tool call succeeded");
                ToolCallResult {
                    content: vec![ContentBlock::text(text)],
                    structured_content: Some(result),
                    is_error: false,
                }
            }
            Err(error) => {
                tracing::error!(error = %error, "tool call failed");
                ToolCallResult {
                    content: vec![ContentBlock::text(format!("Error: {error}"))],
                    structured_content: None,
                    is_error: true,
                }
            }
        }
    }
    .instrument(span)
    .await
}

pub async fn invoke_prompt(
    name: &str,
    handler: &PromptHandler,
    args: Value,
) -> anyhow::Result<PromptResult> {
    let span = tracing::info_span!("mcp.prompt", prompt = %name);
    async move {
        tracing::debug!(args = %args, "invoking prompt");
        match handler(args).await {
            Ok(result) => Ok(result),
            Err(error) => {
                tracing::error!(error = %error, "prompt invocation failed");
                Err(error)
            }
        }
    }
    .instrument(span)
    .await
}

pub async fn invoke_resource_read(
    name: &str,
    handler: &ReadHandler,
    request: ResourceRequest,
) -> anyhow::Result<Vec<ResourceContents>> {
    let span = tracing::info_span!("mcp.resource", resource = %name, uri = %request.uri);
    async move {
        tracing::debug!(variables = %request.variables, "reading resource");
        match handler(request).await {
            Ok(contents) => Ok(contents),
            Err(error) => {
                tracing::error!(error = %error, "resource read failed");
                Err(error)
            }
        }
    }
    .instrument(span)
    .await
}

pub async fn invoke_resource_list(
    name: &str,
    handler: &ListHandler,
) -> anyhow::Result<Vec<ResourceDescriptor>> {
    let span = tracing::info_span!("mcp.resource.list", resource = %name);
    async move {
        match handler().await {
            Ok(entries) => {
                let uris: Vec<&str> = entries.iter().map(|e| e.uri.as_str()).collect();
                tracing::debug!(uris = ?uris, "resource list succeeded");
                Ok(entries)
            }
            Err(error) => {
                tracing::error!(error = %error, "resource list failed");
                Err(error)
            }
        }
    }
    .instrument(span)
    .await
}
