//! stdio transport: one endpoint over stdin/stdout.
//!
//! Messages are newline-delimited JSON-RPC. Responses go to stdout and
//! nothing else does - logging is on stderr. EOF on stdin ends the serve
//! loop.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::capability::{CapabilitySet, ServerSpec};
use crate::config::ProcessFlags;
use crate::error::RpcError;
use crate::flags::FeatureFlags;
use crate::mcp::endpoint::McpEndpoint;

pub async fn serve_stdio<C>(
    context: &C,
    process_flags: &ProcessFlags,
    spec: &ServerSpec<C>,
) -> anyhow::Result<()>
where
    C: Send + Sync,
{
    let caps = CapabilitySet::build(context, process_flags, &FeatureFlags::default(), spec)?;
    let endpoint = McpEndpoint::new(Arc::new(caps));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    tracing::info!("stdio server ready");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(message) => endpoint.handle(message).await.response,
            Err(error) => Some(
                RpcError::InvalidRequest(format!("malformed JSON: {error}")).envelope(None),
            ),
        };

        if let Some(response) = response {
            let mut payload = serde_json::to_vec(&response)?;
            payload.push(b'\n');
            stdout.write_all(&payload).await?;
            stdout.flush().await?;
        }
    }

    tracing::info!("stdin closed, stopping");
    Ok(())
}
