// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The tandem MCP server: serves a [`ToolRegistry`] to an external MCP
//! host over newline-delimited JSON-RPC 2.0.
//!
//! The server is stateless: every `tools/call` request executes the tool
//! in isolation and carries no session state between calls, matching the
//! expectations of MCP hosts that manage their own conversation context.

use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use tandem_tools::{ToolCall, ToolRegistry};

use crate::protocol::{
    Implementation, InitializeResult, JsonRpcRequest, JsonRpcResponse, ToolCallResult,
    ToolsCallParams, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};

pub struct McpServer {
    tools: Arc<ToolRegistry>,
    server_info: Implementation,
}

impl McpServer {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        }
    }

    pub fn with_server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.server_info = Implementation {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    /// Serve requests from `reader`, writing responses to `writer`, until
    /// EOF (returns Ok) or cancellation (returns the cancellation reason
    /// as an error).
    ///
    /// The transports are generic so tests can drive the server over
    /// in-memory pipes; production use goes through [`serve_stdio`].
    ///
    /// [`serve_stdio`]: crate::serve_stdio
    pub async fn serve<R, W>(
        &self,
        reader: R,
        writer: W,
        cancel: CancellationToken,
    ) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = FramedRead::new(reader, LinesCodec::new());
        // One message per line: writes are serialized so a response can
        // never interleave with another writer of the same stream.
        let writer = Mutex::new(writer);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("mcp server cancelled");
                    anyhow::bail!("mcp server cancelled");
                }
                line = lines.next() => {
                    let line = match line {
                        None => return Ok(()),
                        Some(Err(e)) => return Err(e).context("reading mcp input"),
                        Some(Ok(l)) => l,
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let Some(resp) = self.handle_line(&line).await {
                        let payload =
                            serde_json::to_string(&resp).context("encoding mcp response")?;
                        let mut w = writer.lock().await;
                        w.write_all(payload.as_bytes())
                            .await
                            .context("writing mcp response")?;
                        w.write_all(b"\n").await.context("writing mcp response")?;
                        w.flush().await.context("flushing mcp response")?;
                    }
                }
            }
        }
    }

    /// Dispatch one raw input line.  Returns `None` when no response is
    /// due (notifications).
    async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let req: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "unparseable mcp request line");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {e}"),
                ));
            }
        };

        debug!(method = %req.method, notification = req.is_notification(), "mcp request");

        match req.method.as_str() {
            "initialize" => {
                let id = req.id?;
                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.into(),
                    capabilities: json!({ "tools": {} }),
                    server_info: self.server_info.clone(),
                };
                Some(JsonRpcResponse::success(
                    id,
                    serde_json::to_value(result).unwrap_or(Value::Null),
                ))
            }
            "notifications/initialized" => None,
            "tools/list" => {
                let id = req.id?;
                let tools: Vec<Value> = self
                    .tools
                    .schemas()
                    .into_iter()
                    .map(|s| {
                        json!({
                            "name": s.name,
                            "description": s.description,
                            "inputSchema": s.parameters,
                        })
                    })
                    .collect();
                Some(JsonRpcResponse::success(id, json!({ "tools": tools })))
            }
            "tools/call" => {
                let id = req.id?;
                Some(self.handle_tools_call(id, req.params).await)
            }
            other => {
                // Unknown notifications are dropped silently; unknown
                // requests get the standard error code.
                let id = req.id?;
                Some(JsonRpcResponse::failure(
                    id,
                    METHOD_NOT_FOUND,
                    format!("method not found: {other}"),
                ))
            }
        }
    }

    async fn handle_tools_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolsCallParams = match params.map(serde_json::from_value::<ToolsCallParams>).transpose() {
            Ok(Some(p)) if !p.name.is_empty() => p,
            _ => {
                return JsonRpcResponse::failure(
                    id,
                    INVALID_PARAMS,
                    "invalid params: expected {name, arguments}",
                )
            }
        };

        let tool = match self.tools.get(&params.name) {
            Some(t) => t,
            None => {
                // Not a JSON-RPC error: the host expects a successful
                // envelope whose payload flags the failure.
                let payload = ToolCallResult::text(format!("Unknown tool: {}", params.name), true);
                return JsonRpcResponse::success(
                    id,
                    serde_json::to_value(payload).unwrap_or(Value::Null),
                );
            }
        };

        let arguments = match params.arguments {
            Value::Object(_) => params.arguments,
            _ => Value::Object(Default::default()),
        };
        let call = ToolCall::new(Uuid::new_v4().to_string(), params.name, arguments);
        let output = tool.execute(&call).await;

        let payload = ToolCallResult::text(output.content, output.is_error);
        JsonRpcResponse::success(id, serde_json::to_value(payload).unwrap_or(Value::Null))
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
//
// Wire-level request/response coverage lives in tests/integration.rs; these
// only cover dispatch corners that do not need a transport.
