// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info, warn};

use tandem_config::McpServerConfig;
use tandem_mcp::protocol::{
    Implementation, InitializeParams, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    McpToolInfo, ToolCallResult, ToolsListResult, PROTOCOL_VERSION,
};

#[derive(Debug, thiserror::Error)]
pub enum McpClientError {
    #[error("mcp server '{0}' is not connected")]
    NotConnected(String),
    /// A previous request future was dropped mid-exchange, so the next
    /// stdout line belongs to that request and the transport is desynced.
    #[error("mcp server '{0}' transport is degraded; reconnect required")]
    Degraded(String),
    #[error("failed to spawn mcp server '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("mcp transport error: {0}")]
    Transport(String),
    #[error("mcp server error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("invalid mcp response: {0}")]
    Protocol(String),
}

/// The client-side MCP surface.
///
/// A trait rather than a concrete type so the manager can be fed
/// pre-constructed clients (tests, alternative transports).
#[async_trait]
pub trait McpClient: Send + Sync {
    fn name(&self) -> &str;

    /// Spawn and handshake.  A no-op success when already connected.
    async fn connect(&self) -> Result<(), McpClientError>;

    fn is_connected(&self) -> bool;

    async fn list_tools(&self) -> Result<Vec<McpToolInfo>, McpClientError>;

    /// Invoke a remote tool.  `Ok` carries the concatenated text output;
    /// `Err` carries the failure text.  Transport and JSON-RPC failures
    /// land in `Err` too — one bad call must not poison the client.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, String>;

    /// Terminate the subprocess.  Idempotent.
    async fn close(&self) -> Result<(), McpClientError>;
}

struct Transport {
    child: Child,
    stdin: ChildStdin,
    lines: FramedRead<ChildStdout, LinesCodec>,
}

/// An MCP client speaking newline-delimited JSON-RPC 2.0 to a subprocess.
///
/// Requests are serialized: the transport lock is held for the whole
/// write-then-read exchange, and the next stdout line is the response to
/// the request just written.  Ids come from an atomic counter and are
/// never reused.
pub struct StdioClient {
    name: String,
    config: McpServerConfig,
    client_info: Implementation,
    next_id: AtomicU64,
    connected: AtomicBool,
    in_flight: AtomicBool,
    transport: Mutex<Option<Transport>>,
}

impl StdioClient {
    pub fn new(name: impl Into<String>, config: McpServerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            transport: Mutex::new(None),
        }
    }

    async fn request(
        &self,
        transport: &mut Transport,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, McpClientError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(McpClientError::Degraded(self.name.clone()));
        }
        let result = self.exchange(transport, method, params).await;
        // Only reached when the exchange future ran to completion; a drop
        // mid-exchange leaves the flag set and the client degraded.
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn exchange(
        &self,
        transport: &mut Transport,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, McpClientError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);
        let payload = serde_json::to_string(&req)
            .map_err(|e| McpClientError::Protocol(format!("encoding request: {e}")))?;

        debug!(server = %self.name, method, id, "mcp request");

        transport
            .stdin
            .write_all(format!("{payload}\n").as_bytes())
            .await
            .map_err(|e| McpClientError::Transport(format!("write failed: {e}")))?;
        transport
            .stdin
            .flush()
            .await
            .map_err(|e| McpClientError::Transport(format!("flush failed: {e}")))?;

        let line = match transport.lines.next().await {
            None => {
                return Err(McpClientError::Transport(
                    "server closed stdout unexpectedly".into(),
                ))
            }
            Some(Err(e)) => return Err(McpClientError::Transport(format!("read failed: {e}"))),
            Some(Ok(l)) => l,
        };

        let response: JsonRpcResponse = serde_json::from_str(line.trim())
            .map_err(|e| McpClientError::Protocol(format!("invalid JSON-RPC response: {e}")))?;

        if let Some(err) = response.error {
            return Err(McpClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        response
            .result
            .ok_or_else(|| McpClientError::Protocol("response carried no result".into()))
    }

    async fn send_notification(
        &self,
        transport: &mut Transport,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), McpClientError> {
        let note = JsonRpcRequest::notification(method, params);
        let payload = serde_json::to_string(&note)
            .map_err(|e| McpClientError::Protocol(format!("encoding notification: {e}")))?;
        transport
            .stdin
            .write_all(format!("{payload}\n").as_bytes())
            .await
            .map_err(|e| McpClientError::Transport(format!("write failed: {e}")))?;
        transport
            .stdin
            .flush()
            .await
            .map_err(|e| McpClientError::Transport(format!("flush failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl McpClient for StdioClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), McpClientError> {
        let mut guard = self.transport.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        info!(server = %self.name, command = %self.config.command, "spawning mcp server");

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The parent environment is inherited; configured entries are laid
        // on top, last write wins.
        for (k, v) in &self.config.env {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn().map_err(|source| McpClientError::Spawn {
            command: self.config.command.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpClientError::Transport("failed to capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpClientError::Transport("failed to capture stdout".into()))?;

        // Drain stderr in the background.  Subprocesses that log verbosely
        // will block on a full stderr pipe unless someone reads it; the
        // drain task ends naturally on EOF.
        if let Some(stderr) = child.stderr.take() {
            let server = self.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = %server, "stderr: {line}");
                }
            });
        }

        let mut transport = Transport {
            child,
            stdin,
            lines: FramedRead::new(stdout, LinesCodec::new()),
        };

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: json!({}),
            client_info: self.client_info.clone(),
        };
        let init = self
            .request(
                &mut transport,
                "initialize",
                Some(serde_json::to_value(params).unwrap_or(Value::Null)),
            )
            .await;

        match init {
            Ok(result) => {
                if let Ok(parsed) = serde_json::from_value::<InitializeResult>(result) {
                    info!(server = %self.name,
                          peer = %parsed.server_info.name,
                          version = %parsed.server_info.version,
                          "mcp server initialized");
                }
            }
            Err(e) => {
                let _ = transport.child.kill().await;
                return Err(e);
            }
        }

        // Best-effort: a failed notification send is logged, not fatal.
        if let Err(e) = self
            .send_notification(&mut transport, "notifications/initialized", None)
            .await
        {
            debug!(server = %self.name, error = %e, "initialized notification failed");
        }

        *guard = Some(transport);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn list_tools(&self) -> Result<Vec<McpToolInfo>, McpClientError> {
        let mut guard = self.transport.lock().await;
        let transport = guard
            .as_mut()
            .ok_or_else(|| McpClientError::NotConnected(self.name.clone()))?;

        let result = self.request(transport, "tools/list", None).await?;
        let parsed: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| McpClientError::Protocol(format!("invalid tools/list result: {e}")))?;

        debug!(server = %self.name, tools = parsed.tools.len(), "discovered mcp tools");
        Ok(parsed.tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, String> {
        let mut guard = self.transport.lock().await;
        let transport = match guard.as_mut() {
            Some(t) => t,
            None => return Err(format!("mcp server '{}' is not connected", self.name)),
        };

        let params = json!({ "name": name, "arguments": arguments });
        let result = match self.request(transport, "tools/call", Some(params)).await {
            Ok(r) => r,
            // Transport and RPC failures fail this one call, not the agent.
            Err(e) => return Err(e.to_string()),
        };

        let parsed: ToolCallResult = match serde_json::from_value(result) {
            Ok(p) => p,
            Err(e) => return Err(format!("invalid tools/call result: {e}")),
        };

        let text = parsed.joined_text();
        if parsed.is_error {
            Err(text)
        } else {
            Ok(text)
        }
    }

    async fn close(&self) -> Result<(), McpClientError> {
        let mut guard = self.transport.lock().await;
        self.connected.store(false, Ordering::SeqCst);
        if let Some(transport) = guard.take() {
            let Transport {
                mut child,
                stdin,
                lines,
            } = transport;
            // Dropping stdin sends EOF so well-behaved servers exit on
            // their own; the kill reaps the rest.
            drop(stdin);
            drop(lines);
            if let Err(e) = child.kill().await {
                warn!(server = %self.name, error = %e, "failed to kill mcp server");
                return Err(McpClientError::Transport(format!("kill failed: {e}")));
            }
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config(command: &str) -> McpServerConfig {
        McpServerConfig {
            command: command.into(),
            args: vec![],
            env: Default::default(),
            disabled: false,
            auto_approve: vec![],
        }
    }

    #[test]
    fn new_client_is_disconnected() {
        let c = StdioClient::new("s", config("true"));
        assert!(!c.is_connected());
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_command_name() {
        let c = StdioClient::new("s", config("/nonexistent/mcp-server-binary"));
        let err = c.connect().await.unwrap_err();
        assert!(matches!(err, McpClientError::Spawn { .. }));
        assert!(err.to_string().contains("mcp-server-binary"));
        assert!(!c.is_connected());
    }

    #[tokio::test]
    async fn calls_before_connect_fail_fast() {
        let c = StdioClient::new("s", config("true"));
        let err = c.list_tools().await.unwrap_err();
        assert!(matches!(err, McpClientError::NotConnected(_)));

        let err = c.call_tool("t", json!({})).await.unwrap_err();
        assert!(err.contains("not connected"));
    }

    #[tokio::test]
    async fn close_without_connect_is_a_no_op() {
        let c = StdioClient::new("s", config("true"));
        c.close().await.unwrap();
        c.close().await.unwrap();
    }

    #[test]
    fn request_ids_are_monotonic() {
        let c = StdioClient::new("s", config("true"));
        let a = c.next_id.fetch_add(1, Ordering::SeqCst);
        let b = c.next_id.fetch_add(1, Ordering::SeqCst);
        assert!(b > a);
    }
}
