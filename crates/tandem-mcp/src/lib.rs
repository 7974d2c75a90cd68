// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `tandem-mcp` — MCP (Model Context Protocol) server for tandem.
//!
//! Exposes tandem's built-in tools to any MCP-compatible host over
//! **stdio** transport using line-delimited JSON-RPC 2.0.
//!
//! # Quick start
//!
//! ```text
//! tandem mcp serve
//! ```
//!
//! # MCP client configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "tandem": {
//!       "command": "tandem",
//!       "args": ["mcp", "serve"]
//!     }
//!   }
//! }
//! ```
//!
//! ## Custom tool subset
//!
//! ```text
//! tandem mcp serve --tools read_file,write_file
//! ```
//!
//! # Architecture
//!
//! ```text
//! MCP host (Claude Desktop, Cursor, …)
//!       │  stdin/stdout (line-delimited JSON-RPC)
//!       ▼
//! McpServer
//!       │
//!       ▼
//! ToolRegistry  ──►  Tool::execute()
//! ```
//!
//! The wire types in [`protocol`] are shared with the `tandem-mcp-client`
//! crate so both sides of the protocol agree by construction.

pub mod protocol;
pub mod registry;
pub mod server;

pub use registry::{build_mcp_registry, DEFAULT_TOOL_NAMES};
pub use server::McpServer;

use std::sync::Arc;

use anyhow::Result;
use tandem_tools::ToolRegistry;
use tokio_util::sync::CancellationToken;

/// Start an MCP stdio server, serving the tools in `registry` on
/// `stdin` / `stdout`.
///
/// Blocks until the host disconnects (stdin EOF) or `cancel` fires.  It
/// is designed to be called as the sole operation of the
/// `tandem mcp serve` subcommand.
pub async fn serve_stdio(registry: Arc<ToolRegistry>, cancel: CancellationToken) -> Result<()> {
    let server = McpServer::new(registry);
    server
        .serve(tokio::io::stdin(), tokio::io::stdout(), cancel)
        .await
}
