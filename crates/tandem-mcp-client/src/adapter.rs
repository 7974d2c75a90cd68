// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use tandem_mcp::protocol::McpToolInfo;
use tandem_tools::{Tool, ToolCall, ToolOutput};

use crate::client::McpClient;

/// A remote MCP tool wrapped as a local [`Tool`] capability.
///
/// Pure forwarding: arguments and results pass through without further
/// interpretation.
pub struct McpToolAdapter {
    client: Arc<dyn McpClient>,
    info: McpToolInfo,
}

impl McpToolAdapter {
    pub fn new(client: Arc<dyn McpClient>, info: McpToolInfo) -> Self {
        Self { client, info }
    }

    pub fn info(&self) -> &McpToolInfo {
        &self.info
    }
}

#[async_trait]
impl Tool for McpToolAdapter {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn description(&self) -> &str {
        &self.info.description
    }

    fn parameters_schema(&self) -> Value {
        if self.info.input_schema.is_object() {
            self.info.input_schema.clone()
        } else {
            json!({ "type": "object", "properties": {} })
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match self
            .client
            .call_tool(&self.info.name, call.arguments.clone())
            .await
        {
            Ok(output) => ToolOutput::ok(&call.id, output),
            Err(error) => ToolOutput::err(&call.id, error),
        }
    }
}
