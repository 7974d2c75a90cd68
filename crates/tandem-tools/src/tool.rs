// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

pub use tandem_model::ToolCall;

/// The result of executing a tool.
///
/// A failed execution is an `is_error` output, not an `Err`: tool-level
/// failures are fed back to the model so it can recover, and must never
/// abort the agent loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub call_id: String,
    /// Plain-text content: the tool's output on success, the error message
    /// otherwise.
    pub content: String,
    /// If true, the tool execution failed non-fatally (content holds the
    /// error message).
    pub is_error: bool,
}

impl ToolOutput {
    /// Successful plain-text result.
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Error result containing a plain-text error message.
    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: msg.into(),
            is_error: true,
        }
    }
}

/// Trait that every built-in, remote, and user-defined tool implements.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable identifier the model calls this tool by.
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters (top-level `type: "object"`).
    fn parameters_schema(&self) -> Value;
    /// Execute the tool.  Errors should be wrapped in [`ToolOutput::err`].
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
