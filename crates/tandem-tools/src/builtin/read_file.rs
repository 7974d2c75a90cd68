// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::builtin::sandbox::resolve_in_root;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Hard byte ceiling on returned content so one read cannot flood the
/// model context.
const READ_LIMIT: usize = 200_000;

/// Reads files confined to a base directory.
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a text file. The path is resolved relative to the agent's \
         working directory; paths outside it are rejected."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to read, relative to the working directory"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.arguments.get("path").and_then(Value::as_str) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'path'"),
        };

        debug!(path = %path, root = %self.root.display(), "read_file tool");

        let resolved = match resolve_in_root(&self.root, &path) {
            Ok(p) => p,
            Err(msg) => return ToolOutput::err(&call.id, msg),
        };

        match tokio::fs::read(&resolved).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let content = if text.len() > READ_LIMIT {
                    // The cut must land on a char boundary: READ_LIMIT is a
                    // byte offset and may fall inside a multi-byte character.
                    let mut cut = READ_LIMIT;
                    while !text.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    format!("{}...[truncated]", &text[..cut])
                } else {
                    text.to_string()
                };
                ToolOutput::ok(&call.id, content)
            }
            Err(e) => ToolOutput::err(&call.id, format!("read error: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall::new("r", "read_file", args)
    }

    #[tokio::test]
    async fn reads_file_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("note.txt"), "hello").unwrap();
        let t = ReadFileTool::new(dir.path());

        let out = t.execute(&call(json!({"path": "note.txt"}))).await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(out.content, "hello");
    }

    #[tokio::test]
    async fn oversized_file_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "x".repeat(READ_LIMIT + 500)).unwrap();
        let t = ReadFileTool::new(dir.path());

        let out = t.execute(&call(json!({"path": "big.txt"}))).await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.ends_with("...[truncated]"));
        assert!(out.content.len() < READ_LIMIT + 100);
    }

    #[tokio::test]
    async fn truncation_respects_multibyte_char_boundaries() {
        // '€' is 3 bytes; READ_LIMIT is not a multiple of 3, so the naive
        // byte cut would land inside a character.
        let dir = tempfile::tempdir().unwrap();
        let body = "€".repeat(READ_LIMIT / 3 + 500);
        std::fs::write(dir.path().join("utf8.txt"), &body).unwrap();
        let t = ReadFileTool::new(dir.path());

        let out = t.execute(&call(json!({"path": "utf8.txt"}))).await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.ends_with("...[truncated]"));
        let kept = out.content.trim_end_matches("...[truncated]");
        assert!(kept.chars().all(|c| c == '€'));
    }

    #[tokio::test]
    async fn missing_path_argument_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = ReadFileTool::new(dir.path());
        let out = t.execute(&call(json!({}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("'path'"));
    }

    #[tokio::test]
    async fn missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = ReadFileTool::new(dir.path());
        let out = t.execute(&call(json!({"path": "absent.txt"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("read error"));
    }

    #[tokio::test]
    async fn escape_attempt_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let t = ReadFileTool::new(dir.path());
        let out = t.execute(&call(json!({"path": "../../etc/passwd"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("escapes"));
    }
}
