// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::builtin::sandbox::resolve_in_root;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Writes files confined to a base directory, creating missing parent
/// directories.
pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Writes text content to a file, creating parent directories as \
         needed. The path is resolved relative to the agent's working \
         directory; paths outside it are rejected."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to write, relative to the working directory"
                },
                "content": {
                    "type": "string",
                    "description": "Full text content to write"
                }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.arguments.get("path").and_then(Value::as_str) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'path'"),
        };
        let content = match call.arguments.get("content").and_then(Value::as_str) {
            Some(c) => c.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'content'"),
        };

        debug!(path = %path, bytes = content.len(), "write_file tool");

        let resolved = match resolve_in_root(&self.root, &path) {
            Ok(p) => p,
            Err(msg) => return ToolOutput::err(&call.id, msg),
        };

        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return ToolOutput::err(&call.id, format!("mkdir error: {e}"));
                }
            }
        }

        match tokio::fs::write(&resolved, &content).await {
            Ok(_) => ToolOutput::ok(&call.id, format!("wrote {} bytes to {path}", content.len())),
            Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall::new("w", "write_file", args)
    }

    #[tokio::test]
    async fn writes_file_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let t = WriteFileTool::new(dir.path());

        let out = t
            .execute(&call(json!({"path": "out.txt", "content": "data"})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.txt")).unwrap(),
            "data"
        );
    }

    #[tokio::test]
    async fn creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let t = WriteFileTool::new(dir.path());

        let out = t
            .execute(&call(json!({"path": "a/b/c.txt", "content": "nested"})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a/b/c.txt")).unwrap(),
            "nested"
        );
    }

    #[tokio::test]
    async fn missing_content_argument_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = WriteFileTool::new(dir.path());
        let out = t.execute(&call(json!({"path": "x.txt"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("'content'"));
        assert!(!dir.path().join("x.txt").exists());
    }

    #[tokio::test]
    async fn escape_attempt_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let t = WriteFileTool::new(dir.path());
        let out = t
            .execute(&call(json!({"path": "../evil.txt", "content": "x"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("escapes"));
        assert!(!dir.path().parent().unwrap().join("evil.txt").exists());
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let t = WriteFileTool::new(dir.path());
        t.execute(&call(json!({"path": "f.txt", "content": "one"})))
            .await;
        t.execute(&call(json!({"path": "f.txt", "content": "two"})))
            .await;
        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            "two"
        );
    }
}
