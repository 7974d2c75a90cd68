// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::builtin::sandbox::resolve_in_root;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Lists directory entries confined to a base directory.  Directories get
/// a trailing slash so the model can tell them apart from files.
pub struct ListDirTool {
    root: PathBuf,
}

impl ListDirTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "Lists the entries of a directory, one per line; directories carry \
         a trailing slash. The path is resolved relative to the agent's \
         working directory; paths outside it are rejected."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list, relative to the working directory. Default: the working directory itself."
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = call
            .arguments
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or(".")
            .to_string();

        debug!(path = %path, "list_dir tool");

        let resolved = match resolve_in_root(&self.root, &path) {
            Ok(p) => p,
            Err(msg) => return ToolOutput::err(&call.id, msg),
        };

        match tokio::fs::read_dir(&resolved).await {
            Ok(mut rd) => {
                let mut entries = Vec::new();
                while let Ok(Some(entry)) = rd.next_entry().await {
                    let name = entry.file_name().to_string_lossy().to_string();
                    let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                    entries.push(if is_dir { format!("{name}/") } else { name });
                }
                entries.sort();
                ToolOutput::ok(&call.id, entries.join("\n"))
            }
            Err(e) => ToolOutput::err(&call.id, format!("list error: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
