// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors loading the MCP server configuration.  File-not-found and parse
/// failures are distinct kinds so callers can report them differently.
#[derive(Debug, thiserror::Error)]
pub enum McpConfigError {
    #[error("mcp config file not found: {0}")]
    NotFound(String),
    #[error("failed to read mcp config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse mcp config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("mcp server '{server}' has no command")]
    MissingCommand { server: String },
}

/// The `mcpServers` document.
///
/// A `BTreeMap` keeps server iteration deterministic, which keeps logs and
/// failure reports stable across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default, rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Executable to spawn.  Required and non-empty; defaulted here so a
    /// missing field reaches validation and the error can name the server.
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment overrides applied on top of the parent environment;
    /// last write wins.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub disabled: bool,
    /// Advisory list of tools a host may call without confirmation.  Not
    /// consumed by the runtime itself.
    #[serde(default, rename = "autoApprove")]
    pub auto_approve: Vec<String>,
}

impl McpConfig {
    /// Load and validate an MCP config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, McpConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        if !path.exists() {
            return Err(McpConfigError::NotFound(display));
        }
        let text = std::fs::read_to_string(path).map_err(|source| McpConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: McpConfig =
            serde_json::from_str(&text).map_err(|source| McpConfigError::Parse {
                path: display,
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a JSON string (used by tests and embedders).
    pub fn parse(text: &str) -> Result<Self, McpConfigError> {
        let config: McpConfig =
            serde_json::from_str(text).map_err(|source| McpConfigError::Parse {
                path: "<inline>".into(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), McpConfigError> {
        for (name, server) in &self.mcp_servers {
            if server.command.trim().is_empty() {
                return Err(McpConfigError::MissingCommand {
                    server: name.clone(),
                });
            }
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_server_entry() {
        let cfg = McpConfig::parse(
            r#"{
                "mcpServers": {
                    "files": {
                        "command": "mcp-files",
                        "args": ["--root", "/tmp"],
                        "env": {"LOG": "debug"},
                        "disabled": false,
                        "autoApprove": ["list"]
                    }
                }
            }"#,
        )
        .unwrap();
        let server = &cfg.mcp_servers["files"];
        assert_eq!(server.command, "mcp-files");
        assert_eq!(server.args, vec!["--root", "/tmp"]);
        assert_eq!(server.env["LOG"], "debug");
        assert!(!server.disabled);
        assert_eq!(server.auto_approve, vec!["list"]);
    }

    #[test]
    fn optional_fields_default() {
        let cfg =
            McpConfig::parse(r#"{"mcpServers": {"s": {"command": "srv"}}}"#).unwrap();
        let server = &cfg.mcp_servers["s"];
        assert!(server.args.is_empty());
        assert!(server.env.is_empty());
        assert!(!server.disabled);
        assert!(server.auto_approve.is_empty());
    }

    #[test]
    fn empty_command_names_the_server() {
        let err =
            McpConfig::parse(r#"{"mcpServers": {"broken": {"command": "  "}}}"#).unwrap_err();
        assert!(matches!(err, McpConfigError::MissingCommand { ref server } if server == "broken"));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn missing_command_field_names_the_server() {
        let err = McpConfig::parse(r#"{"mcpServers": {"nocmd": {"args": []}}}"#).unwrap_err();
        assert!(matches!(err, McpConfigError::MissingCommand { ref server } if server == "nocmd"));
    }

    #[test]
    fn missing_file_is_distinct_from_parse_error() {
        let err = McpConfig::load("/tmp/tandem_mcp_config_does_not_exist.json").unwrap_err();
        assert!(matches!(err, McpConfigError::NotFound(_)));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{{ not json").unwrap();
        let err = McpConfig::load(f.path()).unwrap_err();
        assert!(matches!(err, McpConfigError::Parse { .. }));
    }

    #[test]
    fn empty_document_has_no_servers() {
        let cfg = McpConfig::parse("{}").unwrap();
        assert!(cfg.mcp_servers.is_empty());
    }
}
