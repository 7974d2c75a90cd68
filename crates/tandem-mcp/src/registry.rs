// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Default tool registry for the tandem MCP server.
//!
//! The plan-capture sentinel is intentionally not served: it is a
//! side-channel of one orchestrator run and has no meaning for an
//! external MCP host.  The tools registered here are stateless from the
//! host's perspective.

use std::path::PathBuf;

use tandem_tools::{CalculatorTool, ListDirTool, ReadFileTool, ToolRegistry, WriteFileTool};

/// Tool names included in the default served set.
///
/// These names correspond exactly to the values returned by each tool's
/// `Tool::name()` implementation, sorted for deterministic output.
pub const DEFAULT_TOOL_NAMES: &[&str] = &["calculator", "list_dir", "read_file", "write_file"];

/// Build a [`ToolRegistry`] populated with the default served tool set,
/// every file tool confined to `root`.
///
/// `allowed_names` is an optional comma-separated list of tool names to
/// include.  Pass `"all"` (or `None`) to include all default tools.  Any
/// name not in [`DEFAULT_TOOL_NAMES`] is silently ignored — this guards
/// against hosts requesting internal tools that were never served.
pub fn build_mcp_registry(root: PathBuf, allowed_names: Option<&str>) -> ToolRegistry {
    let filter: Option<std::collections::HashSet<&str>> = match allowed_names {
        None | Some("all") => None,
        Some(list) => Some(list.split(',').map(|s| s.trim()).collect()),
    };

    let allow = |name: &str| -> bool {
        match &filter {
            None => true,
            Some(set) => set.contains(name),
        }
    };

    let mut reg = ToolRegistry::new();

    if allow("calculator") {
        reg.register(CalculatorTool).expect("fresh registry");
    }
    if allow("list_dir") {
        reg.register(ListDirTool::new(root.clone())).expect("fresh registry");
    }
    if allow("read_file") {
        reg.register(ReadFileTool::new(root.clone())).expect("fresh registry");
    }
    if allow("write_file") {
        reg.register(WriteFileTool::new(root)).expect("fresh registry");
    }

    reg
}

// ─── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        std::env::temp_dir()
    }

    #[test]
    fn default_registry_contains_all_default_tools() {
        let reg = build_mcp_registry(root(), None);
        let names = reg.names();
        for expected in DEFAULT_TOOL_NAMES {
            assert!(
                names.iter().any(|n| n == expected),
                "expected tool {expected:?} in default registry, got: {names:?}"
            );
        }
    }

    #[test]
    fn all_keyword_includes_all_default_tools() {
        let reg = build_mcp_registry(root(), Some("all"));
        assert_eq!(reg.names().len(), DEFAULT_TOOL_NAMES.len());
    }

    #[test]
    fn allowed_names_filter_restricts_tools() {
        let reg = build_mcp_registry(root(), Some("read_file,write_file"));
        assert_eq!(reg.names(), vec!["read_file", "write_file"]);
    }

    #[test]
    fn unknown_tool_name_in_filter_is_ignored() {
        let reg = build_mcp_registry(root(), Some("read_file,nonexistent_tool"));
        assert_eq!(reg.names(), vec!["read_file"]);
    }

    #[test]
    fn whitespace_around_tool_names_is_trimmed() {
        let reg = build_mcp_registry(root(), Some(" calculator , list_dir "));
        assert_eq!(reg.names(), vec!["calculator", "list_dir"]);
    }

    #[test]
    fn default_tool_names_constant_is_sorted() {
        let mut sorted = DEFAULT_TOOL_NAMES.to_vec();
        sorted.sort_unstable();
        assert_eq!(DEFAULT_TOOL_NAMES, sorted.as_slice());
    }
}
