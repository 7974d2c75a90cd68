// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tandem — a planner/executor AI agent runtime with MCP support.
#[derive(Parser, Debug)]
#[command(name = "tandem", version, about)]
pub struct Cli {
    /// Path to an explicit config file (merged over the discovered ones).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Path to the MCP servers config (overrides `mcp.config_path`).
    #[arg(long, global = true)]
    pub mcp_config: Option<PathBuf>,

    /// Verbose logging to stderr (equivalent to RUST_LOG=debug).
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan and execute a goal with the architect/coder workflow.
    Run {
        /// The goal to achieve.
        goal: String,
    },

    /// Run a single agent turn with the built-in and MCP tools.
    Agent {
        /// The user input for the agent.
        input: String,
        /// Override the configured iteration budget.
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// Interactive chat with the agent (type "exit" or "quit" to leave).
    Chat,

    /// MCP server and client utilities.
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },

    /// List the supported model providers.
    ListProviders,

    /// Print the merged configuration and exit.
    ShowConfig,
}

#[derive(Subcommand, Debug)]
pub enum McpCommands {
    /// Serve the built-in tools to an MCP host on stdin/stdout.
    Serve {
        /// Directory the file tools are confined to (default: cwd).
        #[arg(long)]
        root: Option<PathBuf>,
        /// Comma-separated subset of tools to serve (default: all).
        #[arg(long)]
        tools: Option<String>,
    },

    /// Connect to the configured MCP servers and list their tools.
    Tools,
}
