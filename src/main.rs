// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, McpCommands};
use tandem_config::Config;
use tandem_core::{Agent, ConversationMemory};
use tandem_mcp_client::McpManager;
use tandem_orchestrator::Orchestrator;
use tandem_tools::{CalculatorTool, ListDirTool, ReadFileTool, ToolRegistry, WriteFileTool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Subcommands that need no config come first.
    if let Commands::ListProviders = cli.command {
        for driver in tandem_model::DRIVERS {
            println!("{:<12} {} — {}", driver.id, driver.name, driver.description);
        }
        return Ok(());
    }

    let config = tandem_config::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::ListProviders => unreachable!("handled above"),
        Commands::ShowConfig => {
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Commands::Run { goal } => run_workflow(&config, goal).await,
        Commands::Agent {
            input,
            max_iterations,
        } => run_agent(&cli, &config, input, *max_iterations).await,
        Commands::Chat => run_chat(&cli, &config).await,
        Commands::Mcp { command } => match command {
            McpCommands::Serve { root, tools } => {
                serve_mcp(&config, root.clone(), tools.as_deref()).await
            }
            McpCommands::Tools => list_mcp_tools(&cli, &config).await,
        },
    }
}

/// Stderr-only logging: stdout stays clean for command output and, in
/// `mcp serve`, for the protocol stream.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn workspace_root(config: &Config) -> anyhow::Result<PathBuf> {
    match &config.agent.workspace_root {
        Some(root) => Ok(root.clone()),
        None => std::env::current_dir().context("resolving current directory"),
    }
}

/// Built-in tools plus whatever the configured MCP servers offer.
/// The returned manager owns the server subprocesses; shut it down when
/// the registry is no longer in use.
async fn build_toolset(
    cli: &Cli,
    config: &Config,
    root: &PathBuf,
) -> anyhow::Result<(McpManager, ToolRegistry)> {
    let manager = McpManager::new();
    if let Some(path) = cli.mcp_config.as_ref().or(config.mcp.config_path.as_ref()) {
        let mcp_config = tandem_config::McpConfig::load(path)?;
        manager.load_config(&mcp_config).await;
    }

    let mut registry = ToolRegistry::new();
    registry.register(CalculatorTool).expect("fresh registry");
    registry
        .register(ReadFileTool::new(root.clone()))
        .expect("fresh registry");
    registry
        .register(WriteFileTool::new(root.clone()))
        .expect("fresh registry");
    registry
        .register(ListDirTool::new(root.clone()))
        .expect("fresh registry");
    for adapter in manager.get_tools().await {
        // Remote tools keep their bare names inside the agent's registry;
        // a clash with a built-in or another server loses.
        if let Err(e) = registry.register_arc(adapter) {
            warn!(error = %e, "skipping mcp tool");
        }
    }

    Ok((manager, registry))
}

async fn run_workflow(config: &Config, goal: &str) -> anyhow::Result<()> {
    let provider = tandem_model::from_config(&config.model)?;
    let root = workspace_root(config)?;
    let orchestrator =
        Orchestrator::new(provider, root).with_max_iterations(config.agent.max_iterations);

    match orchestrator.run(goal).await {
        Ok(report) => {
            println!("Goal: {}", report.plan.goal);
            println!("\nPlan:");
            for (i, step) in report.plan.steps.iter().enumerate() {
                println!("  {}. [{}] {}", i + 1, step.action, step.description);
            }
            if !report.actions.is_empty() {
                println!("\nActions:");
                for action in &report.actions {
                    println!("  - {action}");
                }
            }
            println!("\n{}", report.summary);
            Ok(())
        }
        Err(e) => {
            let state = orchestrator.state();
            if let Some(plan) = state.plan {
                eprintln!("workflow failed after planning ({} steps)", plan.steps.len());
            }
            Err(anyhow::Error::new(e).context("workflow failed"))
        }
    }
}

async fn run_agent(
    cli: &Cli,
    config: &Config,
    input: &str,
    max_iterations: Option<u32>,
) -> anyhow::Result<()> {
    let provider = tandem_model::from_config(&config.model)?;
    let root = workspace_root(config)?;
    let (manager, registry) = build_toolset(cli, config, &root).await?;

    let agent = Agent::new(provider, Arc::new(registry))
        .with_system_prompt(config.agent.system_prompt.clone().unwrap_or_default())
        .with_max_iterations(max_iterations.unwrap_or(config.agent.max_iterations));
    let memory = ConversationMemory::new();

    let result = agent.run(input, &memory).await;
    if let Err(e) = manager.shutdown().await {
        warn!(error = %e, "mcp shutdown reported an error");
    }

    let result = result?;
    println!("{}", result.response);
    Ok(())
}

/// Interactive line-based chat: one agent, one memory, until EOF or an
/// exit sentinel.  Agent errors end the turn, not the session.
async fn run_chat(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    use std::io::Write;

    let provider = tandem_model::from_config(&config.model)?;
    let root = workspace_root(config)?;
    let (manager, registry) = build_toolset(cli, config, &root).await?;

    let agent = Agent::new(provider, Arc::new(registry))
        .with_system_prompt(config.agent.system_prompt.clone().unwrap_or_default())
        .with_max_iterations(config.agent.max_iterations);
    let memory = ConversationMemory::new();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let line = match lines.next_line().await? {
            Some(l) => l,
            None => break,
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }
        match agent.run(input, &memory).await {
            Ok(result) => println!("{}", result.response),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    if let Err(e) = manager.shutdown().await {
        warn!(error = %e, "mcp shutdown reported an error");
    }
    Ok(())
}

async fn serve_mcp(
    config: &Config,
    root: Option<PathBuf>,
    tools: Option<&str>,
) -> anyhow::Result<()> {
    let root = match root {
        Some(r) => r,
        None => workspace_root(config)?,
    };

    let registry = tandem_mcp::build_mcp_registry(root, tools);

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    tandem_mcp::serve_stdio(Arc::new(registry), cancel).await
}

async fn list_mcp_tools(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let path = cli
        .mcp_config
        .as_ref()
        .or(config.mcp.config_path.as_ref())
        .context("no MCP config: pass --mcp-config or set mcp.config_path")?;
    let mcp_config = tandem_config::McpConfig::load(path)?;

    let manager = McpManager::new();
    manager.load_config(&mcp_config).await;

    for name in manager.server_names().await {
        println!("{name}");
    }
    let mut adapters = manager.get_tools().await;
    adapters.sort_by(|a, b| a.info().name.cmp(&b.info().name));
    for adapter in adapters {
        use tandem_tools::Tool;
        println!("  {} — {}", adapter.name(), adapter.description());
    }

    if let Err(e) = manager.shutdown().await {
        warn!(error = %e, "mcp shutdown reported an error");
    }
    Ok(())
}
