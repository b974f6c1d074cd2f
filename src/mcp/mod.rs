// MCP server and CLI command handlers
//
// `serve` is the normal mode: an MCP host launches the binary and talks
// JSON-RPC over stdio. The other commands exist for operators.

pub mod error;
pub mod health;
pub mod protocol;
pub mod server;

pub use error::McpError;
pub use server::McpServer;

use crate::config::mcp_export::{current_command, render_host_config, ConfigFormat};
use crate::tools::{ClientSource, ToolRegistry};
use anyhow::{Context, Result};
use clap::Subcommand;
use health::{check_api_health, format_health_report, HealthReport, HealthStatus};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Serve Mackerel tools over stdin/stdout (default)
    Serve,
    /// List the tools this server exposes
    Tools {
        /// Print full definitions with input schemas as JSON
        #[arg(long)]
        json: bool,
    },
    /// Invoke one tool and print its result envelope
    Call {
        /// Tool name, e.g. list_hosts
        name: String,
        /// Tool arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },
    /// Check credentials and connectivity against the Mackerel API
    Check,
    /// Print the MCP host configuration for launching this server
    ExportConfig {
        /// Target host format
        #[arg(value_enum)]
        format: ConfigFormat,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// What command handlers need from startup
pub struct Runtime {
    pub client: ClientSource,
    pub base_url: String,
}

pub async fn handle_command(command: Commands, runtime: Runtime) -> Result<()> {
    match command {
        Commands::Serve => cmd_serve(runtime).await,
        Commands::Tools { json } => cmd_list_tools(runtime, json),
        Commands::Call { name, arguments } => cmd_call_tool(runtime, &name, &arguments).await,
        Commands::Check => cmd_check(runtime).await,
        Commands::ExportConfig { format, output } => cmd_export_config(format, output),
    }
}

async fn cmd_serve(runtime: Runtime) -> Result<()> {
    let registry = Arc::new(ToolRegistry::new(runtime.client));
    let server = McpServer::new(registry);
    tracing::info!(base_url = %runtime.base_url, "Starting Mackerel MCP server on stdio");

    tokio::select! {
        result = server.serve_stdio() => {
            result.context("MCP server stopped with an error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received interrupt, shutting down");
        }
    }

    tracing::info!("Mackerel MCP server stopped");
    Ok(())
}

fn cmd_list_tools(runtime: Runtime, json: bool) -> Result<()> {
    let registry = ToolRegistry::new(runtime.client);

    if json {
        let definitions = registry.definitions();
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    for definition in registry.definitions() {
        println!("  {:<24} {}", definition.name, definition.description);
    }
    Ok(())
}

async fn cmd_call_tool(runtime: Runtime, name: &str, arguments: &str) -> Result<()> {
    let args: Value =
        serde_json::from_str(arguments).context("Tool arguments must be valid JSON")?;
    let registry = ToolRegistry::new(runtime.client);

    let Some(result) = registry.call(name, args).await else {
        anyhow::bail!(
            "Unknown tool '{}'. Available tools: {}",
            name,
            registry.names().join(", ")
        );
    };

    println!("{}", result.first_text().unwrap_or_default());
    if result.is_error() {
        anyhow::bail!("Tool '{}' returned an error", name);
    }
    Ok(())
}

async fn cmd_check(runtime: Runtime) -> Result<()> {
    let (key_length, status) = match &runtime.client {
        ClientSource::Ready(client) => (
            Some(client.api_key().len()),
            check_api_health(client).await,
        ),
        ClientSource::Unavailable { reason } => (
            None,
            HealthStatus::Error {
                message: reason.clone(),
            },
        ),
    };

    let report = HealthReport {
        base_url: runtime.base_url,
        key_length,
        status,
    };
    print!("{}", format_health_report(&report));

    if !report.status.is_healthy() {
        anyhow::bail!("Mackerel API check failed");
    }
    Ok(())
}

fn cmd_export_config(format: ConfigFormat, output: Option<PathBuf>) -> Result<()> {
    let config = render_host_config(format, &current_command());
    let rendered = serde_json::to_string_pretty(&config)?;

    match output {
        Some(path) => {
            std::fs::write(&path, format!("{rendered}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported MCP config to: {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
