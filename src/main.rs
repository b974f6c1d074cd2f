use anyhow::{Context, Result};
use clap::Parser;
use mackerel_mcp::config::{Config, LogFormat};
use mackerel_mcp::mackerel::MackerelClient;
use mackerel_mcp::mcp::{handle_command, Commands, Runtime};
use mackerel_mcp::tools::ClientSource;
use std::path::PathBuf;
use std::process::ExitCode;

/// MCP server for the Mackerel monitoring API
#[derive(Parser, Debug)]
#[command(name = "mackerel-mcp", version, about)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mackerel API key (overrides MACKEREL_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Mackerel API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match startup(&cli) {
        Ok(runtime) => runtime,
        Err(e) => {
            // Logging may not be up yet
            eprintln!("mackerel-mcp: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match handle_command(cli.command.unwrap_or(Commands::Serve), runtime).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn startup(cli: &Cli) -> Result<Runtime> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(base_url) = &cli.base_url {
        config.mackerel.base_url = base_url.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    mackerel_mcp::logging::init(&config.logging)?;

    let client = config
        .resolve_api_key(cli.api_key.as_deref())
        .and_then(|key| {
            tracing::info!(
                api_key_length = key.len(),
                base_url = %config.mackerel.base_url,
                timeout_secs = config.mackerel.timeout_secs,
                "Resolved Mackerel API key"
            );
            MackerelClient::with_config(key, &config.mackerel)
        });

    if let Err(e) = &client {
        tracing::warn!(error = %e, "Mackerel client unavailable; tool calls will report this error");
    }

    Ok(Runtime {
        client: ClientSource::from_result(client),
        base_url: config.mackerel.base_url,
    })
}
