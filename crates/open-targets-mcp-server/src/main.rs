use std::path::PathBuf;

use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use open_targets_mcp_server::runtime;
use open_targets_mcp_server::server::OpenTargetsServer;
use rmcp::ServiceExt;
use rmcp::transport::stdio;

/// Clap styling
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Debug, clap::Parser)]
#[command(
    styles = STYLES,
    version,
    about = "Open Targets MCP Server - query the Open Targets Platform from an AI agent",
)]
struct Args {
    /// Path to the YAML configuration file; configuration is read from
    /// OT_MCP_* environment variables when omitted
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match args.config {
        Some(path) => runtime::read_config(path)?,
        None => runtime::read_config_from_env()?,
    };
    runtime::logging::init(&config.logging);

    tracing::info!(endpoint = %config.endpoint, "Starting MCP server in stdio mode");
    let service = OpenTargetsServer::new(&config)
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })?;
    service.waiting().await?;

    Ok(())
}
