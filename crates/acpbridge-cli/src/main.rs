use std::sync::Arc;

use acpbridge_agent::{AssistantBackend, ProcessAssistantBackend};
use anyhow::{bail, Result};
use clap::Parser;

mod agent_mode;
mod cli;
mod config;
mod proxy_mode;

use cli::{Cli, RunMode};
use config::{resolve_log_level, AgentModeConfig, ProxyConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging goes to stderr only: stdout carries the framed wire protocol
    // (spec §10.A).
    if let Some(directive) = resolve_log_level(&cli).as_env_filter_directive() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(directive))
            .with_writer(std::io::stderr)
            .init();
    }

    if cli.port > 0 {
        tracing::error!(port = cli.port, "TCP mode (--port) is not yet supported");
        bail!("TCP mode (--port) is not yet supported");
    }

    let mode = cli.run_mode().map_err(|e| anyhow::anyhow!(e))?;

    match mode {
        RunMode::Agent => {
            let config = AgentModeConfig::resolve(&cli);
            let backend_command = cli.backend.clone().unwrap_or_else(|| "claude".to_string());
            let backend: Arc<dyn AssistantBackend> = Arc::new(ProcessAssistantBackend::new(backend_command, cli.backend_args.clone()));
            agent_mode::run(backend, config).await
        }
        RunMode::Proxy => {
            let config = ProxyConfig::resolve(&cli);
            proxy_mode::run(config).await
        }
    }
}
