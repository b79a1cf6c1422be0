//! `--stdio` entry point: this process becomes the ACP agent (component D)
//! directly over its own stdio, with no CPP layer (spec §6.5).

use std::sync::Arc;

use acpbridge_agent::connection_bridge::run_outbound_loop;
use acpbridge_agent::{AcpBridgeAgent, AssistantBackend, ConnectionBridge};
use agent_client_protocol::AgentSideConnection;
use anyhow::Result;
use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

use crate::config::AgentModeConfig;

/// Drives the agent over stdin/stdout until the peer closes the connection.
/// Must run inside a `tokio::task::LocalSet` — the ACP crate's connection
/// futures are `?Send`.
#[tracing::instrument(skip(backend))]
pub async fn run(backend: Arc<dyn AssistantBackend>, config: AgentModeConfig) -> Result<()> {
    tracing::info!(cwd = %config.cwd.display(), "starting acp-bridge in agent mode");

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let (bridge, rx) = ConnectionBridge::new();
            let agent = AcpBridgeAgent::new(backend, bridge);

            let stdin = tokio::io::stdin().compat();
            let stdout = tokio::io::stdout().compat_write();
            let (connection, io_task) = AgentSideConnection::new(agent, stdout, stdin, |fut| {
                tokio::task::spawn_local(fut);
            });

            tokio::task::spawn_local(async move {
                run_outbound_loop(&connection, rx).await;
            });

            io_task.await;
            tracing::info!("agent mode connection closed");
            Ok(())
        })
        .await
}
