//! `--server`/`--headless` entry point: component F listens on stdio and
//! drives E/B against a spawned backend agent subprocess (spec §6.5).

use std::sync::Arc;

use acpbridge_server::CppServer;
use acpbridge_transport::{run_reader, Connection};
use anyhow::Result;
use tokio::io::{stdin, stdout, BufReader};

use crate::config::ProxyConfig;

/// Runs the CPP server until stdin closes. Must run inside a
/// `tokio::task::LocalSet` — dispatch drives component E's `?Send` futures.
#[tracing::instrument(skip(config), fields(backend = %config.backend))]
pub async fn run(config: ProxyConfig) -> Result<()> {
    tracing::info!(cwd = %config.cwd.display(), "starting acp-bridge in proxy mode");

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let conn = Arc::new(Connection::new(stdout()));
            let dispatcher = Arc::new(CppServer::new(config.backend, config.backend_args, config.cwd, Arc::clone(&conn)));
            let reader = BufReader::new(stdin());

            run_reader(reader, conn, dispatcher).await?;
            tracing::info!("proxy mode connection closed");
            Ok(())
        })
        .await
}
