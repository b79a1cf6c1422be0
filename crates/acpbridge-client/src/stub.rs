//! `AcpClientStub` — spawns an external ACP agent subprocess and drives it
//! through the real `agent_client_protocol::AgentSideConnection`... actually
//! the *client* side: `ClientSideConnection` (spec §4.B "AcpClientStub").
//!
//! Grounded on the zed-industries example client's spawn/`LocalSet` pattern
//! and `crucible-acp::acp_client::spawn_agent`'s stdio-capture shape. Callers
//! must run `AcpClientStub::connect` inside a `tokio::task::LocalSet` — the
//! connection's internal futures are `?Send`.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use acpbridge_core::{Error, Result};
use acpbridge_fileterm::{FileService, FileTerminalHooks, NoHooks, TerminalRegistry};
use agent_client_protocol::{
    CancelNotification, ClientCapabilities, ClientSideConnection, InitializeRequest,
    McpServer, NewSessionRequest, PromptRequest, SessionId, SetSessionModeRequest,
    SetSessionModelRequest, StopReason, V1,
};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

use crate::callbacks::StubCallbacks;
use crate::reverse_client::ReverseClient;

const DISCONNECT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const DISCONNECT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(3);
const DISCONNECT_KILL_TIMEOUT: Duration = Duration::from_secs(2);

/// Launch parameters for the backend subprocess, already resolved to a
/// concrete argv by the proxy layer (component E) — this crate never
/// chooses backend-specific flags itself (spec §4.B is transport-only).
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

/// Spawns, connects to, and drives one external ACP agent subprocess.
pub struct AcpClientStub {
    connection: Option<ClientSideConnection>,
    child: Option<Child>,
    reverse: ReverseClient,
    session_id: Option<SessionId>,
    pending_model: Mutex<Option<String>>,
}

impl AcpClientStub {
    /// Builds a stub with its own file/terminal service and no registered
    /// callbacks. Use [`AcpClientStub::with_hooks`] to intercept file and
    /// terminal activity, or set callbacks afterwards via
    /// [`AcpClientStub::callbacks`].
    pub fn new() -> Self {
        Self::with_hooks(Arc::new(NoHooks))
    }

    pub fn with_hooks(hooks: Arc<dyn FileTerminalHooks>) -> Self {
        let files = Arc::new(FileService::new(hooks.clone()));
        let terminals = Arc::new(TerminalRegistry::new(hooks));
        let callbacks = Arc::new(Mutex::new(StubCallbacks::default()));
        Self {
            connection: None,
            child: None,
            reverse: ReverseClient::new(files, terminals, callbacks),
            session_id: None,
            pending_model: Mutex::new(None),
        }
    }

    /// Returns a handle to register callbacks on (spec §4.B's `on_text` /
    /// `on_thinking` / `on_tool_start` / `on_tool_end` / `on_permission` /
    /// `on_complete` / `on_error`).
    pub fn reverse_client(&self) -> &ReverseClient {
        &self.reverse
    }

    /// Spawns `spec.program`, wires up the ACP connection, and performs the
    /// `initialize` handshake. Must run inside a `tokio::task::LocalSet`.
    pub async fn connect(&mut self, spec: SpawnSpec) -> Result<()> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().cloned())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = command
            .spawn()
            .map_err(|e| Error::Internal(format!("failed to spawn agent: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Internal("failed to capture agent stdin".into()))?
            .compat_write();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("failed to capture agent stdout".into()))?
            .compat();

        let (connection, io_task) =
            ClientSideConnection::new(self.reverse.clone(), stdin, stdout, |fut| {
                tokio::task::spawn_local(fut);
            });
        tokio::task::spawn_local(io_task);

        connection
            .initialize(InitializeRequest {
                protocol_version: V1,
                client_capabilities: ClientCapabilities::default(),
                meta: None,
            })
            .await
            .map_err(|e| Error::Internal(format!("initialize failed: {e}")))?;

        self.connection = Some(connection);
        self.child = Some(child);
        Ok(())
    }

    /// Opens a new session for `cwd`, optionally forwarding converted MCP
    /// server configs (spec §4.B / §4.E "MCP server format conversion").
    pub async fn new_session(&mut self, cwd: PathBuf, mcp_servers: Vec<McpServer>) -> Result<SessionId> {
        let connection = self.connection()?;
        self.reverse.reset_for_new_prompt().await;
        let response = connection
            .new_session(NewSessionRequest {
                mcp_servers,
                cwd,
                meta: None,
            })
            .await
            .map_err(|e| Error::Internal(format!("new_session failed: {e}")))?;
        self.session_id = Some(response.session_id.clone());

        if let Some(model_id) = self.pending_model.lock().await.take() {
            self.set_session_model(model_id).await?;
        }

        Ok(response.session_id)
    }

    /// Sends a prompt built from flattened text content. Clears the dedup
    /// buffers first — spec §3 AcpSession: dedup state is per-prompt.
    pub async fn prompt(&mut self, text: String) -> Result<StopReason> {
        let session_id = self.session_id()?;
        self.reverse.reset_for_new_prompt().await;
        let connection = self.connection()?;
        let response = connection
            .prompt(PromptRequest {
                session_id,
                prompt: vec![text.into()],
                meta: None,
            })
            .await
            .map_err(|e| Error::Internal(format!("prompt failed: {e}")))?;
        self.reverse.fire_on_complete().await;
        Ok(response.stop_reason)
    }

    /// Sends a `session/cancel` notification for the active session.
    pub async fn cancel(&mut self) -> Result<()> {
        let session_id = self.session_id()?;
        let connection = self.connection()?;
        connection
            .cancel(CancelNotification { session_id, meta: None })
            .await
            .map_err(|e| Error::Internal(format!("cancel failed: {e}")))
    }

    pub async fn set_session_mode(&mut self, mode_id: String) -> Result<()> {
        let session_id = self.session_id()?;
        let connection = self.connection()?;
        connection
            .set_session_mode(SetSessionModeRequest {
                session_id,
                mode_id: mode_id.into(),
                meta: None,
            })
            .await
            .map_err(|e| Error::Internal(format!("set_session_mode failed: {e}")))?;
        Ok(())
    }

    /// Sets the model for the active session, or — if no session is open
    /// yet — stashes it to apply right after the next `new_session` (spec
    /// §4.B: model selection may arrive before the first prompt).
    pub async fn set_session_model(&mut self, model_id: String) -> Result<()> {
        if self.session_id.is_none() {
            *self.pending_model.lock().await = Some(model_id);
            return Ok(());
        }
        let session_id = self.session_id()?;
        let connection = self.connection()?;
        connection
            .set_session_model(SetSessionModelRequest {
                session_id,
                model_id: model_id.into(),
                meta: None,
            })
            .await
            .map_err(|e| Error::Internal(format!("set_session_model failed: {e}")))?;
        Ok(())
    }

    /// Tears the connection down with the spec's escalating timeout ladder:
    /// close stdio and wait up to 5s, then SIGTERM and wait up to 3s, then
    /// SIGKILL and wait up to 2s. Terminals spawned through this stub's
    /// file/terminal service are killed first (spec §4.B).
    pub async fn disconnect(&mut self) {
        self.reverse.kill_terminals().await;
        self.connection = None;

        let Some(mut child) = self.child.take() else {
            return;
        };

        drop(child.stdin.take());
        if tokio::time::timeout(DISCONNECT_CLOSE_TIMEOUT, child.wait()).await.is_ok() {
            return;
        }

        #[cfg(unix)]
        {
            if let Some(id) = child.id() {
                unsafe {
                    libc::kill(id as libc::pid_t, libc::SIGTERM);
                }
            }
        }
        if tokio::time::timeout(DISCONNECT_TERMINATE_TIMEOUT, child.wait()).await.is_ok() {
            return;
        }

        let _ = child.start_kill();
        let _ = tokio::time::timeout(DISCONNECT_KILL_TIMEOUT, child.wait()).await;
    }

    fn connection(&self) -> Result<&ClientSideConnection> {
        self.connection
            .as_ref()
            .ok_or_else(|| Error::Internal("not connected".into()))
    }

    fn session_id(&self) -> Result<SessionId> {
        self.session_id
            .clone()
            .ok_or_else(|| Error::Internal("no active session".into()))
    }
}

impl Default for AcpClientStub {
    fn default() -> Self {
        Self::new()
    }
}
