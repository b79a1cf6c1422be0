//! Implements `agent_client_protocol::Client` — the reverse-call surface a
//! spawned ACP agent drives us through (spec §4.B "Reverse-calls").
//!
//! Grounded on `crucible-acp::acp_client::CrucibleClient`'s trait impl shape
//! (async_trait(?Send), per-method tracing), generalized from Crucible's
//! kiln-specific file handling to the spec's hook-based file/terminal
//! service (`acpbridge-fileterm`) and a pluggable permission callback.

use std::path::PathBuf;
use std::sync::Arc;

use acpbridge_core::TextDedup;
use acpbridge_fileterm::{FileService, TerminalRegistry};
use agent_client_protocol::{
    Client, CreateTerminalRequest, CreateTerminalResponse, Error as AcpError, ExtNotification,
    ExtRequest, ExtResponse, KillTerminalCommandRequest, KillTerminalCommandResponse,
    PermissionOptionId, ReadTextFileRequest, ReadTextFileResponse, ReleaseTerminalRequest,
    ReleaseTerminalResponse, RequestPermissionOutcome, RequestPermissionRequest,
    RequestPermissionResponse, Result as AcpResult, SelectedPermissionOutcome, SessionNotification,
    SessionUpdate, TerminalOutputRequest, TerminalOutputResponse, WaitForTerminalExitRequest,
    WaitForTerminalExitResponse, WriteTextFileRequest, WriteTextFileResponse,
};
use tokio::sync::Mutex;

use crate::callbacks::{PermissionOptionDescriptor, StubCallbacks};

/// The `Client`-trait side of an `AcpClientStub`: answers the spawned
/// agent's reverse-calls by delegating to the file/terminal service and the
/// registered callbacks.
#[derive(Clone)]
pub struct ReverseClient {
    files: Arc<FileService>,
    terminals: Arc<TerminalRegistry>,
    callbacks: Arc<Mutex<StubCallbacks>>,
    text_dedup: Arc<Mutex<TextDedup>>,
    thinking_dedup: Arc<Mutex<TextDedup>>,
}

impl ReverseClient {
    pub fn new(files: Arc<FileService>, terminals: Arc<TerminalRegistry>, callbacks: Arc<Mutex<StubCallbacks>>) -> Self {
        Self {
            files,
            terminals,
            callbacks,
            text_dedup: Arc::new(Mutex::new(TextDedup::new())),
            thinking_dedup: Arc::new(Mutex::new(TextDedup::new())),
        }
    }

    /// Clears the per-prompt dedup buffers. Called at the start of each
    /// `prompt` (spec §3 AcpSession: "`cancelled` is cleared at every new
    /// `prompt`" — the text buffers are reset on the same cadence).
    pub async fn reset_for_new_prompt(&self) {
        self.text_dedup.lock().await.reset();
        self.thinking_dedup.lock().await.reset();
    }

    /// Kills every terminal this client opened. Called by
    /// `AcpClientStub::disconnect` before tearing down the subprocess
    /// itself (spec §4.B: "Terminals in C are killed first").
    pub async fn kill_terminals(&self) {
        self.terminals.kill_all().await;
    }

    /// Replaces the registered callback set (spec §4.B "Callback
    /// registration shape"). Callers typically register once right after
    /// constructing the stub, before `connect`.
    pub async fn set_callbacks(&self, callbacks: StubCallbacks) {
        *self.callbacks.lock().await = callbacks;
    }

    /// Invokes the registered `on_complete` callback, if any. Called by
    /// `AcpClientStub::prompt` once the turn's response has returned
    /// (`acp_client.py`: `if self.events.on_complete: await self.events.on_complete()`).
    pub async fn fire_on_complete(&self) {
        let callback = self.callbacks.lock().await.on_complete.clone();
        if let Some(cb) = callback {
            cb().await;
        }
    }
}

#[async_trait::async_trait(?Send)]
impl Client for ReverseClient {
    async fn request_permission(&self, args: RequestPermissionRequest) -> AcpResult<RequestPermissionResponse> {
        let callback = self.callbacks.lock().await.on_permission.clone();
        let outcome = match callback {
            Some(cb) => {
                let title = args
                    .tool_call
                    .fields
                    .title
                    .clone()
                    .unwrap_or_else(|| args.tool_call.tool_call_id.to_string());
                let raw_input = args
                    .tool_call
                    .fields
                    .raw_input
                    .clone()
                    .unwrap_or(serde_json::Value::Null);
                let options: Vec<PermissionOptionDescriptor> = args
                    .options
                    .iter()
                    .map(|o| PermissionOptionDescriptor {
                        option_id: o.id.clone(),
                        name: o.name.clone(),
                    })
                    .collect();
                let selected: PermissionOptionId = cb(title, raw_input, options).await;
                RequestPermissionOutcome::Selected(SelectedPermissionOutcome::new(selected))
            }
            None => {
                // Default per spec §4.B: "(default `"allow"`)".
                match args.options.iter().find(|o| o.id.0.as_ref() == "allow").or(args.options.first()) {
                    Some(opt) => RequestPermissionOutcome::Selected(SelectedPermissionOutcome::new(opt.id.clone())),
                    None => RequestPermissionOutcome::Cancelled,
                }
            }
        };
        Ok(RequestPermissionResponse::new(outcome))
    }

    async fn write_text_file(&self, args: WriteTextFileRequest) -> AcpResult<WriteTextFileResponse> {
        self.files
            .write_file(&args.path, &args.content)
            .await
            .map_err(|_| AcpError::internal_error())?;
        Ok(WriteTextFileResponse::new())
    }

    async fn read_text_file(&self, args: ReadTextFileRequest) -> AcpResult<ReadTextFileResponse> {
        let result = self.files.read_file(&args.path).await;
        Ok(ReadTextFileResponse::new(result.content))
    }

    async fn create_terminal(&self, args: CreateTerminalRequest) -> AcpResult<CreateTerminalResponse> {
        let cwd = args.cwd.clone().unwrap_or_else(|| PathBuf::from("."));
        let result = self.terminals.create(&args.command, &args.args, &cwd).await;
        if let Some(err) = result.error {
            tracing::warn!(error = %err, "terminal creation failed");
            return Err(AcpError::internal_error());
        }
        Ok(CreateTerminalResponse::new(result.terminal_id.into()))
    }

    async fn terminal_output(&self, args: TerminalOutputRequest) -> AcpResult<TerminalOutputResponse> {
        let result = self.terminals.output(&args.terminal_id.0).await;
        Ok(TerminalOutputResponse::new(result.output, None))
    }

    async fn wait_for_terminal_exit(&self, args: WaitForTerminalExitRequest) -> AcpResult<WaitForTerminalExitResponse> {
        let result = self.terminals.wait_for_exit(&args.terminal_id.0).await;
        Ok(WaitForTerminalExitResponse::new(Some(result.exit_code), None))
    }

    async fn release_terminal(&self, args: ReleaseTerminalRequest) -> AcpResult<ReleaseTerminalResponse> {
        self.terminals.release(&args.terminal_id.0).await;
        Ok(ReleaseTerminalResponse::new())
    }

    async fn kill_terminal_command(&self, args: KillTerminalCommandRequest) -> AcpResult<KillTerminalCommandResponse> {
        self.terminals.kill(&args.terminal_id.0).await;
        Ok(KillTerminalCommandResponse::new())
    }

    async fn session_notification(&self, args: SessionNotification) -> AcpResult<()> {
        let callbacks = self.callbacks.lock().await.clone();
        match args.update {
            SessionUpdate::AgentMessageChunk { content } => {
                let text = content_block_to_text(&content);
                let emitted = self.text_dedup.lock().await.ingest(&text);
                if let (Some(t), Some(cb)) = (emitted, callbacks.on_text) {
                    cb(t).await;
                }
            }
            SessionUpdate::AgentThoughtChunk { content } => {
                let text = content_block_to_text(&content);
                let emitted = self.thinking_dedup.lock().await.ingest(&text);
                if let (Some(t), Some(cb)) = (emitted, callbacks.on_thinking) {
                    cb(t).await;
                }
            }
            SessionUpdate::ToolCall(tool_call) => {
                if let Some(cb) = callbacks.on_tool_start {
                    let raw_input = tool_call.raw_input.clone().unwrap_or(serde_json::Value::Null);
                    cb(tool_call.tool_call_id.to_string(), tool_call.title.clone(), raw_input).await;
                }
            }
            SessionUpdate::ToolCallUpdate(update) => {
                if let Some(cb) = callbacks.on_tool_end {
                    let status = update
                        .fields
                        .status
                        .map(|s| format!("{s:?}").to_lowercase())
                        .unwrap_or_default();
                    let raw_output = update.fields.raw_output.clone().unwrap_or(serde_json::Value::Null);
                    cb(update.id.to_string(), status, raw_output).await;
                }
            }
            SessionUpdate::UserMessageChunk { .. }
            | SessionUpdate::Plan(_)
            | SessionUpdate::CurrentModeUpdate { .. }
            | SessionUpdate::AvailableCommandsUpdate { .. } => {
                // Ignored silently per spec §4.B: "Other variants are ignored silently."
            }
        }
        Ok(())
    }

    async fn ext_method(&self, _args: ExtRequest) -> AcpResult<ExtResponse> {
        Err(AcpError::method_not_found())
    }

    async fn ext_notification(&self, _args: ExtNotification) -> AcpResult<()> {
        Ok(())
    }
}

fn content_block_to_text(content: &agent_client_protocol::ContentBlock) -> String {
    use agent_client_protocol::ContentBlock;
    match content {
        ContentBlock::Text(text) => text.text.clone(),
        ContentBlock::Image(_) => "<image>".to_string(),
        ContentBlock::Audio(_) => "<audio>".to_string(),
        ContentBlock::ResourceLink(link) => link.uri.clone(),
        ContentBlock::Resource(_) => "<resource>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acpbridge_fileterm::NoHooks;
    use agent_client_protocol::{ContentBlock, SessionId};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    fn client() -> ReverseClient {
        let hooks = Arc::new(NoHooks);
        ReverseClient::new(
            Arc::new(FileService::new(hooks.clone())),
            Arc::new(TerminalRegistry::new(hooks)),
            Arc::new(Mutex::new(StubCallbacks::default())),
        )
    }

    fn notification(update: SessionUpdate) -> SessionNotification {
        SessionNotification {
            session_id: SessionId::from("sess-1"),
            update,
            meta: None,
        }
    }

    #[tokio::test]
    async fn agent_message_chunk_dedups_and_invokes_on_text() {
        let client = client();
        let seen: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen2 = seen.clone();
        client.callbacks.lock().await.on_text = Some(Arc::new(move |text| {
            let seen = seen2.clone();
            Box::pin(async move {
                seen.lock().unwrap().push(text);
            })
        }));

        let chunk = |s: &str| ContentBlock::Text(agent_client_protocol::TextContent {
            text: s.to_string(),
            annotations: None,
            meta: None,
        });

        client.session_notification(notification(SessionUpdate::AgentMessageChunk { content: chunk("He") })).await.unwrap();
        client.session_notification(notification(SessionUpdate::AgentMessageChunk { content: chunk("Hello") })).await.unwrap();
        client.session_notification(notification(SessionUpdate::AgentMessageChunk { content: chunk("Hello") })).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["He".to_string(), "llo".to_string()]);
    }

    #[tokio::test]
    async fn unhandled_permission_falls_back_to_allow_option() {
        let client = client();
        let tool_call = agent_client_protocol::ToolCallUpdate {
            tool_call_id: "call-1".into(),
            fields: agent_client_protocol::ToolCallUpdateFields::default(),
            meta: None,
        };
        let options = vec![
            agent_client_protocol::PermissionOption::new("reject_once", "Reject", agent_client_protocol::PermissionOptionKind::RejectOnce),
            agent_client_protocol::PermissionOption::new("allow", "Allow", agent_client_protocol::PermissionOptionKind::AllowAlways),
        ];
        let request = RequestPermissionRequest {
            session_id: SessionId::from("sess-1"),
            tool_call,
            options,
            meta: None,
        };

        let response = client.request_permission(request).await.unwrap();
        match response.outcome {
            RequestPermissionOutcome::Selected(selected) => assert_eq!(selected.option_id.0.as_ref(), "allow"),
            RequestPermissionOutcome::Cancelled => panic!("expected a selection"),
        }
    }

    #[tokio::test]
    async fn registered_permission_handler_is_used() {
        let client = client();
        let invoked = Arc::new(AtomicBool::new(false));
        let invoked2 = invoked.clone();
        client.callbacks.lock().await.on_permission = Some(Arc::new(move |_title, _input, _options| {
            let invoked = invoked2.clone();
            Box::pin(async move {
                invoked.store(true, Ordering::SeqCst);
                agent_client_protocol::PermissionOptionId::from("reject_once")
            })
        }));

        let tool_call = agent_client_protocol::ToolCallUpdate {
            tool_call_id: "call-1".into(),
            fields: agent_client_protocol::ToolCallUpdateFields::default(),
            meta: None,
        };
        let options = vec![agent_client_protocol::PermissionOption::new(
            "reject_once",
            "Reject",
            agent_client_protocol::PermissionOptionKind::RejectOnce,
        )];
        let request = RequestPermissionRequest {
            session_id: SessionId::from("sess-1"),
            tool_call,
            options,
            meta: None,
        };

        client.request_permission(request).await.unwrap();
        assert!(invoked.load(Ordering::SeqCst));
    }
}
