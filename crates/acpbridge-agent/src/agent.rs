//! `AcpBridgeAgent` — implements `agent_client_protocol::Agent` (component D).
//!
//! Grounded on `agent.py`'s `ClaudeAcpAgent` for the method bodies and
//! `krusty-agent.rs` for the real trait's exact method signatures and
//! response-builder style.

use std::path::PathBuf;
use std::sync::Arc;

use acpbridge_core::TextDedup;
use agent_client_protocol::{
    Agent, AgentCapabilities, AuthenticateRequest, AuthenticateResponse, CancelNotification,
    ContentBlock, Error as AcpError, ExtNotification, ExtRequest, ExtResponse, Implementation,
    InitializeRequest, InitializeResponse, LoadSessionRequest, LoadSessionResponse,
    McpCapabilities, NewSessionRequest, NewSessionResponse, PermissionOption,
    PermissionOptionId, PermissionOptionKind, PromptCapabilities, PromptRequest, PromptResponse,
    RequestPermissionOutcome, RequestPermissionRequest, Result as AcpResult, SessionCapabilities,
    SessionId, SessionNotification, SessionUpdate, SetSessionModeRequest, SetSessionModeResponse,
    SetSessionModelRequest, SetSessionModelResponse, StopReason, TextContent, ToolCall,
    ToolCallStatus, ToolCallUpdate, ToolCallUpdateFields,
};
use futures::StreamExt;
use tokio::sync::Mutex;

use crate::backend::{AssistantBackend, AssistantEvent};
use crate::connection_bridge::ConnectionBridge;
use crate::permissions::{auto_allow, decide, PERMISSION_OPTIONS};
use crate::prompt::{flatten_prompt, tool_title};
use crate::session::{Session, SessionManager, VALID_MODES};
use crate::usage::UsageTracker;

pub struct AcpBridgeAgent {
    sessions: Arc<SessionManager>,
    backend: Arc<dyn AssistantBackend>,
    bridge: ConnectionBridge,
    usage: Arc<UsageTracker>,
}

impl AcpBridgeAgent {
    pub fn new(backend: Arc<dyn AssistantBackend>, bridge: ConnectionBridge) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new()),
            backend,
            bridge,
            usage: Arc::new(UsageTracker::new()),
        }
    }

    fn agent_capabilities() -> AgentCapabilities {
        let mut caps = AgentCapabilities::new();
        let mut prompt_caps = PromptCapabilities::new();
        prompt_caps.image = true;
        prompt_caps.embedded_context = true;
        caps.prompt_capabilities = prompt_caps;
        caps.load_session = true;
        caps.session_capabilities = SessionCapabilities::new();
        caps.mcp_capabilities = McpCapabilities::new();
        caps
    }

    fn session_or_error(&self, session_id: &SessionId) -> AcpResult<Arc<Session>> {
        self.sessions.get(session_id.0.as_ref()).ok_or_else(AcpError::invalid_params)
    }

    /// Runs one backend turn to completion, translating each
    /// [`AssistantEvent`] into the matching `session/update` notification
    /// and handling tool permission checks inline (spec §4.D "Streaming").
    async fn run_turn(&self, session: &Arc<Session>, prompt_text: &str) -> StopReason {
        let session_id = SessionId::from(session.session_id.clone());
        let mut text_dedup = TextDedup::new();
        let mut thinking_dedup = TextDedup::new();

        let mut stream = self.backend.run_turn(prompt_text, &session.cwd).await;
        while let Some(event) = stream.next().await {
            if session.is_cancelled() {
                self.backend.interrupt().await;
                return StopReason::Cancelled;
            }

            match event {
                AssistantEvent::Text(text) => {
                    if let Some(emitted) = text_dedup.ingest(&text) {
                        self.emit_text(&session_id, emitted).await;
                    }
                }
                AssistantEvent::Thinking(text) => {
                    if let Some(emitted) = thinking_dedup.ingest(&text) {
                        self.emit_thinking(&session_id, emitted).await;
                    }
                }
                AssistantEvent::ToolUse { id, name, input } => {
                    session.tool_use_cache.lock().unwrap().insert(id.clone(), input.clone());
                    self.emit_tool_start(&session_id, &id, &name, input.clone()).await;

                    if !auto_allow(&session.permission_mode(), &name) {
                        let allowed = self.request_tool_permission(&session_id, &id, &name, &input).await;
                        if !allowed {
                            self.emit_tool_end(&session_id, &id, "failed", serde_json::json!("User denied permission")).await;
                        }
                    }
                }
                AssistantEvent::ToolResult { tool_use_id, is_error, output } => {
                    let status = if is_error { "failed" } else { "completed" };
                    self.emit_tool_end(&session_id, &tool_use_id, status, output).await;
                }
                AssistantEvent::Usage { input_tokens, output_tokens, total_cost_usd } => {
                    self.usage.record(input_tokens, output_tokens, total_cost_usd);
                }
            }
        }

        if session.is_cancelled() {
            StopReason::Cancelled
        } else {
            StopReason::EndTurn
        }
    }

    async fn request_tool_permission(&self, session_id: &SessionId, tool_call_id: &str, tool_name: &str, tool_input: &serde_json::Value) -> bool {
        let options: Vec<PermissionOption> = PERMISSION_OPTIONS
            .iter()
            .map(|opt| {
                let kind = match opt.id {
                    "allow_always" => PermissionOptionKind::AllowAlways,
                    "allow" => PermissionOptionKind::AllowOnce,
                    _ => PermissionOptionKind::RejectOnce,
                };
                PermissionOption::new(opt.id, opt.name, kind)
            })
            .collect();

        let tool_call = ToolCallUpdate {
            tool_call_id: tool_call_id.into(),
            fields: ToolCallUpdateFields {
                title: Some(tool_title(tool_name, tool_input)),
                raw_input: Some(tool_input.clone()),
                ..Default::default()
            },
            meta: None,
        };

        let request = RequestPermissionRequest {
            session_id: session_id.clone(),
            tool_call,
            options,
            meta: None,
        };

        match self.bridge.request_permission(request).await {
            Ok(response) => match response.outcome {
                RequestPermissionOutcome::Selected(selected) => decide(selected.option_id.0.as_ref()),
                RequestPermissionOutcome::Cancelled => false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "permission request failed");
                false
            }
        }
    }

    async fn emit_text(&self, session_id: &SessionId, text: String) {
        self.notify(session_id, SessionUpdate::AgentMessageChunk { content: text_block(text) }).await;
    }

    async fn emit_thinking(&self, session_id: &SessionId, text: String) {
        self.notify(session_id, SessionUpdate::AgentThoughtChunk { content: text_block(text) }).await;
    }

    async fn emit_tool_start(&self, session_id: &SessionId, id: &str, name: &str, raw_input: serde_json::Value) {
        let tool_call = ToolCall {
            tool_call_id: id.into(),
            title: tool_title(name, &raw_input),
            kind: Default::default(),
            status: ToolCallStatus::Pending,
            content: Vec::new(),
            locations: Vec::new(),
            raw_input: Some(raw_input),
            raw_output: None,
            meta: None,
        };
        self.notify(session_id, SessionUpdate::ToolCall(tool_call)).await;
    }

    async fn emit_tool_end(&self, session_id: &SessionId, id: &str, status: &str, raw_output: serde_json::Value) {
        let status = if status == "failed" { ToolCallStatus::Failed } else { ToolCallStatus::Completed };
        let update = ToolCallUpdate {
            tool_call_id: id.into(),
            fields: ToolCallUpdateFields {
                status: Some(status),
                raw_output: Some(raw_output),
                ..Default::default()
            },
            meta: None,
        };
        self.notify(session_id, SessionUpdate::ToolCallUpdate(update)).await;
    }

    async fn notify(&self, session_id: &SessionId, update: SessionUpdate) {
        self.bridge
            .session_notification(SessionNotification {
                session_id: session_id.clone(),
                update,
                meta: None,
            })
            .await;
    }
}

fn text_block(text: String) -> ContentBlock {
    ContentBlock::Text(TextContent { text, annotations: None, meta: None })
}

#[async_trait::async_trait(?Send)]
impl Agent for AcpBridgeAgent {
    async fn initialize(&self, request: InitializeRequest) -> AcpResult<InitializeResponse> {
        tracing::info!(protocol_version = ?request.protocol_version, "ACP initialize");
        let mut response = InitializeResponse::new(request.protocol_version);
        response.agent_capabilities = Self::agent_capabilities();
        response.agent_info = Some(Implementation::new("acpbridge-agent", env!("CARGO_PKG_VERSION")));
        response.auth_methods = vec![agent_client_protocol::AuthMethod::new(
            "claude-login",
            "Log in with Claude Code",
        )];
        Ok(response)
    }

    async fn authenticate(&self, _request: AuthenticateRequest) -> AcpResult<AuthenticateResponse> {
        Ok(AuthenticateResponse::new())
    }

    async fn new_session(&self, request: NewSessionRequest) -> AcpResult<NewSessionResponse> {
        let session = self.sessions.create(request.cwd);
        tracing::info!(session_id = %session.session_id, "new session created");
        Ok(NewSessionResponse::new(SessionId::from(session.session_id.clone())))
    }

    async fn load_session(&self, request: LoadSessionRequest) -> AcpResult<LoadSessionResponse> {
        let session_id = request.session_id.0.to_string();
        if !self.sessions.has(&session_id) {
            self.sessions.insert_with_id(session_id, request.cwd);
        }
        Ok(LoadSessionResponse::new())
    }

    async fn prompt(&self, request: PromptRequest) -> AcpResult<PromptResponse> {
        let session = self.session_or_error(&request.session_id)?;
        session.reset_cancelled();

        let prompt_text = flatten_prompt(&request.prompt);
        let stop_reason = self.run_turn(&session, &prompt_text).await;
        Ok(PromptResponse::new(stop_reason))
    }

    async fn cancel(&self, request: CancelNotification) -> AcpResult<()> {
        if let Some(session) = self.sessions.get(request.session_id.0.as_ref()) {
            session.set_cancelled();
        }
        Ok(())
    }

    async fn set_session_mode(&self, request: SetSessionModeRequest) -> AcpResult<SetSessionModeResponse> {
        let session = self.session_or_error(&request.session_id)?;
        let mode_id = request.mode_id.0.to_string();
        if !VALID_MODES.contains(&mode_id.as_str()) {
            return Err(AcpError::invalid_params());
        }
        *session.permission_mode.lock().unwrap() = mode_id;
        Ok(SetSessionModeResponse::new())
    }

    async fn set_session_model(&self, request: SetSessionModelRequest) -> AcpResult<SetSessionModelResponse> {
        // The embedded assistant handles model selection itself; this is
        // accepted for client compatibility (spec §4.D, grounded in
        // agent.py's `set_session_model` no-op).
        let _ = self.session_or_error(&request.session_id)?;
        tracing::info!(model_id = %request.model_id, "model change requested (compatibility no-op)");
        Ok(SetSessionModelResponse::new())
    }

    async fn ext_method(&self, _request: ExtRequest) -> AcpResult<ExtResponse> {
        Err(AcpError::method_not_found())
    }

    async fn ext_notification(&self, _notification: ExtNotification) -> AcpResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockAssistantBackend;

    fn agent_with_script(script: Vec<AssistantEvent>) -> (AcpBridgeAgent, tokio::sync::mpsc::UnboundedReceiver<crate::connection_bridge::OutboundCall>) {
        let (bridge, rx) = ConnectionBridge::new();
        let backend = Arc::new(MockAssistantBackend::new(script));
        (AcpBridgeAgent::new(backend, bridge), rx)
    }

    #[tokio::test]
    async fn new_session_then_prompt_streams_text_via_bridge() {
        let (agent, mut rx) = agent_with_script(vec![AssistantEvent::Text("hi".into())]);

        let session = agent
            .new_session(NewSessionRequest {
                cwd: PathBuf::from("/tmp"),
                mcp_servers: Vec::new(),
                meta: None,
            })
            .await
            .unwrap();

        let prompt_task = tokio::spawn(async move {
            agent
                .prompt(PromptRequest {
                    session_id: session.session_id.clone(),
                    prompt: vec![ContentBlock::Text(TextContent { text: "go".into(), annotations: None, meta: None })],
                    meta: None,
                })
                .await
        });

        let call = rx.recv().await.expect("expected a notification");
        match call {
            crate::connection_bridge::OutboundCall::Notify(notification, ack) => {
                match notification.update {
                    SessionUpdate::AgentMessageChunk { content: ContentBlock::Text(text) } => {
                        assert_eq!(text.text, "hi");
                    }
                    other => panic!("unexpected update: {other:?}"),
                }
                ack.send(()).unwrap();
            }
            _ => panic!("expected a Notify call"),
        }

        let response = prompt_task.await.unwrap().unwrap();
        assert_eq!(response.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn set_session_mode_rejects_unknown_mode() {
        let (agent, _rx) = agent_with_script(vec![]);
        let session = agent
            .new_session(NewSessionRequest { cwd: PathBuf::from("/tmp"), mcp_servers: Vec::new(), meta: None })
            .await
            .unwrap();

        let result = agent
            .set_session_mode(SetSessionModeRequest {
                session_id: session.session_id,
                mode_id: "not-a-real-mode".into(),
                meta: None,
            })
            .await;
        assert!(result.is_err());
    }
}
