//! Component F: the control-plane protocol (CPP) server (spec §4.F).
//!
//! Grounded on `server.py`'s `AcpProxyServer`: the same method table and
//! response shapes, translated from its hand-rolled `_get_handler` map to
//! `acpbridge-transport`'s `Dispatcher` trait. Every inbound request is
//! routed here; outbound `session.event` notifications are pushed back
//! over the same connection via `send_session_event`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use acpbridge_core::{Error, EventEnvelope, RpcError};
use acpbridge_proxy::{BackendConfig, ProxySessionManager};
use acpbridge_transport::{Connection, Dispatcher};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWrite;
use uuid::Uuid;

/// Protocol version this server claims to support (spec §4.F, matching the
/// original's "SDK version 0.1.x expects protocol version 2").
pub const PROTOCOL_VERSION: i64 = 2;
pub const PROXY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bridges the CPP wire protocol to a [`ProxySessionManager`] (component E).
///
/// Must be driven from inside a `tokio::task::LocalSet`: its session
/// handlers call through to component E's `?Send` ACP client-stub futures.
pub struct CppServer<W> {
    backend: String,
    sessions: Arc<ProxySessionManager>,
    conn: Arc<Connection<W>>,
}

impl<W> CppServer<W>
where
    W: AsyncWrite + Unpin + 'static,
{
    pub fn new(backend_command: String, backend_args: Vec<String>, default_cwd: PathBuf, conn: Arc<Connection<W>>) -> Self {
        let sessions = Arc::new(ProxySessionManager::new(BackendConfig {
            command: backend_command.clone(),
            args: backend_args,
            default_cwd,
        }));
        Self {
            backend: backend_command,
            sessions,
            conn,
        }
    }

    /// Sends a `session.event` notification carrying one envelope (spec
    /// §4.F, grounded on `_send_session_event`).
    async fn send_session_event(&self, session_id: &str, event: EventEnvelope) {
        let params = serde_json::json!({"sessionId": session_id, "event": event});
        if let Err(err) = self.conn.send_notification("session.event", params).await {
            tracing::error!(error = %err, session_id, "failed to send session.event notification");
        }
    }

    /// Builds the event sink a new or resumed session forwards its
    /// translated events through: a CPP `session.event` notification per
    /// envelope (spec §4.E "forwarded to the sink").
    fn event_sink_for(&self, session_id: String) -> acpbridge_proxy::EventSink {
        let conn = Arc::clone(&self.conn);
        Arc::new(move |event: EventEnvelope| {
            let conn = Arc::clone(&conn);
            let session_id = session_id.clone();
            Box::pin(async move {
                let params = serde_json::json!({"sessionId": session_id, "event": event});
                if let Err(err) = conn.send_notification("session.event", params).await {
                    tracing::error!(error = %err, session_id, "failed to forward session event");
                }
            })
        })
    }

    async fn handle_ping(&self, params: &Value) -> Value {
        let message = params.get("message").and_then(Value::as_str).filter(|s| !s.is_empty()).unwrap_or("pong");
        serde_json::json!({
            "message": message,
            "timestamp": chrono::Utc::now().timestamp_millis(),
            "protocolVersion": PROTOCOL_VERSION,
        })
    }

    fn handle_status_get(&self) -> Value {
        serde_json::json!({"version": PROXY_VERSION, "protocolVersion": PROTOCOL_VERSION})
    }

    fn handle_auth_get_status(&self) -> Value {
        serde_json::json!({
            "isAuthenticated": true,
            "authType": "env",
            "host": "https://github.com",
            "login": "proxy-user",
            "statusMessage": format!("Connected via ACP Proxy to {}", self.backend),
        })
    }

    fn handle_models_list(&self) -> Value {
        serde_json::json!({"models": models_for_backend_table(&self.backend)})
    }

    async fn handle_session_create(&self, params: Value) -> Result<Value, Error> {
        let session_id = params.get("sessionId").and_then(Value::as_str).map(str::to_string);
        let model = params.get("model").and_then(Value::as_str).map(str::to_string);
        let cwd = params
            .get("workingDirectory")
            .and_then(Value::as_str)
            .map(PathBuf::from);
        let mcp_servers: HashMap<String, Value> = params
            .get("mcpServers")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        // The event sink needs to know the session id up front, but
        // `create_session` is the one that generates it when absent — so
        // generate it here instead and always pass it through, keeping the
        // sink's id and the session's id in lockstep.
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let session = self
            .sessions
            .create_session(Some(session_id.clone()), model.clone(), cwd.clone(), mcp_servers, self.event_sink_for(session_id))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        let cwd_str = session.cwd.to_string_lossy().to_string();
        self.send_session_event(
            &session.session_id,
            EventEnvelope::new("session.start", serde_json::json!({"cwd": cwd_str, "model": model.unwrap_or_else(|| "default".into())})),
        )
        .await;

        Ok(serde_json::json!({"sessionId": session.session_id, "workspacePath": cwd_str}))
    }

    async fn handle_session_resume(&self, params: Value) -> Result<Value, Error> {
        let session_id = params
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidParams("sessionId is required".into()))?;

        if let Some(session) = self.sessions.get_session(session_id).await {
            session.set_event_sink(self.event_sink_for(session_id.to_string())).await;
            let cwd_str = session.cwd.to_string_lossy().to_string();
            self.send_session_event(session_id, EventEnvelope::new("session.resume", serde_json::json!({"cwd": cwd_str}))).await;
            Ok(serde_json::json!({"sessionId": session.session_id, "workspacePath": cwd_str}))
        } else {
            self.handle_session_create(params).await
        }
    }

    async fn handle_session_send(&self, params: Value) -> Result<Value, Error> {
        let session_id = params
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidParams("sessionId is required".into()))?;
        let prompt = params
            .get("prompt")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidParams("prompt is required".into()))?;

        let message_id = Uuid::new_v4().to_string();
        self.send_session_event(
            session_id,
            EventEnvelope::new("user.message", serde_json::json!({"content": prompt, "messageId": message_id})),
        )
        .await;

        let turn_id = Uuid::new_v4().to_string();
        self.send_session_event(session_id, EventEnvelope::new("assistant.turn_start", serde_json::json!({"turnId": turn_id}))).await;

        match self.sessions.send_message(session_id, prompt.to_string()).await {
            Ok(content) => {
                self.send_session_event(
                    session_id,
                    EventEnvelope::new(
                        "assistant.message",
                        serde_json::json!({"messageId": message_id, "content": content, "toolRequests": []}),
                    ),
                )
                .await;
                Ok(serde_json::json!({"messageId": message_id}))
            }
            Err(err) => {
                self.send_session_event(session_id, EventEnvelope::new("session.error", serde_json::json!({"error": err.to_string()}))).await;
                Err(err)
            }
        }
    }

    async fn handle_session_destroy(&self, params: Value) -> Value {
        if let Some(session_id) = params.get("sessionId").and_then(Value::as_str) {
            self.send_session_event(session_id, EventEnvelope::new("session.shutdown", serde_json::json!({}))).await;
            self.sessions.destroy_session(session_id).await;
        }
        serde_json::json!({})
    }

    async fn handle_session_abort(&self, params: Value) -> Value {
        if let Some(session_id) = params.get("sessionId").and_then(Value::as_str) {
            self.sessions.abort_session(session_id).await;
            self.send_session_event(session_id, EventEnvelope::new("abort", serde_json::json!({}))).await;
        }
        serde_json::json!({})
    }

    async fn handle_session_list(&self) -> Value {
        let sessions = self.sessions.list_sessions().await;
        let mut entries = Vec::with_capacity(sessions.len());
        for s in &sessions {
            let modified_time = *s.modified_at.lock().await;
            entries.push(serde_json::json!({
                "sessionId": s.session_id,
                "startTime": s.created_at,
                "modifiedTime": modified_time,
                "summary": format!("Session with {}", self.backend),
                "isRemote": false,
            }));
        }
        serde_json::json!({"sessions": entries})
    }

    async fn handle_session_delete(&self, params: Value) -> Value {
        let success = match params.get("sessionId").and_then(Value::as_str) {
            Some(session_id) => self.sessions.delete_session(session_id).await,
            None => false,
        };
        serde_json::json!({"success": success})
    }

    async fn handle_session_get_messages(&self, params: Value) -> Value {
        let events = match params.get("sessionId").and_then(Value::as_str) {
            Some(session_id) => self.sessions.session_events(session_id).await,
            None => Vec::new(),
        };
        serde_json::json!({"events": events})
    }

    async fn handle_session_get_last_id(&self) -> Value {
        serde_json::json!({"sessionId": self.sessions.last_session_id().await})
    }
}

#[async_trait(?Send)]
impl<W> Dispatcher for CppServer<W>
where
    W: AsyncWrite + Unpin + 'static,
{
    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let result = match method {
            "ping" => Ok(self.handle_ping(&params).await),
            "status.get" => Ok(self.handle_status_get()),
            "auth.getStatus" => Ok(self.handle_auth_get_status()),
            "models.list" => Ok(self.handle_models_list()),
            "session.create" => self.handle_session_create(params).await,
            "session.resume" => self.handle_session_resume(params).await,
            "session.send" => self.handle_session_send(params).await,
            "session.destroy" => Ok(self.handle_session_destroy(params).await),
            "session.abort" => Ok(self.handle_session_abort(params).await),
            "session.list" => Ok(self.handle_session_list().await),
            "session.delete" => Ok(self.handle_session_delete(params).await),
            "session.getMessages" => Ok(self.handle_session_get_messages(params).await),
            "session.getLastId" => Ok(self.handle_session_get_last_id().await),
            "session.getForeground" => Ok(self.handle_session_get_last_id().await),
            "session.setForeground" => Ok(serde_json::json!({"success": true})),
            _ => return Err(RpcError::method_not_found(method)),
        };
        result.map_err(|e| RpcError::from(&e))
    }

    async fn handle_notification(&self, method: &str, _params: Value) {
        tracing::debug!(method, "ignoring unexpected inbound CPP notification");
    }
}

/// Static per-backend model table (spec §4.F `models.list`, §6.3).
fn models_for_backend_table(backend: &str) -> Vec<Value> {
    match backend {
        "gemini" => vec![
            serde_json::json!({"id": "gemini-2.0-flash", "name": "Gemini 2.0 Flash", "capabilities": {"supports": {"vision": true}}}),
            serde_json::json!({"id": "gemini-1.5-pro", "name": "Gemini 1.5 Pro", "capabilities": {"supports": {"vision": true}}}),
        ],
        "claude-code" | "claude-code-acp" => vec![
            serde_json::json!({"id": "claude-sonnet-4-20250514", "name": "Claude Sonnet 4", "capabilities": {"supports": {"vision": true, "reasoningEffort": true}}}),
            serde_json::json!({"id": "claude-opus-4-20250514", "name": "Claude Opus 4", "capabilities": {"supports": {"vision": true, "reasoningEffort": true}}}),
        ],
        _ => vec![serde_json::json!({"id": "default", "name": "Default Model", "capabilities": {}})],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn models_table_is_backend_specific() {
        assert_eq!(models_for_backend_table("gemini").len(), 2);
        assert_eq!(models_for_backend_table("claude-code-acp").len(), 2);
        assert_eq!(models_for_backend_table("copilot").len(), 1);
    }
}
