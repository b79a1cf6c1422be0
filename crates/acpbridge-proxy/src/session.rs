//! Component E: the proxy session manager (spec §4.E, §3 "ProxySession").
//!
//! Grounded in full on `session_manager.py`'s `ProxySessionManager`: the
//! same `create_session`/`send_message`/`destroy_session`/`delete_session`/
//! `abort_session`/`list_sessions` surface, translated from Python's
//! decorator-registered callbacks to Rust's `StubCallbacks` builder.
//!
//! Cyclic-reference note (spec §9): the client stub's callbacks close over
//! the `ProxySession` they report into, and the session owns the stub. The
//! cycle is broken with a `Weak<ProxySession>` in the closures rather than
//! an `Arc`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use acpbridge_client::{AcpClientStub, SpawnSpec, StubCallbacks};
use acpbridge_core::{Error, EventEnvelope, Result};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::backend_flags::{resolve_backend_args, ModelDelivery};
use crate::mcp::convert_mcp_servers;

/// Forwards one event to whatever is relaying it to the control-plane
/// client (component F). A no-op sink drops events on the floor — useful
/// for tests that only care about the session's own `events` log.
pub type EventSink = Arc<dyn Fn(EventEnvelope) -> BoxFuture<'static, ()> + Send + Sync>;

/// Static launch configuration shared by every session this manager opens
/// (spec §4.E "Construct a B-client" — one backend per proxy instance,
/// matching `ProxySessionManager.__init__`'s `backend_command`/`backend_args`).
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub command: String,
    pub args: Vec<String>,
    pub default_cwd: PathBuf,
}

/// One proxy session: one owned `AcpClientStub` and its append-only event
/// log (spec §3 "ProxySession").
pub struct ProxySession {
    pub session_id: String,
    pub model: Option<String>,
    pub cwd: PathBuf,
    pub created_at: DateTime<Utc>,
    pub modified_at: Mutex<DateTime<Utc>>,
    pub events: Mutex<Vec<EventEnvelope>>,
    active: AtomicBool,
    client: Mutex<AcpClientStub>,
    event_sink: Mutex<Option<EventSink>>,
}

impl ProxySession {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Appends `event` to the log and forwards it to the current sink, in
    /// that order — the log is the source of truth `getMessages` replays
    /// from (spec §3 invariant "replays from getMessages must equal what a
    /// live subscriber saw").
    async fn record(&self, event: EventEnvelope) {
        self.events.lock().await.push(event.clone());
        let sink = self.event_sink.lock().await.clone();
        if let Some(sink) = sink {
            sink(event).await;
        }
    }

    /// Rebinds the event sink, e.g. on `session.resume` (spec §4.F
    /// "rebind event_sink").
    pub async fn set_event_sink(&self, sink: EventSink) {
        *self.event_sink.lock().await = Some(sink);
    }
}

#[derive(Default)]
pub struct ProxySessionManager {
    backend: Option<BackendConfig>,
    sessions: Mutex<HashMap<String, Arc<ProxySession>>>,
    last_session_id: Mutex<Option<String>>,
}

impl ProxySessionManager {
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend: Some(backend),
            sessions: Mutex::new(HashMap::new()),
            last_session_id: Mutex::new(None),
        }
    }

    fn backend(&self) -> &BackendConfig {
        self.backend.as_ref().expect("ProxySessionManager constructed without a backend")
    }

    /// Opens a new backend subprocess and session (spec §4.E steps 1-5).
    /// Must run inside a `tokio::task::LocalSet` (the ACP client stub's
    /// connection futures are `?Send`).
    pub async fn create_session(
        &self,
        session_id: Option<String>,
        model: Option<String>,
        cwd: Option<PathBuf>,
        mcp_servers: HashMap<String, Value>,
        event_sink: EventSink,
    ) -> Result<Arc<ProxySession>> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let cwd = cwd.unwrap_or_else(|| self.backend().default_cwd.clone());

        let mcp_servers_acp = convert_mcp_servers(&mcp_servers);
        let (args, delivery) = resolve_backend_args(&self.backend().command, &self.backend().args, model.as_deref());

        let mut client = AcpClientStub::new();

        // The session itself doesn't exist yet (its client field needs a
        // connected stub to construct), so the callbacks close over a
        // `Weak` cell filled in immediately after the session is built.
        let session_cell: Arc<Mutex<Weak<ProxySession>>> = Arc::new(Mutex::new(Weak::new()));
        client.reverse_client().set_callbacks(translation_handlers(session_cell.clone())).await;

        let spawn_spec = SpawnSpec {
            program: self.backend().command.clone().into(),
            args,
            cwd: cwd.clone(),
            env: Vec::new(),
        };
        client.connect(spawn_spec).await.map_err(|e| Error::Internal(format!("failed to connect to backend: {e}")))?;

        let now = Utc::now();
        let session = Arc::new(ProxySession {
            session_id: session_id.clone(),
            model: model.clone(),
            cwd: cwd.clone(),
            created_at: now,
            modified_at: Mutex::new(now),
            events: Mutex::new(Vec::new()),
            active: AtomicBool::new(true),
            client: Mutex::new(client),
            event_sink: Mutex::new(Some(event_sink)),
        });
        *session_cell.lock().await = Arc::downgrade(&session);

        {
            let mut client = session.client.lock().await;
            client
                .new_session(cwd, mcp_servers_acp)
                .await
                .map_err(|e| Error::Internal(format!("failed to open backend session: {e}")))?;

            if let (Some(model), ModelDelivery::SetSessionModel) = (&model, delivery) {
                if let Err(e) = client.set_session_model(model.clone()).await {
                    tracing::warn!(error = %e, "failed to set model (backend may not support it)");
                }
            }
        }

        self.sessions.lock().await.insert(session_id.clone(), session.clone());
        *self.last_session_id.lock().await = Some(session_id);

        Ok(session)
    }

    /// Sends a prompt; on completion appends the terminal `assistant.message`
    /// event carrying the accumulated full text (spec §4.E "send_message").
    pub async fn send_message(&self, session_id: &str, prompt: String) -> Result<String> {
        let session = self.require_session(session_id).await?;
        *session.modified_at.lock().await = Utc::now();

        let turn_start = session.events.lock().await.len();

        let mut client = session.client.lock().await;
        client.prompt(prompt).await.map_err(|e| Error::Internal(e.to_string()))?;
        drop(client);

        Ok(accumulated_text(&session, turn_start).await)
    }

    /// Marks the session inactive and disconnects its backend client
    /// (spec §4.E "destroy_session"). Idempotent: unknown ids are a no-op.
    pub async fn destroy_session(&self, session_id: &str) {
        let Some(session) = self.sessions.lock().await.get(session_id).cloned() else {
            return;
        };
        session.active.store(false, Ordering::SeqCst);
        *session.event_sink.lock().await = None;
        session.client.lock().await.disconnect().await;
        tracing::info!(session_id, "session destroyed");
    }

    /// Destroys and removes the session entirely; returns whether it
    /// existed.
    pub async fn delete_session(&self, session_id: &str) -> bool {
        self.destroy_session(session_id).await;
        self.sessions.lock().await.remove(session_id).is_some()
    }

    /// Cancels the in-flight prompt, if any (spec §4.E "abort_session").
    pub async fn abort_session(&self, session_id: &str) {
        let Some(session) = self.sessions.lock().await.get(session_id).cloned() else {
            return;
        };
        if let Err(e) = session.client.lock().await.cancel().await {
            tracing::warn!(error = %e, "error aborting session");
        }
        session.record(EventEnvelope::new("abort", serde_json::json!({}))).await;
    }

    pub async fn get_session(&self, session_id: &str) -> Option<Arc<ProxySession>> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    pub async fn list_sessions(&self) -> Vec<Arc<ProxySession>> {
        self.sessions.lock().await.values().cloned().collect()
    }

    pub async fn last_session_id(&self) -> Option<String> {
        self.last_session_id.lock().await.clone()
    }

    pub async fn session_events(&self, session_id: &str) -> Vec<EventEnvelope> {
        match self.sessions.lock().await.get(session_id) {
            Some(session) => session.events.lock().await.clone(),
            None => Vec::new(),
        }
    }

    pub async fn close_all(&self) {
        let ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        for id in ids {
            self.destroy_session(&id).await;
        }
        self.sessions.lock().await.clear();
    }

    async fn require_session(&self, session_id: &str) -> Result<Arc<ProxySession>> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }
}

/// Concatenates `assistant.message_delta` events appended at or after
/// `turn_start` — the current turn's text only, not every prior turn's
/// (`acp_client.py:233` resets its buffer per prompt).
async fn accumulated_text(session: &Arc<ProxySession>, turn_start: usize) -> String {
    session
        .events
        .lock()
        .await
        .iter()
        .skip(turn_start)
        .filter(|e| e.kind == "assistant.message_delta")
        .filter_map(|e| e.data.get("deltaContent").and_then(Value::as_str))
        .collect()
}

/// B-callback → CPP event envelope translation (spec §4.E table). Each
/// handler upgrades the `Weak<ProxySession>` cell, appends the matching
/// envelope to the session's log, and forwards it to the sink; a session
/// that has already been torn down is a silent no-op.
fn translation_handlers(session: Arc<Mutex<Weak<ProxySession>>>) -> StubCallbacks {
    let mut callbacks = StubCallbacks::default();

    let s = session.clone();
    callbacks.on_text = Some(Arc::new(move |text| {
        let s = s.clone();
        Box::pin(async move {
            if let Some(session) = upgrade(&s).await {
                session.record(event_for_text(text)).await;
            }
        })
    }));

    let s = session.clone();
    callbacks.on_thinking = Some(Arc::new(move |text| {
        let s = s.clone();
        Box::pin(async move {
            if let Some(session) = upgrade(&s).await {
                session.record(event_for_thinking(text)).await;
            }
        })
    }));

    let s = session.clone();
    callbacks.on_tool_start = Some(Arc::new(move |id, name, input| {
        let s = s.clone();
        Box::pin(async move {
            if let Some(session) = upgrade(&s).await {
                session.record(event_for_tool_start(id, name, input)).await;
            }
        })
    }));

    let s = session.clone();
    callbacks.on_tool_end = Some(Arc::new(move |id, status, output| {
        let s = s.clone();
        Box::pin(async move {
            if let Some(session) = upgrade(&s).await {
                session.record(event_for_tool_end(id, status, output)).await;
            }
        })
    }));

    let s = session.clone();
    callbacks.on_complete = Some(Arc::new(move || {
        let s = s.clone();
        Box::pin(async move {
            if let Some(session) = upgrade(&s).await {
                session.record(event_turn_end()).await;
                session.record(event_session_idle()).await;
            }
        })
    }));

    let s = session;
    callbacks.on_error = Some(Arc::new(move |message| {
        let s = s.clone();
        Box::pin(async move {
            if let Some(session) = upgrade(&s).await {
                session.record(EventEnvelope::new("session.error", serde_json::json!({"error": message}))).await;
            }
        })
    }));

    callbacks
}

async fn upgrade(cell: &Arc<Mutex<Weak<ProxySession>>>) -> Option<Arc<ProxySession>> {
    cell.lock().await.upgrade()
}

fn event_for_text(text: String) -> EventEnvelope {
    EventEnvelope::new("assistant.message_delta", serde_json::json!({"deltaContent": text}))
}

fn event_for_thinking(text: String) -> EventEnvelope {
    EventEnvelope::new("assistant.reasoning_delta", serde_json::json!({"deltaContent": text}))
}

fn event_for_tool_start(id: String, name: String, input: Value) -> EventEnvelope {
    EventEnvelope::new("tool.execution_start", serde_json::json!({"toolCallId": id, "toolName": name, "arguments": input}))
}

fn event_for_tool_end(id: String, status: String, output: Value) -> EventEnvelope {
    let success = status.is_empty() || status == "success" || status == "completed";
    EventEnvelope::new("tool.execution_complete", serde_json::json!({"toolCallId": id, "success": success, "result": output}))
}

fn event_turn_end() -> EventEnvelope {
    EventEnvelope::new("assistant.turn_end", serde_json::json!({"turnId": Uuid::new_v4().to_string()}))
}

fn event_session_idle() -> EventEnvelope {
    EventEnvelope::new("session.idle", serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_end_success_follows_empty_or_success_status() {
        let event = event_for_tool_end("call-1".into(), "".into(), serde_json::json!("ok"));
        assert_eq!(event.data["success"], true);

        let event = event_for_tool_end("call-1".into(), "failed".into(), serde_json::json!("boom"));
        assert_eq!(event.data["success"], false);
    }

    #[test]
    fn text_event_carries_delta_content() {
        let event = event_for_text("hi".into());
        assert_eq!(event.kind, "assistant.message_delta");
        assert_eq!(event.data["deltaContent"], "hi");
    }

    #[tokio::test]
    async fn accumulated_text_only_covers_the_current_turn() {
        let session = Arc::new(ProxySession {
            session_id: "sess-1".into(),
            model: None,
            cwd: PathBuf::from("."),
            created_at: Utc::now(),
            modified_at: Mutex::new(Utc::now()),
            events: Mutex::new(vec![event_for_text("first".into())]),
            active: AtomicBool::new(true),
            client: Mutex::new(AcpClientStub::new()),
            event_sink: Mutex::new(None),
        });

        let turn_start = session.events.lock().await.len();
        session.events.lock().await.push(event_for_text(" second".into()));

        assert_eq!(accumulated_text(&session, turn_start).await, " second");
    }
}
