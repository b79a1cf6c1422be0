//! The embedded assistant boundary (spec §6.4): the agent adapter never
//! talks to a concrete AI SDK directly, only through this trait — mirroring
//! the teacher's `MockAgent`/mock-backend split, generalized to a real
//! production/mock seam.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// One item emitted by an [`AssistantBackend`] turn, matching the shapes
/// `agent.py`'s `_handle_message`/`_handle_stream_event` dispatch on.
#[derive(Debug, Clone)]
pub enum AssistantEvent {
    Text(String),
    Thinking(String),
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, is_error: bool, output: Value },
    /// Terminal usage/cost accounting (spec §4.D "Usage accounting").
    Usage { input_tokens: u64, output_tokens: u64, total_cost_usd: f64 },
}

/// A permission request raised by the backend before it is allowed to use
/// a tool — the agent adapter decides (auto-allow rule or forwards to the
/// ACP client) and returns whether the tool may proceed.
pub struct PermissionRequest {
    pub tool_name: String,
    pub tool_input: Value,
}

/// Boundary between the agent adapter (component D) and whatever runs the
/// actual assistant turn. One production implementation wraps the real SDK
/// client; [`MockAssistantBackend`] replays a scripted sequence for tests.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Starts a turn for `prompt_text` in `cwd`, returning a stream of
    /// events. The stream ends when the turn completes naturally.
    async fn run_turn(&self, prompt_text: &str, cwd: &std::path::Path) -> BoxStream<'static, AssistantEvent>;

    /// Asks the backend to stop the in-flight turn as soon as possible.
    async fn interrupt(&self);
}

/// Scripted backend for tests — replays a fixed list of events per call,
/// ignoring `prompt_text`/`cwd` (mirrors `crucible-acp`'s `MockAgent`
/// canned-response pattern, generalized to streaming events).
pub struct MockAssistantBackend {
    script: Vec<AssistantEvent>,
}

impl MockAssistantBackend {
    pub fn new(script: Vec<AssistantEvent>) -> Self {
        Self { script }
    }
}

#[async_trait]
impl AssistantBackend for MockAssistantBackend {
    async fn run_turn(&self, _prompt_text: &str, _cwd: &std::path::Path) -> BoxStream<'static, AssistantEvent> {
        Box::pin(futures::stream::iter(self.script.clone()))
    }

    async fn interrupt(&self) {}
}

/// Wire shape emitted, one JSON object per line, by the production
/// assistant process (spec §6.4: "a thin wrapper the rest of the system
/// never inspects beyond the stream/callback boundary" — its internal
/// SDK integration is out of scope; only this line protocol is).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Text { text: String },
    Thinking { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, is_error: bool, output: Value },
    Usage { input_tokens: u64, output_tokens: u64, total_cost_usd: f64 },
}

impl From<WireEvent> for AssistantEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::Text { text } => AssistantEvent::Text(text),
            WireEvent::Thinking { text } => AssistantEvent::Thinking(text),
            WireEvent::ToolUse { id, name, input } => AssistantEvent::ToolUse { id, name, input },
            WireEvent::ToolResult { tool_use_id, is_error, output } => {
                AssistantEvent::ToolResult { tool_use_id, is_error, output }
            }
            WireEvent::Usage { input_tokens, output_tokens, total_cost_usd } => {
                AssistantEvent::Usage { input_tokens, output_tokens, total_cost_usd }
            }
        }
    }
}

/// Production backend: spawns a configured external process per turn,
/// writes the prompt to its stdin, and parses [`WireEvent`] lines from its
/// stdout. One child per turn, matching `agent.py`'s one-`ClaudeSDKClient`
/// scope per prompt.
pub struct ProcessAssistantBackend {
    command: String,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl ProcessAssistantBackend {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            child: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AssistantBackend for ProcessAssistantBackend {
    async fn run_turn(&self, prompt_text: &str, cwd: &Path) -> BoxStream<'static, AssistantEvent> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(error = %e, command = %self.command, "failed to spawn assistant backend process");
                return Box::pin(futures::stream::empty());
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            let write_result = async {
                stdin.write_all(prompt_text.as_bytes()).await?;
                stdin.write_all(b"\n").await
            }
            .await;
            if let Err(e) = write_result {
                tracing::warn!(error = %e, "failed to write prompt to assistant backend stdin");
            }
        }

        let Some(stdout) = child.stdout.take() else {
            return Box::pin(futures::stream::empty());
        };
        *self.child.lock().await = Some(child);

        let lines = BufReader::new(stdout).lines();
        Box::pin(futures::stream::unfold(lines, |mut lines| async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match serde_json::from_str::<WireEvent>(&line) {
                        Ok(event) => return Some((AssistantEvent::from(event), lines)),
                        Err(e) => {
                            tracing::debug!(error = %e, line, "skipping unparseable assistant event line");
                            continue;
                        }
                    },
                    _ => return None,
                }
            }
        }))
    }

    async fn interrupt(&self) {
        if let Some(child) = self.child.lock().await.as_mut() {
            if let Err(e) = child.start_kill() {
                tracing::warn!(error = %e, "failed to kill assistant backend process on interrupt");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn mock_backend_replays_its_script_in_order() {
        let backend = MockAssistantBackend::new(vec![
            AssistantEvent::Text("He".into()),
            AssistantEvent::Text("llo".into()),
        ]);
        let events: Vec<_> = backend.run_turn("hi", std::path::Path::new(".")).await.collect().await;
        assert_eq!(events.len(), 2);
    }
}
