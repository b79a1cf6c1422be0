//! Terminal registry and lifecycle (spec §4.C, §8 scenario 5).
//!
//! No teacher or `original_source` file implements real terminal
//! create/output/wait/release/kill semantics — the reference implementation
//! stubs every terminal method. This module is authored directly from the
//! spec's byte-level behavior against `tokio::process::Command` and
//! `tokio::time::timeout`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::hooks::FileTerminalHooks;

const OUTPUT_TIMEOUT: Duration = Duration::from_millis(100);
const OUTPUT_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTerminalResult {
    pub terminal_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminalOutputResult {
    pub output: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaitForExitResult {
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A live or exited terminal process, keyed by `terminal-<N>` in the
/// registry (spec §3 TerminalProcess).
struct TerminalProcess {
    child: Child,
    command: String,
    cwd: PathBuf,
    output_buffer: String,
    exit_code: Option<i32>,
}

/// Keyed table of terminal processes, with a per-registry monotonic counter.
pub struct TerminalRegistry {
    hooks: Arc<dyn FileTerminalHooks>,
    table: Mutex<HashMap<String, TerminalProcess>>,
    counter: AtomicU64,
}

impl TerminalRegistry {
    pub fn new(hooks: Arc<dyn FileTerminalHooks>) -> Self {
        Self {
            hooks,
            table: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Composes `command` with space-joined `args`, asks the creation hook,
    /// and on approval spawns the process through the OS shell with stderr
    /// merged into stdout.
    pub async fn create(&self, command: &str, args: &[String], cwd: &Path) -> CreateTerminalResult {
        let full_command = if args.is_empty() {
            command.to_string()
        } else {
            format!("{} {}", command, args.join(" "))
        };

        if !self.hooks.on_terminal_create(&full_command, cwd).await {
            return CreateTerminalResult {
                terminal_id: String::new(),
                error: Some("Terminal creation blocked".into()),
            };
        }

        let spawn_result = Command::new("/bin/sh")
            .arg("-c")
            .arg(format!("{full_command} 2>&1"))
            .current_dir(cwd)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .spawn();

        let child = match spawn_result {
            Ok(child) => child,
            Err(err) => {
                return CreateTerminalResult {
                    terminal_id: String::new(),
                    error: Some(err.to_string()),
                }
            }
        };

        let id = format!("terminal-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1);
        let process = TerminalProcess {
            child,
            command: full_command,
            cwd: cwd.to_path_buf(),
            output_buffer: String::new(),
            exit_code: None,
        };
        self.table.lock().await.insert(id.clone(), process);

        CreateTerminalResult {
            terminal_id: id,
            error: None,
        }
    }

    /// A 100ms bounded read of up to 4096 bytes. On data, returns the newly
    /// read chunk and appends it to the buffer. On timeout, returns the
    /// buffer accumulated so far without blocking further.
    pub async fn output(&self, terminal_id: &str) -> TerminalOutputResult {
        let mut table = self.table.lock().await;
        let Some(process) = table.get_mut(terminal_id) else {
            return TerminalOutputResult::default();
        };

        let Some(stdout) = process.child.stdout.as_mut() else {
            return TerminalOutputResult {
                output: process.output_buffer.clone(),
            };
        };

        let mut buf = vec![0u8; OUTPUT_CHUNK_SIZE];
        match tokio::time::timeout(OUTPUT_TIMEOUT, stdout.read(&mut buf)).await {
            Ok(Ok(0)) | Err(_) => TerminalOutputResult {
                output: process.output_buffer.clone(),
            },
            Ok(Ok(n)) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                process.output_buffer.push_str(&chunk);
                self.hooks.on_terminal_output(terminal_id, &chunk).await;
                TerminalOutputResult { output: chunk }
            }
            Ok(Err(err)) => {
                tracing::warn!(terminal_id, error = %err, "terminal read error");
                TerminalOutputResult {
                    output: process.output_buffer.clone(),
                }
            }
        }
    }

    /// Drains remaining stdout, waits for the process, and caches its exit
    /// code on the record.
    pub async fn wait_for_exit(&self, terminal_id: &str) -> WaitForExitResult {
        let mut table = self.table.lock().await;
        let Some(process) = table.get_mut(terminal_id) else {
            return WaitForExitResult {
                exit_code: -1,
                error: Some(format!("unknown terminal: {terminal_id}")),
            };
        };

        if let Some(code) = process.exit_code {
            return WaitForExitResult {
                exit_code: code,
                error: None,
            };
        }

        if let Some(mut stdout) = process.child.stdout.take() {
            let mut rest = String::new();
            let _ = stdout.read_to_string(&mut rest).await;
            if !rest.is_empty() {
                process.output_buffer.push_str(&rest);
                self.hooks.on_terminal_output(terminal_id, &rest).await;
            }
        }

        match process.child.wait().await {
            Ok(status) => {
                let code = status.code().unwrap_or(-1);
                process.exit_code = Some(code);
                WaitForExitResult {
                    exit_code: code,
                    error: None,
                }
            }
            Err(err) => WaitForExitResult {
                exit_code: -1,
                error: Some(err.to_string()),
            },
        }
    }

    /// Removes the entry from the table without signalling the process.
    pub async fn release(&self, terminal_id: &str) {
        self.table.lock().await.remove(terminal_id);
    }

    /// Signals kill, waits, and removes the entry.
    pub async fn kill(&self, terminal_id: &str) {
        let mut table = self.table.lock().await;
        if let Some(mut process) = table.remove(terminal_id) {
            let _ = process.child.start_kill();
            let _ = process.child.wait().await;
        }
    }

    /// Kills every live terminal. Used when the owning ACP stub disconnects
    /// (spec §4.B "Terminals in C are killed first").
    pub async fn kill_all(&self) {
        let mut table = self.table.lock().await;
        for (_, mut process) in table.drain() {
            let _ = process.child.start_kill();
            let _ = process.child.wait().await;
        }
    }

    /// True if `terminal_id` is still registered. Exposed for tests.
    pub async fn contains(&self, terminal_id: &str) -> bool {
        self.table.lock().await.contains_key(terminal_id)
    }

    /// The display command a terminal was created with. Exposed for tests.
    pub async fn command_of(&self, terminal_id: &str) -> Option<String> {
        self.table.lock().await.get(terminal_id).map(|p| p.command.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoHooks;

    #[tokio::test]
    async fn full_lifecycle_echo() {
        let registry = TerminalRegistry::new(Arc::new(NoHooks));
        let created = registry.create("echo", &["hi".to_string()], Path::new(".")).await;
        assert!(created.error.is_none());
        assert_eq!(created.terminal_id, "terminal-1");

        let exit = registry.wait_for_exit(&created.terminal_id).await;
        assert_eq!(exit.exit_code, 0);

        let output = registry.output(&created.terminal_id).await;
        assert_eq!(output.output, "hi\n");

        registry.release(&created.terminal_id).await;
        assert!(!registry.contains(&created.terminal_id).await);
    }

    #[tokio::test]
    async fn release_of_unknown_id_is_a_no_op() {
        let registry = TerminalRegistry::new(Arc::new(NoHooks));
        registry.release("terminal-999").await;
    }

    #[tokio::test]
    async fn wait_for_exit_on_unknown_id_reports_minus_one() {
        let registry = TerminalRegistry::new(Arc::new(NoHooks));
        let result = registry.wait_for_exit("terminal-999").await;
        assert_eq!(result.exit_code, -1);
        assert!(result.error.is_some());
    }

    struct BlockCreate;
    #[async_trait::async_trait]
    impl FileTerminalHooks for BlockCreate {
        async fn on_terminal_create(&self, _full_command: &str, _cwd: &Path) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn hook_can_block_terminal_creation() {
        let registry = TerminalRegistry::new(Arc::new(BlockCreate));
        let created = registry.create("echo", &["hi".into()], Path::new(".")).await;
        assert_eq!(created.terminal_id, "");
        assert_eq!(created.error.unwrap(), "Terminal creation blocked");
    }
}
