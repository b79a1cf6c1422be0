//! Interception hooks for agent-originated file and terminal operations
//! (spec §4.C). Modeled on the teacher's optional-interception-callback
//! shape in `FileSystemHandler`, generalized to an object-safe trait so a
//! caller can register no hooks at all and get the plain pass-through
//! behavior the spec describes as the default.

use async_trait::async_trait;
use std::path::Path;

/// Hooks a host may register to observe or intercept file/terminal
/// operations an agent requests. Every method has a permissive default so a
/// host that implements none of them gets the spec's un-intercepted
/// behavior for free.
#[async_trait]
pub trait FileTerminalHooks: Send + Sync {
    /// If this returns `Some(content)`, that content is used verbatim
    /// instead of reading the file from disk.
    async fn on_file_read(&self, path: &Path) -> Option<String> {
        let _ = path;
        None
    }

    /// Returning `false` silently drops the write; the agent still sees
    /// success (spec: "the block is transparent to the agent").
    async fn on_file_write(&self, path: &Path, content: &str) -> bool {
        let _ = (path, content);
        true
    }

    /// Returning `false` blocks terminal creation.
    async fn on_terminal_create(&self, full_command: &str, cwd: &Path) -> bool {
        let _ = (full_command, cwd);
        true
    }

    /// Observes each chunk of terminal output as it is produced.
    async fn on_terminal_output(&self, terminal_id: &str, chunk: &str) {
        let _ = (terminal_id, chunk);
    }
}

/// The hookset used when a host registers nothing: every operation proceeds
/// un-intercepted.
#[derive(Debug, Default)]
pub struct NoHooks;

impl FileTerminalHooks for NoHooks {}
