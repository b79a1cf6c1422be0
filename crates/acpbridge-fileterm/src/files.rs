//! File read/write service for agent-originated `fs/read_text_file` and
//! `fs/write_text_file` requests (spec §4.C).

use std::path::Path;
use std::sync::Arc;

use acpbridge_core::Error;
use serde::{Deserialize, Serialize};

use crate::hooks::FileTerminalHooks;

/// In-band result of a file read — this never throws across the wire, per
/// spec: "Never throw across the wire."
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileReadResult {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Services file read/write requests, honoring any registered hooks.
pub struct FileService {
    hooks: Arc<dyn FileTerminalHooks>,
}

impl FileService {
    pub fn new(hooks: Arc<dyn FileTerminalHooks>) -> Self {
        Self { hooks }
    }

    /// Reads `path`. If `on_file_read` returns content, that content is used
    /// verbatim; otherwise the file is read from disk as UTF-8. A missing
    /// file or other I/O error is reported in-band, never thrown.
    pub async fn read_file(&self, path: &Path) -> FileReadResult {
        if let Some(content) = self.hooks.on_file_read(path).await {
            return FileReadResult {
                content,
                error: None,
            };
        }

        match tokio::fs::read_to_string(path).await {
            Ok(content) => FileReadResult {
                content,
                error: None,
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => FileReadResult {
                content: String::new(),
                error: Some(format!("File not found: {}", path.display())),
            },
            Err(err) => FileReadResult {
                content: String::new(),
                error: Some(err.to_string()),
            },
        }
    }

    /// Writes `content` to `path`. If `on_file_write` returns `false`, the
    /// write is silently dropped and `Ok(())` is still returned — the block
    /// is transparent to the agent. Otherwise parent directories are
    /// created recursively and the write proceeds; I/O errors propagate as
    /// RPC errors (unlike reads, writes are allowed to fail loudly).
    pub async fn write_file(&self, path: &Path, content: &str) -> Result<(), Error> {
        if !self.hooks.on_file_write(path, content).await {
            tracing::debug!(path = %path.display(), "write dropped by hook");
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoHooks;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[tokio::test]
    async fn read_missing_file_reports_error_not_throw() {
        let svc = FileService::new(Arc::new(NoHooks));
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.txt");

        let result = svc.read_file(&missing).await;
        assert_eq!(result.content, "");
        assert!(result.error.unwrap().starts_with("File not found"));
    }

    #[tokio::test]
    async fn write_creates_parent_dirs_and_reads_back() {
        let svc = FileService::new(Arc::new(NoHooks));
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c.txt");

        svc.write_file(&nested, "hello").await.unwrap();
        let result = svc.read_file(&nested).await;
        assert_eq!(result.content, "hello");
        assert!(result.error.is_none());
    }

    struct BlockWrites;

    #[async_trait]
    impl FileTerminalHooks for BlockWrites {
        async fn on_file_write(&self, _path: &Path, _content: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn blocked_write_is_silently_dropped_and_reports_success() {
        let svc = FileService::new(Arc::new(BlockWrites));
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocked.txt");

        svc.write_file(&path, "nope").await.unwrap();
        assert!(!path.exists());
    }

    struct OverrideRead(Mutex<Option<String>>);

    #[async_trait]
    impl FileTerminalHooks for OverrideRead {
        async fn on_file_read(&self, _path: &Path) -> Option<String> {
            self.0.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn hook_supplied_content_bypasses_disk_read() {
        let svc = FileService::new(Arc::new(OverrideRead(Mutex::new(Some("mocked".into())))));
        let result = svc.read_file(Path::new("/does/not/exist")).await;
        assert_eq!(result.content, "mocked");
    }
}
