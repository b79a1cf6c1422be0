//! Per-session agent state (spec §4.D, modeled on `agent.py`'s `Session`
//! dataclass).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// One active session on the agent side. `cancelled` is reset at the start
/// of every `prompt` and observed at the next suspension point.
pub struct Session {
    pub session_id: String,
    pub cwd: PathBuf,
    pub permission_mode: Mutex<String>,
    cancelled: AtomicBool,
    pub tool_use_cache: Mutex<HashMap<String, Value>>,
}

impl Session {
    pub fn new(session_id: String, cwd: PathBuf) -> Self {
        Self {
            session_id,
            cwd,
            permission_mode: Mutex::new("default".to_string()),
            cancelled: AtomicBool::new(false),
            tool_use_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn set_cancelled(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn reset_cancelled(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn permission_mode(&self) -> String {
        self.permission_mode.lock().unwrap().clone()
    }
}

/// Valid `set_session_mode` targets (spec §6.4 permission modes).
pub const VALID_MODES: &[&str] = &["default", "acceptEdits", "plan", "bypassPermissions", "dontAsk"];

#[derive(Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, cwd: PathBuf) -> Arc<Session> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(session_id.clone(), cwd));
        self.sessions.lock().unwrap().insert(session_id, session.clone());
        session
    }

    pub fn insert_with_id(&self, session_id: String, cwd: PathBuf) -> Arc<Session> {
        let session = Arc::new(Session::new(session_id.clone(), cwd));
        self.sessions.lock().unwrap().insert(session_id, session.clone());
        session
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().unwrap().get(session_id).cloned()
    }

    pub fn has(&self, session_id: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_assigns_default_mode_and_clears_cancellation() {
        let manager = SessionManager::new();
        let session = manager.create(PathBuf::from("/tmp"));
        assert_eq!(session.permission_mode(), "default");
        assert!(!session.is_cancelled());

        session.set_cancelled();
        assert!(session.is_cancelled());
        session.reset_cancelled();
        assert!(!session.is_cancelled());
    }

    #[test]
    fn manager_looks_sessions_up_by_id() {
        let manager = SessionManager::new();
        let session = manager.create(PathBuf::from("/tmp"));
        assert!(manager.has(&session.session_id));
        assert!(manager.get(&session.session_id).is_some());
        assert!(manager.get("missing").is_none());
    }
}
