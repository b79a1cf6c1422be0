//! Outbound request id correlation (spec §4.A "Correlation").

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use acpbridge_core::{RequestId, Response};
use tokio::sync::oneshot;

/// Assigns monotonically increasing integer ids to outbound requests and
/// resolves their responses as they arrive.
///
/// Responses that arrive with no matching id are logged and dropped, per
/// spec: "Responses arriving without a matching ID are logged and dropped."
#[derive(Default)]
pub struct PendingCalls {
    next_id: AtomicI64,
    table: Mutex<HashMap<RequestId, oneshot::Sender<Response>>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates the next outbound request id.
    pub fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Registers interest in the response for `id`, returning a receiver
    /// that resolves when [`PendingCalls::resolve`] is called with a
    /// matching response.
    pub fn register(&self, id: RequestId) -> oneshot::Receiver<Response> {
        let (tx, rx) = oneshot::channel();
        self.table.lock().unwrap().insert(id, tx);
        rx
    }

    /// Resolves the pending call matching `response.id`, if any is
    /// outstanding. Unmatched responses are logged and dropped.
    pub fn resolve(&self, response: Response) {
        let sender = self.table.lock().unwrap().remove(&response.id);
        match sender {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => {
                tracing::warn!(id = %response.id, "response with no matching pending call, dropping");
            }
        }
    }

    /// Number of calls currently awaiting a response. Exposed for tests.
    pub fn pending_count(&self) -> usize {
        self.table.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acpbridge_core::Response as CoreResponse;

    #[tokio::test]
    async fn resolves_a_registered_call() {
        let pending = PendingCalls::new();
        let id = pending.next_request_id();
        let rx = pending.register(id.clone());

        let resp = CoreResponse::success(id, serde_json::json!({"ok": true}));
        pending.resolve(resp.clone());

        let got = rx.await.unwrap();
        assert_eq!(got.result, resp.result);
        assert_eq!(pending.pending_count(), 0);
    }

    #[tokio::test]
    async fn unmatched_response_is_dropped_not_panicked() {
        let pending = PendingCalls::new();
        let resp = CoreResponse::success(RequestId::Number(999), serde_json::json!(null));
        pending.resolve(resp);
        assert_eq!(pending.pending_count(), 0);
    }
}
