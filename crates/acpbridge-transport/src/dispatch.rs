//! The inbound side of the framed transport: methods are routed to a
//! [`Dispatcher`] implementation by name (spec §4.A "Notifications carry
//! no ID; they are dispatched by method name").

use acpbridge_core::RpcError;
use async_trait::async_trait;
use serde_json::Value;

/// Implemented once per protocol role (CPP server, ACP agent, …) to route
/// inbound requests and notifications to the right handler.
///
/// Default methods answer `-32601 Method not found`, so an implementor only
/// needs to override the methods it actually serves. Not `Send`/`Sync`-bound:
/// a CPP dispatcher (component F) drives component E, which in turn drives
/// the `agent-client-protocol` crate's `?Send` connection futures, so
/// dispatch must run on a single-threaded `LocalSet` via `spawn_local`
/// rather than `tokio::spawn` (spec §5 "matching the agent-client-protocol
/// crate's non-`Send` futures").
#[async_trait(?Send)]
pub trait Dispatcher {
    /// Handles an inbound request, producing the value that becomes `result`.
    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let _ = params;
        Err(RpcError::method_not_found(method))
    }

    /// Handles an inbound notification. Unknown notifications are ignored
    /// silently, matching "Other variants are ignored silently" (§4.B) —
    /// the same tolerance applies to unrecognized CPP/ACP notifications.
    async fn handle_notification(&self, method: &str, params: Value) {
        let _ = (method, params);
    }
}
