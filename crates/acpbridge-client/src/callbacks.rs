//! Callback registration for the ACP client stub (spec §4.B).
//!
//! Registered once per stub, mirroring the reference implementation's
//! decorator-based `@client.on_text` API, adapted to a Rust builder since
//! Rust has no runtime decorators.

use std::sync::Arc;

use agent_client_protocol::PermissionOptionId;
use futures::future::BoxFuture;
use serde_json::Value;

pub type TextHandler = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;
pub type ToolStartHandler = Arc<dyn Fn(String, String, Value) -> BoxFuture<'static, ()> + Send + Sync>;
pub type ToolEndHandler = Arc<dyn Fn(String, String, Value) -> BoxFuture<'static, ()> + Send + Sync>;
pub type PermissionHandler =
    Arc<dyn Fn(String, Value, Vec<PermissionOptionDescriptor>) -> BoxFuture<'static, PermissionOptionId> + Send + Sync>;
pub type CompleteHandler = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

/// A permission option as presented to the permission callback:
/// `{option_id, name}` (spec §4.B).
#[derive(Debug, Clone)]
pub struct PermissionOptionDescriptor {
    pub option_id: PermissionOptionId,
    pub name: String,
}

/// The set of callbacks an `AcpClientStub` dispatches inbound updates and
/// reverse-calls to. Every slot is optional; an unset slot is a silent
/// no-op (for the `on_*` update handlers) or falls back to the spec's
/// stated default (`"allow"` for permission).
#[derive(Clone, Default)]
pub struct StubCallbacks {
    pub on_text: Option<TextHandler>,
    pub on_thinking: Option<TextHandler>,
    pub on_tool_start: Option<ToolStartHandler>,
    pub on_tool_end: Option<ToolEndHandler>,
    pub on_permission: Option<PermissionHandler>,
    pub on_complete: Option<CompleteHandler>,
    pub on_error: Option<ErrorHandler>,
}
