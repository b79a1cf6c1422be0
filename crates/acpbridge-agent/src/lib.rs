//! Component D: the agent-role ACP adapter. Wraps an [`AssistantBackend`]
//! and exposes it as an `agent_client_protocol::Agent` over the wire,
//! translating backend events into `session/update` notifications.

pub mod agent;
pub mod backend;
pub mod connection_bridge;
pub mod permissions;
pub mod prompt;
pub mod session;
pub mod usage;

pub use agent::AcpBridgeAgent;
pub use backend::{AssistantBackend, AssistantEvent, MockAssistantBackend, PermissionRequest, ProcessAssistantBackend};
pub use connection_bridge::{ConnectionBridge, OutboundCall};
pub use session::{Session, SessionManager};
pub use usage::{SessionUsage, UsageTracker};
