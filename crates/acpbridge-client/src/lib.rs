//! # acp-bridge client
//!
//! Component B: the ACP client stub. Spawns an external ACP agent
//! subprocess, drives it over the real `agent-client-protocol` wire format,
//! and answers its file/terminal/permission reverse-calls.

pub mod callbacks;
pub mod reverse_client;
pub mod stub;

pub use callbacks::{PermissionOptionDescriptor, StubCallbacks};
pub use reverse_client::ReverseClient;
pub use stub::{AcpClientStub, SpawnSpec};
