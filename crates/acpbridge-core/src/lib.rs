//! # acp-bridge core
//!
//! Shared JSON-RPC envelope types, error kinds, and the CPP event envelope
//! used by every other crate in the workspace. Nothing here speaks to a
//! byte stream or a subprocess; that lives in `acpbridge-transport` and
//! `acpbridge-client`.

pub mod dedup;
pub mod error;
pub mod event;
pub mod jsonrpc;

pub use dedup::TextDedup;
pub use error::{Error, Result};
pub use event::EventEnvelope;
pub use jsonrpc::{classify, Inbound, Notification, Request, RequestId, Response, RpcError};
