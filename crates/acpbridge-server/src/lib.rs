//! Component F: the CPP (control-plane protocol) server. Frames JSON-RPC
//! over stdio via `acpbridge-transport` and dispatches into a
//! `ProxySessionManager` (component E).

pub mod dispatcher;

pub use dispatcher::{CppServer, PROTOCOL_VERSION, PROXY_VERSION};
