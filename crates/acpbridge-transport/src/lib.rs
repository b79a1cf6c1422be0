//! # acp-bridge transport
//!
//! The framed JSON-RPC transport shared by both protocol roles (spec §4.A):
//! LSP-style `Content-Length` framing, outbound request correlation, and
//! inbound request/notification dispatch. Generic over any
//! `AsyncRead`/`AsyncWrite` duplex stream, so it is equally usable over a
//! subprocess's stdio pipes or a test `tokio::io::duplex` pair.

pub mod connection;
pub mod correlation;
pub mod dispatch;
pub mod framing;

pub use connection::{run_reader, Connection};
pub use correlation::PendingCalls;
pub use dispatch::Dispatcher;
pub use framing::{read_frame, write_frame};
