//! Shared error type for acp-bridge crates.

use thiserror::Error;

/// Result type alias used across acp-bridge crates.
pub type Result<T> = std::result::Result<T, Error>;

/// JSON-RPC 2.0 reserved error codes this system actually emits.
pub mod rpc_code {
    /// Malformed JSON payload.
    pub const PARSE_ERROR: i64 = -32700;
    /// No handler registered for the requested method.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Any other handler failure, including invalid params and unknown session ids.
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Errors shared by the transport, client, agent, proxy and server layers.
#[derive(Debug, Error)]
pub enum Error {
    /// IO errors from the underlying duplex stream or subprocess pipes.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame did not carry a well-formed `Content-Length` header.
    #[error("framing error: {0}")]
    Framing(String),

    /// A remote peer returned a JSON-RPC error response.
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// A suspension point exceeded its deadline (terminal read, disconnect escalation, …).
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// A session id referenced by a caller is not present in the owning map.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A caller-supplied parameter was missing or malformed.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// A handler raised an error that the spec has no more specific kind for.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Maps this error onto the JSON-RPC error code a transport should send to its peer.
    pub fn rpc_code(&self) -> i64 {
        match self {
            Error::Json(_) | Error::Framing(_) => rpc_code::PARSE_ERROR,
            _ => rpc_code::INTERNAL_ERROR,
        }
    }
}
