//! Component E: the proxy session manager. Holds one `AcpClientStub` (B)
//! per CPP session, translating its callbacks into CPP event envelopes.

pub mod backend_flags;
pub mod mcp;
pub mod session;

pub use backend_flags::{models_for_backend, resolve_backend_args, ModelDelivery};
pub use mcp::convert_mcp_servers;
pub use session::{BackendConfig, EventSink, ProxySession, ProxySessionManager};
