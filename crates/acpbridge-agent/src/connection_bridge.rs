//! Routes the agent's outbound `session/update` notifications and
//! `session/request_permission` calls through the `AgentSideConnection`
//! that owns the wire.
//!
//! `Agent` implementations can't hold the connection that wraps them
//! (`AgentSideConnection::new` takes the agent by value), so outbound
//! traffic is forwarded over a channel to the task that does own it —
//! generalized from the single-purpose `session_update_tx` channel seen in
//! `sim_agent.rs` to also carry permission round-trips.

use agent_client_protocol::{
    AgentSideConnection, RequestPermissionRequest, RequestPermissionResponse, Result as AcpResult,
    SessionNotification,
};
use tokio::sync::{mpsc, oneshot};

pub enum OutboundCall {
    Notify(SessionNotification, oneshot::Sender<()>),
    RequestPermission(RequestPermissionRequest, oneshot::Sender<AcpResult<RequestPermissionResponse>>),
}

#[derive(Clone)]
pub struct ConnectionBridge {
    tx: mpsc::UnboundedSender<OutboundCall>,
}

impl ConnectionBridge {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundCall>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub async fn session_notification(&self, notification: SessionNotification) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(OutboundCall::Notify(notification, tx)).is_err() {
            tracing::warn!("connection bridge closed, dropping session notification");
            return;
        }
        let _ = rx.await;
    }

    pub async fn request_permission(&self, request: RequestPermissionRequest) -> AcpResult<RequestPermissionResponse> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(OutboundCall::RequestPermission(request, tx))
            .map_err(|_| agent_client_protocol::Error::internal_error())?;
        rx.await.map_err(|_| agent_client_protocol::Error::internal_error())?
    }
}

/// Drains `rx`, forwarding each call onto `conn`. Must run in the same
/// `LocalSet`/task set as `conn`'s own IO task (the connection's futures
/// are `?Send`).
pub async fn run_outbound_loop(conn: &AgentSideConnection, mut rx: mpsc::UnboundedReceiver<OutboundCall>) {
    while let Some(call) = rx.recv().await {
        match call {
            OutboundCall::Notify(notification, ack) => {
                if let Err(e) = conn.session_notification(notification).await {
                    tracing::warn!(error = %e, "failed to deliver session notification");
                }
                let _ = ack.send(());
            }
            OutboundCall::RequestPermission(request, reply) => {
                let result = conn.request_permission(request).await;
                let _ = reply.send(result);
            }
        }
    }
}
