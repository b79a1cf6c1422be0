//! Ties framing, correlation, and dispatch into one connection object.

use std::sync::Arc;

use acpbridge_core::{classify, Error, Inbound, Notification, Request, RequestId, Response, RpcError};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::Mutex as AsyncMutex;

use crate::correlation::PendingCalls;
use crate::dispatch::Dispatcher;
use crate::framing::{read_frame, write_frame};

/// The write half of a framed connection: outbound requests, notifications,
/// and responses all funnel through the same mutex so frames are never
/// interleaved, per spec "write header+blank+payload atomically against a
/// write mutex to guarantee non-interleaved frames under concurrent senders".
pub struct Connection<W> {
    writer: AsyncMutex<W>,
    pending: Arc<PendingCalls>,
}

impl<W> Connection<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: AsyncMutex::new(writer),
            pending: Arc::new(PendingCalls::new()),
        }
    }

    /// Sends a request and awaits its correlated response.
    pub async fn send_request(&self, method: &str, params: Value) -> Result<Value, Error> {
        let id = self.pending.next_request_id();
        let rx = self.pending.register(id.clone());

        let request = Request {
            jsonrpc: Default::default(),
            id,
            method: method.to_string(),
            params: Some(params),
        };
        let value = serde_json::to_value(&request)?;

        {
            let mut w = self.writer.lock().await;
            write_frame(&mut *w, &value).await?;
        }

        let response = rx
            .await
            .map_err(|_| Error::Internal("connection closed while awaiting response".into()))?;
        response.into_result()
    }

    /// Sends a fire-and-forget notification.
    pub async fn send_notification(&self, method: &str, params: Value) -> Result<(), Error> {
        let notification = Notification {
            jsonrpc: Default::default(),
            method: method.to_string(),
            params: Some(params),
        };
        let value = serde_json::to_value(&notification)?;
        let mut w = self.writer.lock().await;
        write_frame(&mut *w, &value).await
    }

    /// Sends a response to an inbound request.
    pub async fn send_response(&self, id: RequestId, outcome: Result<Value, RpcError>) -> Result<(), Error> {
        let response = match outcome {
            Ok(result) => Response::success(id, result),
            Err(error) => Response::failure(id, error),
        };
        let value = serde_json::to_value(&response)?;
        let mut w = self.writer.lock().await;
        write_frame(&mut *w, &value).await
    }

    /// Resolves a correlated response received by the reader loop.
    fn resolve(&self, response: Response) {
        self.pending.resolve(response);
    }
}

/// Runs the reader side of a framed connection until EOF or a fatal framing
/// error, dispatching requests and notifications to `dispatcher` and
/// resolving responses against `conn`'s pending-call table.
///
/// One dedicated reader task per stdio endpoint, per spec §5
/// "Each stdio endpoint... runs a dedicated reader task that pulls framed
/// messages in order and dispatches them". Dispatch is spawned with
/// `tokio::task::spawn_local`, not `tokio::spawn`: this must run inside a
/// `tokio::task::LocalSet` so a CPP dispatcher (component F) can freely
/// drive component E's `?Send` ACP client-stub futures.
pub async fn run_reader<R, W, D>(mut reader: R, conn: Arc<Connection<W>>, dispatcher: Arc<D>) -> Result<(), Error>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + 'static,
    D: Dispatcher + 'static,
{
    loop {
        let value = match read_frame(&mut reader).await {
            Ok(Some(v)) => v,
            Ok(None) => return Ok(()),
            Err(err) => {
                tracing::error!(error = %err, "framing error, resynchronizing stream");
                continue;
            }
        };

        let inbound = match classify(value) {
            Ok(inbound) => inbound,
            Err(err) => {
                tracing::warn!(error = %err, "dropping unparseable frame");
                continue;
            }
        };

        match inbound {
            Inbound::Request(req) => {
                let conn = Arc::clone(&conn);
                let dispatcher = Arc::clone(&dispatcher);
                tokio::task::spawn_local(async move {
                    let outcome = dispatcher
                        .handle_request(&req.method, req.params.unwrap_or(Value::Null))
                        .await;
                    if let Err(err) = conn.send_response(req.id, outcome).await {
                        tracing::error!(error = %err, "failed to send response");
                    }
                });
            }
            Inbound::Notification(notif) => {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::task::spawn_local(async move {
                    dispatcher
                        .handle_notification(&notif.method, notif.params.unwrap_or(Value::Null))
                        .await;
                });
            }
            Inbound::Response(resp) => {
                conn.resolve(resp);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::BufReader;

    struct EchoDispatcher {
        notified: AtomicUsize,
    }

    #[async_trait(?Send)]
    impl Dispatcher for EchoDispatcher {
        async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
            if method == "ping" {
                Ok(serde_json::json!({"message": "pong", "echo": params}))
            } else {
                Err(RpcError::method_not_found(method))
            }
        }

        async fn handle_notification(&self, _method: &str, _params: Value) {
            self.notified.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn request_gets_dispatched_and_responded() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let request = serde_json::json!({"jsonrpc":"2.0","id":1,"method":"ping","params":{}});
                let mut input = Vec::new();
                write_frame(&mut input, &request).await.unwrap();
                let reader = BufReader::new(&input[..]);

                let (mut observer, remote) = tokio::io::duplex(4096);
                let conn = Arc::new(Connection::new(remote));
                let dispatcher = Arc::new(EchoDispatcher {
                    notified: AtomicUsize::new(0),
                });

                run_reader(reader, Arc::clone(&conn), dispatcher).await.unwrap();

                let mut observer_reader = BufReader::new(&mut observer);
                let response = read_frame(&mut observer_reader).await.unwrap().unwrap();
                assert_eq!(response["result"]["message"], "pong");
            })
            .await;
    }
}
