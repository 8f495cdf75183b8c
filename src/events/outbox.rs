//! Ordered outbound queue for remote writes.
//!
//! Callers enqueue and move on; a single background task applies writes to
//! the remote tree in enqueue order. Failures are logged, counted and emitted
//! as [`Event::RemoteWriteFailed`]. Nothing is retried.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics::REMOTE_WRITE_FAILURES;
use crate::remote::RemoteTree;

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundWrite {
    Whole { resource: String, value: Value },
    Field { path: String, value: Value },
}

impl OutboundWrite {
    pub fn path(&self) -> &str {
        match self {
            OutboundWrite::Whole { resource, .. } => resource,
            OutboundWrite::Field { path, .. } => path,
        }
    }
}

struct Job {
    write: OutboundWrite,
    done: oneshot::Sender<Result<(), String>>,
}

/// Completion handle for one enqueued write. Dropping it is fine.
#[derive(Debug)]
pub struct WriteTicket {
    path: String,
    rx: oneshot::Receiver<Result<(), String>>,
}

impl WriteTicket {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn wait(self) -> Result<(), ServiceError> {
        match self.rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(ServiceError::RemoteWriteFailed(format!(
                "{}: {}",
                self.path, message
            ))),
            Err(_) => Err(ServiceError::RemoteWriteFailed(format!(
                "{}: outbound writer stopped",
                self.path
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Job>,
}

impl Outbox {
    /// Spawns the writer task. Must be called inside a Tokio runtime.
    pub fn start(remote: Arc<dyn RemoteTree>, events: Option<EventSender>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(remote, events, rx));
        Self { tx }
    }

    pub fn enqueue(&self, write: OutboundWrite) -> WriteTicket {
        let (done, rx) = oneshot::channel();
        let path = write.path().to_string();
        if let Err(mpsc::error::SendError(job)) = self.tx.send(Job { write, done }) {
            error!(path = %path, "outbound writer is gone; write dropped");
            let _ = job.done.send(Err("outbound writer stopped".to_string()));
        }
        WriteTicket { path, rx }
    }
}

async fn run_worker(
    remote: Arc<dyn RemoteTree>,
    events: Option<EventSender>,
    mut rx: mpsc::UnboundedReceiver<Job>,
) {
    info!("outbound writer started");
    while let Some(Job { write, done }) = rx.recv().await {
        let path = write.path().to_string();
        let result = match write {
            OutboundWrite::Whole { resource, value } => remote.write_whole(&resource, value).await,
            OutboundWrite::Field { path, value } => remote.write_field(&path, value).await,
        };
        let outcome = match result {
            Ok(()) => {
                debug!(path = %path, "remote write done");
                Ok(())
            }
            Err(err) => {
                REMOTE_WRITE_FAILURES.inc();
                error!(path = %path, error = %err, "remote write failed");
                if let Some(events) = &events {
                    let _ = events
                        .send(Event::RemoteWriteFailed {
                            path: path.clone(),
                            error: err.to_string(),
                        })
                        .await;
                }
                Err(err.to_string())
            }
        };
        let _ = done.send(outcome);
    }
    info!("outbound writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemoteTree;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[tokio::test]
    async fn writes_apply_in_order() {
        let tree = InMemoryRemoteTree::new();
        let outbox = Outbox::start(Arc::new(tree.clone()), None);

        let first = outbox.enqueue(OutboundWrite::Whole {
            resource: "inventory".into(),
            value: json!({ "v": 1 }),
        });
        let second = outbox.enqueue(OutboundWrite::Field {
            path: "logs/a".into(),
            value: json!({ "change": 1 }),
        });
        first.wait().await.unwrap();
        second.wait().await.unwrap();

        assert_eq!(tree.written_paths(), vec!["inventory", "logs/a"]);
    }

    #[tokio::test]
    async fn failures_reach_ticket_and_events() {
        let tree = InMemoryRemoteTree::new();
        tree.reject_writes(true);
        let (tx, mut rx) = mpsc::channel(4);
        let outbox = Outbox::start(Arc::new(tree), Some(EventSender::new(tx)));

        let ticket = outbox.enqueue(OutboundWrite::Whole {
            resource: "inventory".into(),
            value: json!({}),
        });
        assert_matches!(ticket.wait().await, Err(ServiceError::RemoteWriteFailed(_)));
        assert_matches!(rx.recv().await, Some(Event::RemoteWriteFailed { path, .. }) if path == "inventory");
    }
}
