use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::models::LeafAddress;
use crate::services::import::ImportSummary;

pub mod outbox;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Things the operator should hear about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    QuantityChanged {
        address: LeafAddress,
        item: String,
        previous: u64,
        current: u64,
        log_id: String,
        merged: bool,
    },
    ItemRenamed {
        category: String,
        subcategory: String,
        old_name: String,
        new_name: String,
        renamed: usize,
    },
    NoteEdited {
        address: LeafAddress,
        item: String,
    },
    ItemAdded {
        address: LeafAddress,
        item: String,
        initial_count: u64,
    },
    ItemDeleted {
        item: String,
        removed_total: u64,
        leaves: usize,
    },
    LogMemoEdited {
        id: String,
    },
    LogEntryDeleted {
        id: String,
    },
    ImportCompleted {
        summary: ImportSummary,
        reset: bool,
    },
    KeysSanitized {
        resource: String,
        removed: Vec<String>,
    },
    RemoteUpdateApplied {
        resource: String,
    },
    RemoteUpdateSkipped {
        resource: String,
        reason: String,
    },
    RemoteWriteFailed {
        path: String,
        error: String,
    },
}

/// Drains the event channel, turning each event into a log line.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::QuantityChanged {
                address,
                item,
                previous,
                current,
                merged,
                ..
            } => {
                info!(%address, %item, previous, current, merged, "quantity changed");
            }
            Event::ItemRenamed {
                old_name,
                new_name,
                renamed,
                ..
            } => {
                info!(%old_name, %new_name, renamed, "item renamed");
            }
            Event::NoteEdited { address, item } => {
                info!(%address, %item, "note edited");
            }
            Event::ItemAdded {
                address,
                item,
                initial_count,
            } => {
                info!(%address, %item, initial_count, "item added");
            }
            Event::ItemDeleted {
                item,
                removed_total,
                leaves,
            } => {
                info!(%item, removed_total, leaves, "item deleted from all locations");
            }
            Event::LogMemoEdited { id } => info!(%id, "log memo edited"),
            Event::LogEntryDeleted { id } => info!(%id, "log entry deleted"),
            Event::ImportCompleted { summary, reset } => {
                info!(
                    applied = summary.applied,
                    added = summary.added,
                    increased = summary.increased,
                    rejected = summary.rejected,
                    reset,
                    "import completed"
                );
                if summary.rejected > 0 {
                    warn!(samples = ?summary.rejected_samples, "import rejected rows");
                }
            }
            Event::KeysSanitized { resource, removed } => {
                warn!(%resource, count = removed.len(), "removed keys the remote store would reject");
            }
            Event::RemoteUpdateApplied { resource } => info!(%resource, "remote update applied"),
            Event::RemoteUpdateSkipped { resource, reason } => {
                warn!(%resource, %reason, "remote update skipped")
            }
            Event::RemoteWriteFailed { path, error } => {
                error!(%path, %error, "remote write failed; local state kept")
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_to_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::LogMemoEdited { id: "a".into() })
            .await
            .unwrap();
        assert!(matches!(rx.recv().await, Some(Event::LogMemoEdited { id }) if id == "a"));
    }

    #[tokio::test]
    async fn processing_stops_when_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::RemoteUpdateApplied { resource: "inventory".into() })
            .await
            .unwrap();
        drop(sender);
        process_events(rx).await;
    }
}
