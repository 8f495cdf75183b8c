//! The client-side inventory service.
//!
//! Owns the local workspace, runs commands against it for a logged-in
//! session, and hands every change to the sync engine. Remote updates are
//! applied through the same path so echo suppression sees them.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::{
    clock::Clock,
    commands::{Command, CommandContext},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{InventoryMirror, LogEntry, Workspace},
    services::{
        export::{self, InventorySnapshot, LogRow},
        inventory_sync::{RemoteDecision, RemoteFeeds, RemoteOutcome, RemoteUpdate, SyncEngine, SyncReport},
        log_book::{LogBook, LogFilter},
        search::{self, SearchHit},
    },
    session::Session,
};

/// A command result together with the sync work it queued.
#[derive(Debug)]
pub struct Applied<T> {
    pub value: T,
    pub sync: SyncReport,
}

pub struct InventoryService {
    workspace: Workspace,
    sync: SyncEngine,
    clock: Arc<dyn Clock>,
    merge_window: Duration,
    idle_timeout: Option<Duration>,
    events: Option<EventSender>,
}

impl InventoryService {
    /// Loads the offline copy and returns a ready service. Subscribing to
    /// the remote tree is a separate step, see [`Self::subscribe`].
    pub async fn start(
        mut sync: SyncEngine,
        clock: Arc<dyn Clock>,
        merge_window: Duration,
        events: Option<EventSender>,
    ) -> Result<Self, ServiceError> {
        let workspace = sync.load_local().await?;
        Ok(Self {
            workspace,
            sync,
            clock,
            merge_window,
            idle_timeout: None,
            events,
        })
    }

    /// Refuses mutations from sessions inactive for at least `timeout`.
    pub fn set_idle_timeout(&mut self, timeout: Duration) {
        self.idle_timeout = Some(timeout);
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn mirror(&self) -> &InventoryMirror {
        &self.workspace.mirror
    }

    pub fn logs(&self) -> &LogBook {
        &self.workspace.logs
    }

    pub fn merge_window(&self) -> Duration {
        self.merge_window
    }

    /// Runs a mutation for `session`. The workspace is updated before this
    /// returns; the remote writes it queued are in the returned report.
    #[instrument(skip(self, session, command), fields(operator = %session.operator_id))]
    pub async fn execute<C: Command>(
        &mut self,
        session: &mut Session,
        command: &C,
    ) -> Result<Applied<C::Result>, ServiceError> {
        session.require_editor()?;
        let now = self.clock.now();
        if self.idle_timeout.is_some_and(|timeout| session.is_idle(now, timeout)) {
            return Err(ServiceError::Forbidden(format!(
                "session of {} expired after inactivity",
                session.operator_name
            )));
        }
        session.touch(now);

        let mut ctx = CommandContext::new(session.operator(), now, self.merge_window);
        let value = command.execute(&mut self.workspace, &mut ctx)?;
        let (changes, events) = ctx.into_parts();

        let mut report = SyncReport::default();
        if changes.inventory {
            report.merge(self.sync.inventory_changed(&self.workspace.mirror).await?);
        }
        if !changes.log_writes.is_empty() {
            report.merge(
                self.sync
                    .logs_changed(&self.workspace.logs, changes.log_writes)
                    .await?,
            );
        }
        for event in events {
            self.emit(event).await;
        }
        Ok(Applied { value, sync: report })
    }

    async fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            if let Err(err) = events.send(event).await {
                debug!("event dropped: {}", err);
            }
        }
    }

    pub async fn subscribe(&self) -> Result<RemoteFeeds, ServiceError> {
        self.sync.subscribe().await
    }

    /// Applies one whole-resource remote value. Malformed values are skipped,
    /// never returned as errors.
    pub async fn apply_remote(&mut self, update: RemoteUpdate) -> Result<RemoteOutcome, ServiceError> {
        match update {
            RemoteUpdate::Inventory(value) => match self.sync.receive_inventory(value).await {
                RemoteDecision::Apply(mirror) => {
                    self.workspace.mirror = mirror;
                    self.sync.inventory_changed(&self.workspace.mirror).await?;
                    Ok(RemoteOutcome::Applied)
                }
                RemoteDecision::Ignore => Ok(RemoteOutcome::Ignored),
                RemoteDecision::Skip(reason) => Ok(RemoteOutcome::Skipped(reason)),
            },
            RemoteUpdate::Logs(value) => match self.sync.receive_logs(value).await {
                RemoteDecision::Apply(logs) => {
                    self.workspace.logs = logs;
                    self.sync
                        .logs_changed(&self.workspace.logs, Vec::new())
                        .await?;
                    Ok(RemoteOutcome::Applied)
                }
                RemoteDecision::Ignore => Ok(RemoteOutcome::Ignored),
                RemoteDecision::Skip(reason) => Ok(RemoteOutcome::Skipped(reason)),
            },
        }
    }

    /// Brings the workspace up to the current remote state. Run before a
    /// mutation when no subscription has delivered yet, so the whole-resource
    /// push starts from the shared tree rather than the offline copy.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<Vec<RemoteOutcome>, ServiceError> {
        let updates = self.sync.fetch_remote().await?;
        let mut outcomes = Vec::with_capacity(updates.len());
        for update in updates {
            outcomes.push(self.apply_remote(update).await?);
        }
        Ok(outcomes)
    }

    /// Waits for the next remote notification and applies it. `None` once
    /// both subscriptions have closed.
    pub async fn sync_next(&mut self, feeds: &mut RemoteFeeds) -> Option<Result<RemoteOutcome, ServiceError>> {
        let update = feeds.next().await?;
        Some(self.apply_remote(update).await)
    }

    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        search::search(&self.workspace.mirror, query)
    }

    pub fn export(&self) -> InventorySnapshot {
        export::inventory_rows(&self.workspace.mirror)
    }

    pub fn export_logs(&self) -> Vec<LogRow> {
        export::log_rows(&self.workspace.logs)
    }

    pub fn filter_logs(&self, filter: &LogFilter) -> Vec<&LogEntry> {
        self.workspace.logs.filter(filter)
    }
}
