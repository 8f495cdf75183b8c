//! Bridge between the local workspace and the remote tree.
//!
//! Remote notifications carry whole resources. A notification whose content
//! fingerprint equals the local one is an echo and is ignored. Otherwise the
//! engine raises a per-resource "applying remote" flag before the caller
//! swaps in the new state; the next change hook for that resource consumes
//! the flag, persists locally and skips the outbound write. Every other
//! change is a local mutation: sanitized, persisted and queued upstream.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{LocalStore, INVENTORY_KEY, LOGS_KEY};
use crate::errors::ServiceError;
use crate::events::outbox::{OutboundWrite, Outbox, WriteTicket};
use crate::events::{Event, EventSender};
use crate::metrics::{REMOTE_UPDATES, SANITIZED_KEYS};
use crate::models::{InventoryMirror, Workspace};
use crate::remote::{is_valid_key, RemoteError, RemoteSubscription, RemoteTree};
use crate::services::log_book::{LogBook, LogWrite};

const SANITIZE_LOG_LIMIT: usize = 20;
const IN_FLIGHT_LIMIT: usize = 32;

/// Remote resource names for the two synchronized resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePaths {
    pub inventory: String,
    pub logs: String,
}

impl Default for RemotePaths {
    fn default() -> Self {
        Self {
            inventory: "inventory".to_string(),
            logs: "logs".to_string(),
        }
    }
}

/// SHA-256 over the compact JSON encoding. `serde_json` objects keep keys
/// sorted, so equal trees always encode identically.
pub fn fingerprint(value: &Value) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sanitized {
    pub value: Value,
    /// Paths of keys dropped for being empty or containing `. # $ / [ ]`.
    pub removed: Vec<String>,
    /// Paths of branches or leaves replaced because of a wrong shape.
    pub coerced: Vec<String>,
}

fn display_key(key: &str) -> &str {
    if key.is_empty() {
        "(empty)"
    } else {
        key
    }
}

fn child_path(parent: &str, key: &str) -> String {
    format!("{}/{}", parent, display_key(key))
}

/// Drops invalid keys anywhere below `value`.
fn strip_keys(value: Value, path: &str, removed: &mut Vec<String>) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter_map(|(key, child)| {
                    let child_path = child_path(path, &key);
                    if is_valid_key(&key) {
                        Some((key, strip_keys(child, &child_path, removed)))
                    } else {
                        removed.push(child_path);
                        None
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, child)| strip_keys(child, &format!("{}/{}", path, i), removed))
                .collect(),
        ),
        other => other,
    }
}

/// Walks `value` as an inventory tree, keeping only valid keys and forcing
/// each branch level to an object and each leaf to a list.
fn sanitize_level(value: &Value, path: &str, depth: usize, out: &mut Sanitized) -> Value {
    // depth 0: root, 1: location, 2: category, 3: subcategory, 4: subcategory2
    let leaf_expected = depth == 4;
    match value {
        Value::Array(_) if depth >= 3 => strip_keys(value.clone(), path, &mut out.removed),
        Value::Object(map) if !leaf_expected => {
            let mut clean = Map::new();
            for (key, child) in map {
                let child_path = child_path(path, key);
                if !is_valid_key(key) {
                    out.removed.push(child_path);
                    continue;
                }
                clean.insert(key.clone(), sanitize_level(child, &child_path, depth + 1, out));
            }
            Value::Object(clean)
        }
        _ => {
            out.coerced.push(path.to_string());
            if depth >= 3 {
                Value::Array(Vec::new())
            } else {
                Value::Object(Map::new())
            }
        }
    }
}

/// Makes an inventory value safe to write to the remote tree.
pub fn sanitize_inventory(value: &Value, resource: &str) -> Sanitized {
    let mut out = Sanitized::default();
    let clean = sanitize_level(value, resource, 0, &mut out);
    out.value = clean;
    out
}

fn log_removed(resource: &str, removed: &[String]) {
    let shown: Vec<&str> = removed
        .iter()
        .take(SANITIZE_LOG_LIMIT)
        .map(String::as_str)
        .collect();
    let overflow = removed.len().saturating_sub(SANITIZE_LOG_LIMIT);
    if overflow > 0 {
        warn!(resource, removed = ?shown, "removed invalid keys (+{})", overflow);
    } else {
        warn!(resource, removed = ?shown, "removed invalid keys");
    }
}

/// Whole-resource value delivered by a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteUpdate {
    Inventory(Value),
    Logs(Value),
}

impl RemoteUpdate {
    pub fn resource(&self) -> &'static str {
        match self {
            RemoteUpdate::Inventory(_) => "inventory",
            RemoteUpdate::Logs(_) => "logs",
        }
    }
}

/// What happened to one remote notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    Applied,
    /// Equal to local state.
    Ignored,
    /// Unreadable; local state untouched.
    Skipped(String),
}

/// Decision on a remote value before it touches local state.
#[derive(Debug)]
pub enum RemoteDecision<T> {
    Apply(T),
    Ignore,
    Skip(String),
}

/// Both subscriptions, polled together.
#[derive(Debug)]
pub struct RemoteFeeds {
    inventory: RemoteSubscription,
    logs: RemoteSubscription,
}

impl RemoteFeeds {
    /// Next notification from either resource; `None` once both are closed.
    pub async fn next(&mut self) -> Option<RemoteUpdate> {
        tokio::select! {
            Some(value) = self.inventory.recv() => Some(RemoteUpdate::Inventory(value)),
            Some(value) = self.logs.recv() => Some(RemoteUpdate::Logs(value)),
            else => None,
        }
    }
}

/// Outcome of pushing one local change.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub removed_keys: Vec<String>,
    pub tickets: Vec<WriteTicket>,
    /// Change came from a remote apply; nothing was sent upstream.
    pub suppressed: bool,
}

impl SyncReport {
    pub fn merge(&mut self, other: SyncReport) {
        self.removed_keys.extend(other.removed_keys);
        self.tickets.extend(other.tickets);
        self.suppressed |= other.suppressed;
    }

    /// Waits for every queued write; the first failure wins.
    pub async fn wait(self) -> Result<(), ServiceError> {
        let mut first_error = None;
        for ticket in self.tickets {
            if let Err(err) = ticket.wait().await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[derive(Debug, Default)]
struct ResourceState {
    fingerprint: Option<String>,
    applying_remote: bool,
    /// Fingerprints of values this client sent and has not yet seen echoed.
    in_flight: VecDeque<String>,
}

impl ResourceState {
    fn take_applying(&mut self) -> bool {
        std::mem::take(&mut self.applying_remote)
    }

    fn sent(&mut self, fingerprint: String) {
        if self.in_flight.len() == IN_FLIGHT_LIMIT {
            self.in_flight.pop_front();
        }
        self.in_flight.push_back(fingerprint);
    }

    /// Classifies an incoming fingerprint. An echo of an older local write
    /// retires it and everything sent before it.
    fn is_echo(&mut self, incoming: &str) -> bool {
        if self.fingerprint.as_deref() == Some(incoming) {
            self.in_flight.clear();
            return true;
        }
        match self.in_flight.iter().position(|f| f == incoming) {
            Some(pos) => {
                self.in_flight.drain(..=pos);
                true
            }
            None => false,
        }
    }
}

pub struct SyncEngine {
    remote: Arc<dyn RemoteTree>,
    store: Arc<dyn LocalStore>,
    outbox: Outbox,
    paths: RemotePaths,
    events: Option<EventSender>,
    inventory: ResourceState,
    logs: ResourceState,
}

impl SyncEngine {
    /// Starts the outbound writer, so this needs a running Tokio runtime.
    pub fn new(
        remote: Arc<dyn RemoteTree>,
        store: Arc<dyn LocalStore>,
        paths: RemotePaths,
        events: Option<EventSender>,
    ) -> Self {
        let outbox = Outbox::start(remote.clone(), events.clone());
        Self {
            remote,
            store,
            outbox,
            paths,
            events,
            inventory: ResourceState::default(),
            logs: ResourceState::default(),
        }
    }

    pub fn paths(&self) -> &RemotePaths {
        &self.paths
    }

    async fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            if let Err(err) = events.send(event).await {
                debug!("event dropped: {}", err);
            }
        }
    }

    /// Reads the offline copy. Missing or unreadable data falls back to an
    /// empty schema-shaped mirror and an empty log book.
    pub async fn load_local(&mut self) -> Result<Workspace, ServiceError> {
        let mirror = match self.store.get(INVENTORY_KEY).await? {
            Some(raw) => match serde_json::from_str::<Value>(&raw)
                .map_err(ServiceError::from)
                .and_then(|v| {
                    let clean = sanitize_inventory(&v, &self.paths.inventory);
                    InventoryMirror::from_value(clean.value).map_err(ServiceError::from)
                }) {
                Ok(mirror) => mirror,
                Err(err) => {
                    warn!(error = %err, "local inventory copy unreadable; starting from schema");
                    InventoryMirror::from_schema()
                }
            },
            None => InventoryMirror::from_schema(),
        };

        let logs = match self.store.get(LOGS_KEY).await? {
            Some(raw) => match serde_json::from_str::<Value>(&raw)
                .map_err(ServiceError::from)
                .and_then(LogBook::from_value)
            {
                Ok((logs, _)) => logs,
                Err(err) => {
                    warn!(error = %err, "local log copy unreadable; starting empty");
                    LogBook::default()
                }
            },
            None => LogBook::default(),
        };

        self.inventory.fingerprint = Some(fingerprint(&mirror.to_value()?));
        self.logs.fingerprint = Some(fingerprint(&logs.to_value()?));
        info!(items = mirror.item_count(), logs = logs.len(), "local state loaded");
        Ok(Workspace::new(mirror, logs))
    }

    pub async fn subscribe(&self) -> Result<RemoteFeeds, ServiceError> {
        let inventory = self
            .remote
            .subscribe(&self.paths.inventory)
            .await
            .map_err(|e| ServiceError::InternalError(format!("subscribe failed: {}", e)))?;
        let logs = self
            .remote
            .subscribe(&self.paths.logs)
            .await
            .map_err(|e| ServiceError::InternalError(format!("subscribe failed: {}", e)))?;
        info!(inventory = %self.paths.inventory, logs = %self.paths.logs, "subscribed to remote");
        Ok(RemoteFeeds { inventory, logs })
    }

    /// Reads the current remote value of both resources. Resources never
    /// written are left out.
    pub async fn fetch_remote(&self) -> Result<Vec<RemoteUpdate>, ServiceError> {
        let read_failed = |e: RemoteError| ServiceError::InternalError(format!("remote read failed: {}", e));
        let mut updates = Vec::with_capacity(2);
        if let Some(value) = self.remote.get(&self.paths.inventory).await.map_err(read_failed)? {
            updates.push(RemoteUpdate::Inventory(value));
        }
        if let Some(value) = self.remote.get(&self.paths.logs).await.map_err(read_failed)? {
            updates.push(RemoteUpdate::Logs(value));
        }
        Ok(updates)
    }

    /// Classifies a remote inventory value. On `Apply` the flag is raised and
    /// the caller must replace its mirror and call [`Self::inventory_changed`].
    pub async fn receive_inventory(&mut self, value: Value) -> RemoteDecision<InventoryMirror> {
        let resource = self.paths.inventory.clone();
        if !value.is_object() {
            return self
                .skip(&resource, "inventory", "inventory root is not an object".to_string())
                .await;
        }
        let clean = sanitize_inventory(&value, &resource);
        if !clean.coerced.is_empty() {
            warn!(resource = %resource, coerced = ?clean.coerced, "coerced mis-shaped remote branches");
        }
        let parsed = InventoryMirror::from_value(clean.value)
            .and_then(|mirror| mirror.to_value().map(|v| (mirror, v)));
        let (mirror, canonical) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => return self.skip(&resource, "inventory", err.to_string()).await,
        };
        if self.inventory.is_echo(&fingerprint(&canonical)) {
            REMOTE_UPDATES.with_label_values(&["inventory", "ignored"]).inc();
            debug!("remote inventory is an echo; ignored");
            return RemoteDecision::Ignore;
        }
        self.inventory.applying_remote = true;
        REMOTE_UPDATES.with_label_values(&["inventory", "applied"]).inc();
        self.emit(Event::RemoteUpdateApplied { resource }).await;
        RemoteDecision::Apply(mirror)
    }

    /// Log counterpart of [`Self::receive_inventory`].
    pub async fn receive_logs(&mut self, value: Value) -> RemoteDecision<LogBook> {
        let resource = self.paths.logs.clone();
        let (logs, skipped) = match LogBook::from_value(value) {
            Ok(parsed) => parsed,
            Err(err) => return self.skip(&resource, "logs", err.to_string()).await,
        };
        if !skipped.is_empty() {
            warn!(resource = %resource, skipped = ?skipped, "dropped unreadable log records");
        }
        let canonical = match logs.to_value() {
            Ok(v) => v,
            Err(err) => return self.skip(&resource, "logs", err.to_string()).await,
        };
        if self.logs.is_echo(&fingerprint(&canonical)) {
            REMOTE_UPDATES.with_label_values(&["logs", "ignored"]).inc();
            debug!("remote logs are an echo; ignored");
            return RemoteDecision::Ignore;
        }
        self.logs.applying_remote = true;
        REMOTE_UPDATES.with_label_values(&["logs", "applied"]).inc();
        self.emit(Event::RemoteUpdateApplied { resource }).await;
        RemoteDecision::Apply(logs)
    }

    async fn skip<T>(&self, resource: &str, label: &str, reason: String) -> RemoteDecision<T> {
        REMOTE_UPDATES.with_label_values(&[label, "skipped"]).inc();
        warn!(resource, reason = %reason, "skipping malformed remote update");
        self.emit(Event::RemoteUpdateSkipped {
            resource: resource.to_string(),
            reason: reason.clone(),
        })
        .await;
        RemoteDecision::Skip(reason)
    }

    async fn persist(&self, key: &str, value: &Value) {
        let result = match serde_json::to_string(value) {
            Ok(raw) => self.store.set(key, &raw).await.map_err(ServiceError::from),
            Err(err) => Err(err.into()),
        };
        if let Err(err) = result {
            error!(key, error = %err, "failed to write local copy");
        }
    }

    /// Change hook for the mirror.
    #[instrument(skip_all)]
    pub async fn inventory_changed(&mut self, mirror: &InventoryMirror) -> Result<SyncReport, ServiceError> {
        let value = mirror.to_value()?;
        self.inventory.fingerprint = Some(fingerprint(&value));
        let clean = sanitize_inventory(&value, &self.paths.inventory);
        self.persist(INVENTORY_KEY, &clean.value).await;

        if self.inventory.take_applying() {
            debug!("inventory change came from remote; not echoing");
            return Ok(SyncReport {
                suppressed: true,
                ..SyncReport::default()
            });
        }

        if !clean.removed.is_empty() {
            SANITIZED_KEYS.inc_by(clean.removed.len() as u64);
            log_removed(&self.paths.inventory, &clean.removed);
            self.emit(Event::KeysSanitized {
                resource: self.paths.inventory.clone(),
                removed: clean.removed.clone(),
            })
            .await;
        }

        self.inventory.sent(fingerprint(&clean.value));
        let ticket = self.outbox.enqueue(OutboundWrite::Whole {
            resource: self.paths.inventory.clone(),
            value: clean.value,
        });
        Ok(SyncReport {
            removed_keys: clean.removed,
            tickets: vec![ticket],
            suppressed: false,
        })
    }

    /// Change hook for the log book. Local changes go upstream as one field
    /// write per touched record.
    #[instrument(skip_all, fields(writes = writes.len()))]
    pub async fn logs_changed(&mut self, logs: &LogBook, writes: Vec<LogWrite>) -> Result<SyncReport, ServiceError> {
        let value = logs.to_value()?;
        let current = fingerprint(&value);
        self.logs.fingerprint = Some(current.clone());
        self.persist(LOGS_KEY, &value).await;

        if self.logs.take_applying() {
            debug!("log change came from remote; not echoing");
            return Ok(SyncReport {
                suppressed: true,
                ..SyncReport::default()
            });
        }

        if !writes.is_empty() {
            self.logs.sent(current);
        }
        let mut tickets = Vec::with_capacity(writes.len());
        for write in writes {
            let path = format!("{}/{}", self.paths.logs, write.id());
            let value = match write {
                LogWrite::Upsert(entry) => serde_json::to_value(&entry)?,
                LogWrite::Remove(_) => Value::Null,
            };
            tickets.push(self.outbox.enqueue(OutboundWrite::Field { path, value }));
        }
        Ok(SyncReport {
            tickets,
            ..SyncReport::default()
        })
    }
}
