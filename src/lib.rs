//! Club inventory sync library
//!
//! A fixed category schema, a per-location stock mirror kept in step with a
//! remote synchronized tree, a coalescing change log and a bulk importer.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod cache;
pub mod clock;
pub mod commands;
pub mod config;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod models;
pub mod remote;
pub mod schema;
pub mod services;
pub mod session;

use std::sync::Arc;

use crate::cache::build_local_store;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::remote::RemoteTree;
use crate::services::inventory::InventoryService;
use crate::services::inventory_sync::{RemotePaths, SyncEngine};

/// Wires a service from configuration around an already built remote tree
/// and catches it up with the current remote state.
pub async fn build_service(
    config: &AppConfig,
    remote: Arc<dyn RemoteTree>,
    clock: Arc<dyn Clock>,
    events: Option<EventSender>,
) -> Result<InventoryService, ServiceError> {
    let store = build_local_store(config.local_store_dir.as_deref());
    let paths = RemotePaths {
        inventory: config.inventory_path.clone(),
        logs: config.logs_path.clone(),
    };
    let sync = SyncEngine::new(remote, store, paths, events.clone());
    let mut service = InventoryService::start(sync, clock, config.merge_window(), events).await?;
    service.set_idle_timeout(config.idle_timeout());
    service.refresh().await?;
    Ok(service)
}

pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::commands::inventory::{
        AddItemCommand, AdjustQuantityCommand, DeleteItemCommand, EditNoteCommand,
        ImportRowsCommand, RenameItemCommand,
    };
    pub use crate::commands::logs::{DeleteLogEntryCommand, EditLogMemoCommand};
    pub use crate::commands::Command;
    pub use crate::errors::ServiceError;
    pub use crate::models::{InventoryMirror, ItemRecord, LeafAddress, LogEntry, Operator, Workspace};
    pub use crate::services::import::{ImportMode, ImportSummary};
    pub use crate::services::inventory::{Applied, InventoryService};
    pub use crate::services::inventory_sync::{RemoteOutcome, RemoteUpdate};
    pub use crate::session::{Role, Session};
}
