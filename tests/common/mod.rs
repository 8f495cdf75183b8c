#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use inventory_sync::{
    cache::{InMemoryLocalStore, LocalStore},
    clock::{Clock, ManualClock},
    commands::Command,
    models::{ItemRecord, LeafAddress},
    remote::InMemoryRemoteTree,
    services::{
        inventory::InventoryService,
        inventory_sync::{RemoteFeeds, RemoteOutcome, RemotePaths, SyncEngine},
    },
    session::{Role, Session},
};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

pub fn repair(location: &str) -> LeafAddress {
    LeafAddress::new(location, "Tools", "Repair")
}

pub fn new_propellers(location: &str) -> LeafAddress {
    LeafAddress::new(location, "Consumables", "Propellers").with_subcategory2("New")
}

/// One client process: its own service, clock, store and session, talking
/// to a shared in-memory remote tree.
pub struct TestClient {
    pub service: InventoryService,
    pub session: Session,
    pub clock: Arc<ManualClock>,
    pub remote: InMemoryRemoteTree,
    feeds: Option<RemoteFeeds>,
}

impl TestClient {
    pub async fn new(remote: &InMemoryRemoteTree) -> Self {
        Self::with_store(remote, Arc::new(InMemoryLocalStore::new())).await
    }

    pub async fn with_store(remote: &InMemoryRemoteTree, store: Arc<dyn LocalStore>) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let sync = SyncEngine::new(Arc::new(remote.clone()), store, RemotePaths::default(), None);
        let service = InventoryService::start(
            sync,
            clock.clone() as Arc<dyn Clock>,
            chrono::Duration::hours(1),
            None,
        )
        .await
        .expect("service starts");
        let session = Session::login("u-1", "Kim", Role::Editor, clock.now());
        Self {
            service,
            session,
            clock,
            remote: remote.clone(),
            feeds: None,
        }
    }

    /// Runs a command and waits until its remote writes have landed.
    pub async fn run<C: Command>(&mut self, command: C) -> C::Result {
        let applied = self
            .service
            .execute(&mut self.session, &command)
            .await
            .expect("command succeeds");
        applied.sync.wait().await.expect("remote write succeeds");
        applied.value
    }

    pub fn advance(&self, minutes: i64) {
        self.clock.advance(chrono::Duration::minutes(minutes));
    }

    pub fn items(&self, address: &LeafAddress) -> Vec<ItemRecord> {
        self.service.mirror().items(address).to_vec()
    }

    pub async fn subscribe(&mut self) {
        self.feeds = Some(self.service.subscribe().await.expect("subscribe"));
    }

    /// Applies the next pending remote notification.
    pub async fn pump(&mut self) -> Option<RemoteOutcome> {
        let feeds = self.feeds.as_mut().expect("subscribed");
        let next = tokio::time::timeout(Duration::from_millis(500), self.service.sync_next(feeds)).await;
        match next {
            Ok(Some(result)) => Some(result.expect("remote update handled")),
            _ => None,
        }
    }

    /// Applies every notification that is already queued.
    pub async fn drain(&mut self) -> Vec<RemoteOutcome> {
        let feeds = self.feeds.as_mut().expect("subscribed");
        let mut outcomes = Vec::new();
        while let Ok(Some(result)) =
            tokio::time::timeout(Duration::from_millis(50), self.service.sync_next(feeds)).await
        {
            outcomes.push(result.expect("remote update handled"));
        }
        outcomes
    }
}
