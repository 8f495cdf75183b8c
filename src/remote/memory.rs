use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

use super::{find_invalid_key, set_at_path, split_path, RemoteError, RemoteSubscription, RemoteTree};

#[derive(Debug, Default)]
struct TreeState {
    resources: HashMap<String, Value>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Value>>>,
    written_paths: Vec<String>,
    reject_writes: bool,
}

/// Process-local remote tree. Clones share the same state, so several
/// clients in one process see each other's writes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRemoteTree {
    state: Arc<Mutex<TreeState>>,
}

impl InMemoryRemoteTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, TreeState>, RemoteError> {
        self.state.lock().map_err(|_| RemoteError::Unavailable)
    }

    /// Current value of a resource.
    pub fn snapshot(&self, resource: &str) -> Option<Value> {
        self.lock().ok()?.resources.get(resource).cloned()
    }

    /// Sets a resource as if another client wrote it. Not counted as a write.
    pub fn seed(&self, resource: &str, value: Value) -> Result<(), RemoteError> {
        let mut state = self.lock()?;
        state.resources.insert(resource.to_string(), value);
        notify(&mut state, resource);
        Ok(())
    }

    /// Paths written through [`RemoteTree`] calls, in order.
    pub fn written_paths(&self) -> Vec<String> {
        self.lock().map(|s| s.written_paths.clone()).unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.lock().map(|s| s.written_paths.len()).unwrap_or_default()
    }

    /// Makes every following write fail, like a permission error would.
    pub fn reject_writes(&self, reject: bool) {
        if let Ok(mut state) = self.lock() {
            state.reject_writes = reject;
        }
    }

    fn apply(&self, path: &str, value: Value, whole: bool) -> Result<(), RemoteError> {
        let (resource, fields) = split_path(path)?;
        if whole != fields.is_empty() {
            return Err(RemoteError::InvalidPath(path.to_string()));
        }
        if let Some(bad) = find_invalid_key(&value, path) {
            return Err(RemoteError::InvalidKey(bad));
        }

        let mut state = self.lock()?;
        if state.reject_writes {
            return Err(RemoteError::Rejected(format!("permission denied at {}", path)));
        }
        state.written_paths.push(path.to_string());
        if whole && value.is_null() {
            state.resources.remove(resource);
        } else {
            let root = state
                .resources
                .entry(resource.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
            set_at_path(root, &fields, value);
        }
        debug!(path, "remote write applied");
        notify(&mut state, resource);
        Ok(())
    }
}

fn notify(state: &mut TreeState, resource: &str) {
    let Some(value) = state.resources.get(resource).cloned() else {
        return;
    };
    if let Some(subscribers) = state.subscribers.get_mut(resource) {
        subscribers.retain(|tx| tx.send(value.clone()).is_ok());
    }
}

#[async_trait]
impl RemoteTree for InMemoryRemoteTree {
    async fn subscribe(&self, resource: &str) -> Result<RemoteSubscription, RemoteError> {
        let (resource, fields) = split_path(resource)?;
        if !fields.is_empty() {
            return Err(RemoteError::InvalidPath(resource.to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock()?;
        if let Some(current) = state.resources.get(resource) {
            let _ = tx.send(current.clone());
        }
        state
            .subscribers
            .entry(resource.to_string())
            .or_default()
            .push(tx);
        Ok(RemoteSubscription::new(resource, rx))
    }

    async fn get(&self, resource: &str) -> Result<Option<Value>, RemoteError> {
        let (name, fields) = split_path(resource)?;
        if !fields.is_empty() {
            return Err(RemoteError::InvalidPath(resource.to_string()));
        }
        Ok(self.lock()?.resources.get(name).cloned())
    }

    async fn write_whole(&self, resource: &str, value: Value) -> Result<(), RemoteError> {
        self.apply(resource, value, true)
    }

    async fn write_field(&self, path: &str, value: Value) -> Result<(), RemoteError> {
        self.apply(path, value, false)
    }
}
