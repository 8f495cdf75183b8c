//! The shared remote tree: a synchronized key-value tree with whole-resource
//! subscriptions and path writes.
//!
//! Keys must be non-empty and must not contain any of `. # $ / [ ]`. Paths
//! are `/`-separated keys whose first segment names the resource.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::AppConfig;

pub mod memory;
pub mod redis_tree;

pub use memory::InMemoryRemoteTree;
pub use redis_tree::RedisRemoteTree;

pub const FORBIDDEN_KEY_CHARS: [char; 6] = ['.', '#', '$', '/', '[', ']'];

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid key at {0}")]
    InvalidKey(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Remote store rejected the write: {0}")]
    Rejected(String),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Remote store state unavailable")]
    Unavailable,
}

pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(&FORBIDDEN_KEY_CHARS[..])
}

/// Splits a path into its resource and the remaining field segments.
pub fn split_path(path: &str) -> Result<(&str, Vec<&str>), RemoteError> {
    let mut segments = path.split('/');
    let resource = segments.next().unwrap_or_default();
    let rest: Vec<&str> = segments.collect();
    if !is_valid_key(resource) || rest.iter().any(|s| !is_valid_key(s)) {
        return Err(RemoteError::InvalidPath(path.to_string()));
    }
    Ok((resource, rest))
}

/// First object key in `value` the remote store would refuse, as a path.
pub fn find_invalid_key(value: &Value, prefix: &str) -> Option<String> {
    match value {
        Value::Object(map) => map.iter().find_map(|(key, child)| {
            let path = format!("{}/{}", prefix, key);
            if is_valid_key(key) {
                find_invalid_key(child, &path)
            } else {
                Some(path)
            }
        }),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, child)| find_invalid_key(child, &format!("{}/{}", prefix, i))),
        _ => None,
    }
}

/// Replaces a non-object node with an object. Array entries stay under
/// their index as key; null entries are dropped.
fn ensure_object(node: &mut Value) {
    let map = match std::mem::take(node) {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(i, item)| (i.to_string(), item))
            .collect(),
        _ => Map::new(),
    };
    *node = Value::Object(map);
}

/// Writes `value` at `segments` below `root`; null removes the field.
pub(crate) fn set_at_path(root: &mut Value, segments: &[&str], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };
    let mut node = root;
    for segment in parents {
        ensure_object(node);
        node = match node {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            _ => return,
        };
    }
    ensure_object(node);
    if let Value::Object(map) = node {
        if value.is_null() {
            map.remove(*last);
        } else {
            map.insert(last.to_string(), value);
        }
    }
}

/// Stream of whole-resource values for one subscribed resource.
#[derive(Debug)]
pub struct RemoteSubscription {
    resource: String,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl RemoteSubscription {
    pub fn new(resource: impl Into<String>, rx: mpsc::UnboundedReceiver<Value>) -> Self {
        Self {
            resource: resource.into(),
            rx,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait RemoteTree: Send + Sync {
    /// Subscribes to a resource. The current value, when one exists, is
    /// delivered first; every later change delivers the whole new value.
    async fn subscribe(&self, resource: &str) -> Result<RemoteSubscription, RemoteError>;

    /// Current value of a resource, `None` if it was never written.
    async fn get(&self, resource: &str) -> Result<Option<Value>, RemoteError>;

    /// Replaces a whole resource.
    async fn write_whole(&self, resource: &str, value: Value) -> Result<(), RemoteError>;

    /// Sets one field below a resource, e.g. `logs/<id>`. Null deletes it.
    async fn write_field(&self, path: &str, value: Value) -> Result<(), RemoteError>;
}

/// Builds the configured remote backend.
pub fn build_remote(config: &AppConfig) -> Result<Arc<dyn RemoteTree>, RemoteError> {
    if config.uses_redis() {
        Ok(Arc::new(RedisRemoteTree::new(
            &config.redis_url,
            &config.remote_namespace,
        )?))
    } else {
        Ok(Arc::new(InMemoryRemoteTree::new()))
    }
}
