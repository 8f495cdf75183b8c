use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::{find_invalid_key, set_at_path, split_path, RemoteError, RemoteSubscription, RemoteTree};

/// Remote tree on Redis: each resource is a JSON string at
/// `<namespace>:<resource>`, and every write publishes the new whole value on
/// a channel of the same name.
///
/// Field writes read, modify and store the resource without a transaction;
/// concurrent field writes from two clients may lose one of them.
#[derive(Clone)]
pub struct RedisRemoteTree {
    client: redis::Client,
    namespace: String,
}

impl RedisRemoteTree {
    pub fn new(redis_url: &str, namespace: &str) -> Result<Self, RemoteError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            namespace: namespace.to_string(),
        })
    }

    fn key(&self, resource: &str) -> String {
        format!("{}:{}", self.namespace, resource)
    }

    async fn load(&self, resource: &str) -> Result<Option<Value>, RemoteError> {
        let mut conn = self.client.get_async_connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.key(resource))
            .query_async(&mut conn)
            .await?;
        raw.map(|s| serde_json::from_str::<Value>(&s)).transpose().map_err(Into::into)
    }

    async fn store(&self, resource: &str, value: &Value) -> Result<(), RemoteError> {
        let key = self.key(resource);
        let payload = serde_json::to_string(value)?;
        let mut conn = self.client.get_async_connection().await?;
        let _: () = redis::cmd("SET")
            .arg(&key)
            .arg(&payload)
            .query_async(&mut conn)
            .await?;
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(&key)
            .arg(&payload)
            .query_async(&mut conn)
            .await?;
        debug!(key = %key, receivers, "published resource");
        Ok(())
    }
}

#[async_trait]
impl RemoteTree for RedisRemoteTree {
    async fn subscribe(&self, resource: &str) -> Result<RemoteSubscription, RemoteError> {
        let (resource, fields) = split_path(resource)?;
        if !fields.is_empty() {
            return Err(RemoteError::InvalidPath(resource.to_string()));
        }
        let channel = self.key(resource);
        let mut pubsub = self.client.get_async_connection().await?.into_pubsub();
        pubsub.subscribe(&channel).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(current) = self.load(resource).await? {
            let _ = tx.send(current);
        }

        tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(channel = %channel, error = %err, "unreadable pubsub payload");
                        continue;
                    }
                };
                let value = match serde_json::from_str::<Value>(&payload) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(channel = %channel, error = %err, "pubsub payload is not JSON");
                        continue;
                    }
                };
                if tx.send(value).is_err() {
                    break;
                }
            }
            error!(channel = %channel, "remote subscription ended");
        });

        Ok(RemoteSubscription::new(resource, rx))
    }

    async fn get(&self, resource: &str) -> Result<Option<Value>, RemoteError> {
        let (name, fields) = split_path(resource)?;
        if !fields.is_empty() {
            return Err(RemoteError::InvalidPath(resource.to_string()));
        }
        self.load(name).await
    }

    async fn write_whole(&self, resource: &str, value: Value) -> Result<(), RemoteError> {
        let (name, fields) = split_path(resource)?;
        if !fields.is_empty() {
            return Err(RemoteError::InvalidPath(resource.to_string()));
        }
        if let Some(bad) = find_invalid_key(&value, resource) {
            return Err(RemoteError::InvalidKey(bad));
        }
        self.store(name, &value).await
    }

    async fn write_field(&self, path: &str, value: Value) -> Result<(), RemoteError> {
        let (resource, fields) = split_path(path)?;
        if fields.is_empty() {
            return Err(RemoteError::InvalidPath(path.to_string()));
        }
        if let Some(bad) = find_invalid_key(&value, path) {
            return Err(RemoteError::InvalidKey(bad));
        }
        let mut root = self
            .load(resource)
            .await?
            .unwrap_or_else(|| Value::Object(Default::default()));
        set_at_path(&mut root, &fields, value);
        self.store(resource, &root).await
    }
}
