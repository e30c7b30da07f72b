/// Redis-backed store shared by every connected client
///
/// # Layout
///
/// ```text
/// {prefix}:users             HASH  id -> User JSON
/// {prefix}:groups            HASH  id -> Group JSON
/// {prefix}:tasks             HASH  id -> Task JSON
/// {prefix}:config            STRING SystemConfig JSON
/// {prefix}:changes:{name}    PUB/SUB channel, payload = changed id
/// ```
///
/// Every write is a `MULTI` pipeline of the data change plus a `PUBLISH`, so
/// no subscriber can miss a change that was committed. Each subscription
/// owns one pub/sub connection; on every message it re-reads the whole hash
/// and hands the snapshot to its callback. Messages carry no data, so a
/// burst of writes may coalesce into fewer, later snapshots.
///
/// Concurrent writers to the same document race; whichever `HSET` lands
/// last is what everyone converges on.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::marker::PhantomData;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use super::{
    CollectionStore, ConfigCallback, ConfigStore, SnapshotCallback, Store, StoreError,
    StoreResult, Subscription,
};
use crate::models::{sort_snapshot, Entity, Group, SystemConfig, Task, User};
use crate::redis::RedisClient;

const CONFIG_KEY: &str = "config";

/// All collections under one key prefix
pub struct SharedStore {
    users: SharedCollection<User>,
    groups: SharedCollection<Group>,
    tasks: SharedCollection<Task>,
    config: SharedConfig,
}

impl SharedStore {
    /// Creates the store; no I/O happens until the first call
    pub fn new(client: RedisClient, prefix: &str) -> Self {
        SharedStore {
            users: SharedCollection::new(client.clone(), prefix),
            groups: SharedCollection::new(client.clone(), prefix),
            tasks: SharedCollection::new(client.clone(), prefix),
            config: SharedConfig::new(client, prefix),
        }
    }

    /// Type-erased bundle for the sync layer
    pub fn into_store(self) -> Store {
        Store {
            users: std::sync::Arc::new(self.users),
            groups: std::sync::Arc::new(self.groups),
            tasks: std::sync::Arc::new(self.tasks),
            config: std::sync::Arc::new(self.config),
        }
    }
}

/// Channel announcing changes to one collection
fn changes_channel(prefix: &str, collection: &str) -> String {
    format!("{}:changes:{}", prefix, collection)
}

/// One collection stored as a Redis hash
pub struct SharedCollection<T: Entity> {
    client: RedisClient,
    key: String,
    channel: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for SharedCollection<T> {
    fn clone(&self) -> Self {
        SharedCollection {
            client: self.client.clone(),
            key: self.key.clone(),
            channel: self.channel.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> SharedCollection<T> {
    pub fn new(client: RedisClient, prefix: &str) -> Self {
        SharedCollection {
            client,
            key: format!("{}:{}", prefix, T::COLLECTION),
            channel: changes_channel(prefix, T::COLLECTION),
            _entity: PhantomData,
        }
    }

    /// Reads the whole hash in canonical order
    ///
    /// Documents that fail to parse are skipped with a warning so one bad
    /// entry cannot hide the rest of the collection.
    pub async fn load(&self) -> StoreResult<Vec<T>> {
        let mut conn = self.client.get_connection();
        let raw: HashMap<String, String> = conn
            .hgetall(&self.key)
            .await
            .map_err(|e| StoreError::read(T::COLLECTION, e))?;

        let mut items: Vec<T> = raw
            .into_iter()
            .filter_map(|(id, json)| match serde_json::from_str(&json) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(
                        collection = T::COLLECTION,
                        id = %id,
                        error = %e,
                        "Skipping unreadable document"
                    );
                    None
                }
            })
            .collect();

        sort_snapshot(&mut items);
        Ok(items)
    }
}

#[async_trait]
impl<T: Entity> CollectionStore<T> for SharedCollection<T> {
    async fn put(&self, entity: &T) -> StoreResult<()> {
        let payload = serde_json::to_string(entity)?;
        let mut conn = self.client.get_connection();

        redis::pipe()
            .atomic()
            .hset(&self.key, entity.id(), payload)
            .ignore()
            .publish(&self.channel, entity.id())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| StoreError::write(T::COLLECTION, e))?;

        tracing::debug!(collection = T::COLLECTION, id = %entity.id(), "Put document");
        Ok(())
    }

    async fn remove(&self, id: &str) -> StoreResult<()> {
        let mut conn = self.client.get_connection();

        // HDEL of a missing field is a no-op; the extra publish only causes
        // subscribers to re-read an unchanged hash.
        redis::pipe()
            .atomic()
            .hdel(&self.key, id)
            .ignore()
            .publish(&self.channel, id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| StoreError::write(T::COLLECTION, e))?;

        tracing::debug!(collection = T::COLLECTION, id = %id, "Removed document");
        Ok(())
    }

    async fn subscribe(&self, on_change: SnapshotCallback<T>) -> StoreResult<Subscription> {
        // Subscribe before the initial read so no change can fall in between
        let mut pubsub = self
            .client
            .pubsub()
            .await
            .map_err(|e| StoreError::subscribe(T::COLLECTION, e))?;
        pubsub
            .subscribe(&self.channel)
            .await
            .map_err(|e| StoreError::subscribe(T::COLLECTION, e))?;

        on_change(self.load().await?);

        let token = CancellationToken::new();
        let cancel = token.clone();
        let collection = self.clone();

        tokio::spawn(async move {
            tracing::debug!(channel = %collection.channel, "Listening for changes");
            let mut stream = Box::pin(pubsub.on_message());

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = stream.next() => {
                        if msg.is_none() {
                            tracing::warn!(channel = %collection.channel, "Change stream ended");
                            break;
                        }
                        match collection.load().await {
                            Ok(items) => on_change(items),
                            Err(e) => tracing::error!(
                                collection = T::COLLECTION,
                                error = %e,
                                "Failed to reload collection after change"
                            ),
                        }
                    }
                }
            }

            tracing::debug!(channel = %collection.channel, "Change listener stopped");
        });

        Ok(Subscription::new(move || token.cancel()))
    }
}

/// The config singleton stored as a JSON string key
#[derive(Clone)]
pub struct SharedConfig {
    client: RedisClient,
    key: String,
    channel: String,
}

impl SharedConfig {
    pub fn new(client: RedisClient, prefix: &str) -> Self {
        SharedConfig {
            client,
            key: format!("{}:{}", prefix, CONFIG_KEY),
            channel: changes_channel(prefix, CONFIG_KEY),
        }
    }

    /// Reads the stored config, or the default if none was saved
    pub async fn load(&self) -> StoreResult<SystemConfig> {
        let mut conn = self.client.get_connection();
        let raw: Option<String> = conn
            .get(&self.key)
            .await
            .map_err(|e| StoreError::read(CONFIG_KEY, e))?;

        match raw {
            Some(json) => serde_json::from_str(&json).map_err(|e| StoreError::read(CONFIG_KEY, e)),
            None => Ok(SystemConfig::default()),
        }
    }
}

#[async_trait]
impl ConfigStore for SharedConfig {
    async fn save(&self, config: &SystemConfig) -> StoreResult<()> {
        let payload = serde_json::to_string(config)?;
        let mut conn = self.client.get_connection();

        redis::pipe()
            .atomic()
            .set(&self.key, payload)
            .ignore()
            .publish(&self.channel, CONFIG_KEY)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| StoreError::write(CONFIG_KEY, e))?;

        tracing::debug!("Saved system config");
        Ok(())
    }

    async fn subscribe(&self, on_change: ConfigCallback) -> StoreResult<Subscription> {
        let mut pubsub = self
            .client
            .pubsub()
            .await
            .map_err(|e| StoreError::subscribe(CONFIG_KEY, e))?;
        pubsub
            .subscribe(&self.channel)
            .await
            .map_err(|e| StoreError::subscribe(CONFIG_KEY, e))?;

        on_change(self.load().await?);

        let token = CancellationToken::new();
        let cancel = token.clone();
        let store = self.clone();

        tokio::spawn(async move {
            let mut stream = Box::pin(pubsub.on_message());

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = stream.next() => {
                        if msg.is_none() {
                            tracing::warn!(channel = %store.channel, "Change stream ended");
                            break;
                        }
                        match store.load().await {
                            Ok(config) => on_change(config),
                            Err(e) => tracing::error!(error = %e, "Failed to reload config after change"),
                        }
                    }
                }
            }
        });

        Ok(Subscription::new(move || token.cancel()))
    }
}
