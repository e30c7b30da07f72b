/// File-backed store for single-process use
///
/// Each collection lives in `{dir}/{collection}.json` as a JSON array in
/// canonical order; the config singleton lives in `{dir}/config.json`.
/// Files are replaced atomically (write to a uniquely named temp file, then
/// rename), so a crash mid-write leaves the previous version intact.
///
/// Change notification is in-process only: subscribers hear about writes
/// made through this `LocalStore`, not about edits made to the files by
/// anything else.
///
/// Writes to one collection are serialized behind an async mutex and do
/// their file I/O through `tokio::fs`. A write updates memory only after the
/// file write succeeded. On failure both stay as they were and subscribers
/// are not notified.
///
/// A document in a collection file that does not parse is skipped with a
/// warning, the same way the shared store treats a bad hash entry.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use super::{
    CollectionStore, ConfigCallback, ConfigStore, SnapshotCallback, Store, StoreError,
    StoreResult, Subscription,
};
use crate::models::{sort_snapshot, Entity, Group, SystemConfig, Task, User};

const CONFIG_FILE: &str = "config";

/// All collections stored under one data directory
pub struct LocalStore {
    dir: PathBuf,
    users: Arc<LocalCollection<User>>,
    groups: Arc<LocalCollection<Group>>,
    tasks: Arc<LocalCollection<Task>>,
    config: Arc<LocalConfig>,
}

impl LocalStore {
    /// Opens (or creates) the data directory and loads every collection
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::write("data directory", e))?;

        let store = LocalStore {
            users: Arc::new(LocalCollection::open(&dir)?),
            groups: Arc::new(LocalCollection::open(&dir)?),
            tasks: Arc::new(LocalCollection::open(&dir)?),
            config: Arc::new(LocalConfig::open(&dir)?),
            dir,
        };

        tracing::info!(dir = %store.dir.display(), "Opened local store");
        Ok(store)
    }

    /// Data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Type-erased bundle for the sync layer
    pub fn into_store(self) -> Store {
        Store {
            users: self.users,
            groups: self.groups,
            tasks: self.tasks,
            config: self.config,
        }
    }
}

/// Subscribers keyed by a per-collection counter
struct Subscribers<C> {
    next_id: u64,
    entries: Vec<(u64, C)>,
}

impl<C> Subscribers<C> {
    fn new() -> Self {
        Subscribers {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    fn add(&mut self, callback: C) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry, _)| *entry != id);
    }
}

fn snapshot<T: Entity>(items: &BTreeMap<String, T>) -> Vec<T> {
    let mut items: Vec<T> = items.values().cloned().collect();
    sort_snapshot(&mut items);
    items
}

/// One collection backed by `{dir}/{collection}.json`
pub struct LocalCollection<T: Entity> {
    path: PathBuf,
    items: AsyncMutex<BTreeMap<String, T>>,
    subscribers: Arc<Mutex<Subscribers<SnapshotCallback<T>>>>,
}

impl<T: Entity> LocalCollection<T> {
    /// Loads the collection file, or starts empty if there is none
    pub fn open(dir: &Path) -> StoreResult<Self> {
        let path = dir.join(format!("{}.json", T::COLLECTION));
        let loaded: Vec<T> = read_collection(&path)?;

        tracing::debug!(
            collection = T::COLLECTION,
            count = loaded.len(),
            "Loaded collection"
        );

        let items = loaded
            .into_iter()
            .map(|item| (item.id().to_string(), item))
            .collect();

        Ok(LocalCollection {
            path,
            items: AsyncMutex::new(items),
            subscribers: Arc::new(Mutex::new(Subscribers::new())),
        })
    }

    /// Persists `next` and swaps it in; memory is untouched on failure
    async fn commit(
        &self,
        items: &mut BTreeMap<String, T>,
        next: BTreeMap<String, T>,
    ) -> StoreResult<()> {
        let mut ordered: Vec<&T> = next.values().collect();
        ordered.sort_by(|a, b| T::canonical_order(a, b));
        write_json_atomic(&self.path, &ordered, T::COLLECTION).await?;

        *items = next;

        let subscribers = lock(&self.subscribers);
        if !subscribers.entries.is_empty() {
            for (_, callback) in &subscribers.entries {
                callback(snapshot(items));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Entity> CollectionStore<T> for LocalCollection<T> {
    async fn put(&self, entity: &T) -> StoreResult<()> {
        let mut items = self.items.lock().await;
        let mut next = items.clone();
        next.insert(entity.id().to_string(), entity.clone());
        self.commit(&mut items, next).await?;

        tracing::debug!(collection = T::COLLECTION, id = %entity.id(), "Put document");
        Ok(())
    }

    async fn remove(&self, id: &str) -> StoreResult<()> {
        let mut items = self.items.lock().await;
        if !items.contains_key(id) {
            tracing::debug!(collection = T::COLLECTION, id = %id, "Remove of unknown id ignored");
            return Ok(());
        }

        let mut next = items.clone();
        next.remove(id);
        self.commit(&mut items, next).await?;

        tracing::debug!(collection = T::COLLECTION, id = %id, "Removed document");
        Ok(())
    }

    async fn subscribe(&self, on_change: SnapshotCallback<T>) -> StoreResult<Subscription> {
        // Held so no write lands between the first snapshot and registration
        let items = self.items.lock().await;
        let mut subscribers = lock(&self.subscribers);
        on_change(snapshot(&items));
        let id = subscribers.add(on_change);

        let weak: Weak<Mutex<Subscribers<SnapshotCallback<T>>>> =
            Arc::downgrade(&self.subscribers);
        Ok(Subscription::new(move || {
            if let Some(subscribers) = weak.upgrade() {
                lock(&subscribers).remove(id);
            }
        }))
    }
}

/// The config singleton backed by `{dir}/config.json`
pub struct LocalConfig {
    path: PathBuf,
    config: AsyncMutex<Option<SystemConfig>>,
    subscribers: Arc<Mutex<Subscribers<ConfigCallback>>>,
}

impl LocalConfig {
    /// Loads the config file if present
    pub fn open(dir: &Path) -> StoreResult<Self> {
        let path = dir.join(format!("{}.json", CONFIG_FILE));
        let config = read_json(&path, CONFIG_FILE)?;

        Ok(LocalConfig {
            path,
            config: AsyncMutex::new(config),
            subscribers: Arc::new(Mutex::new(Subscribers::new())),
        })
    }
}

#[async_trait]
impl ConfigStore for LocalConfig {
    async fn save(&self, config: &SystemConfig) -> StoreResult<()> {
        let mut current = self.config.lock().await;
        write_json_atomic(&self.path, config, CONFIG_FILE).await?;
        *current = Some(config.clone());

        for (_, callback) in &lock(&self.subscribers).entries {
            callback(config.clone());
        }

        tracing::debug!("Saved system config");
        Ok(())
    }

    async fn subscribe(&self, on_change: ConfigCallback) -> StoreResult<Subscription> {
        let current = self.config.lock().await;
        let mut subscribers = lock(&self.subscribers);
        on_change(current.clone().unwrap_or_default());
        let id = subscribers.add(on_change);

        let weak = Arc::downgrade(&self.subscribers);
        Ok(Subscription::new(move || {
            if let Some(subscribers) = weak.upgrade() {
                lock(&subscribers).remove(id);
            }
        }))
    }
}

/// Locks, recovering the data if a subscriber panicked while holding the lock
fn lock<S>(mutex: &Mutex<S>) -> MutexGuard<'_, S> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reads a JSON file; `Ok(None)` if it does not exist
fn read_json<V: DeserializeOwned>(path: &Path, collection: &str) -> StoreResult<Option<V>> {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::read(collection, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::read(collection, e)),
    }
}

/// Reads a collection file, skipping documents that fail to parse
///
/// A file that is not a JSON array at all is still a read error.
fn read_collection<T: Entity>(path: &Path) -> StoreResult<Vec<T>> {
    let raw: Vec<serde_json::Value> = read_json(path, T::COLLECTION)?.unwrap_or_default();

    Ok(raw
        .into_iter()
        .filter_map(|value| {
            let id = value
                .get("id")
                .and_then(|id| id.as_str())
                .unwrap_or_default()
                .to_string();
            match serde_json::from_value(value) {
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
            }
        })
        .collect())
}

/// Sibling temp path unique to this write
fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    tmp.set_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
    tmp
}

/// Writes JSON to a sibling temp file, then renames it over `path`
async fn write_json_atomic<V: Serialize + ?Sized>(
    path: &Path,
    value: &V,
    collection: &str,
) -> StoreResult<()> {
    let content = serde_json::to_vec(value)?;
    let tmp = temp_path(path);

    if let Err(e) = tokio::fs::write(&tmp, content).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::write(collection, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::write(collection, e));
    }
    Ok(())
}
