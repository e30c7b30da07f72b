/// Persistence adapter
///
/// One interface, two interchangeable backends:
///
/// - [`local::LocalStore`]: JSON files in a data directory, change fan-out
///   within this process only
/// - [`shared::SharedStore`]: Redis hashes plus Pub/Sub, change fan-out to
///   every connected client
///
/// # Subscription model
///
/// Every subscription is push-based and delivers the *whole* collection:
/// once immediately on subscribe, then again after every put or remove,
/// until the returned [`Subscription`] is cancelled or dropped. Snapshots
/// arrive in the collection's canonical order (see
/// [`Entity::canonical_order`]).
///
/// Writes replace whole documents; the last writer wins. Failed writes are
/// returned to the caller and never retried here.
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::models::Task;
/// use taskflow_shared::store::Store;
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = Store::local("./data")?;
///
/// let subscription = store
///     .tasks
///     .subscribe(Box::new(|tasks: Vec<Task>| println!("{} tasks", tasks.len())))
///     .await?;
///
/// // ...
///
/// drop(subscription);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Entity, Group, SystemConfig, Task, User};
use crate::redis::RedisClient;

pub mod local;
pub mod shared;

pub use local::LocalStore;
pub use shared::SharedStore;

/// Persistence adapter errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A put/remove/save did not reach durable storage
    #[error("failed to write {collection}: {message}")]
    Write { collection: String, message: String },

    /// Stored data could not be read back
    #[error("failed to read {collection}: {message}")]
    Read { collection: String, message: String },

    /// A subscription could not be established
    #[error("failed to subscribe to {collection}: {message}")]
    Subscribe { collection: String, message: String },

    /// A document could not be encoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn write(collection: &str, err: impl fmt::Display) -> Self {
        StoreError::Write {
            collection: collection.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn read(collection: &str, err: impl fmt::Display) -> Self {
        StoreError::Read {
            collection: collection.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn subscribe(collection: &str, err: impl fmt::Display) -> Self {
        StoreError::Subscribe {
            collection: collection.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Receives full collection snapshots
///
/// Called synchronously by the store; it must not call back into the store.
pub type SnapshotCallback<T> = Box<dyn Fn(Vec<T>) + Send + Sync>;

/// Receives the config singleton
pub type ConfigCallback = Box<dyn Fn(SystemConfig) + Send + Sync>;

/// Handle to an active subscription
///
/// Cancelling is idempotent; dropping the handle cancels too.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps the action that detaches the subscriber
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stops delivery; later calls do nothing
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has not run yet
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A keyed collection of documents
#[async_trait]
pub trait CollectionStore<T: Entity>: Send + Sync {
    /// Inserts or replaces the document with `entity.id()`
    async fn put(&self, entity: &T) -> StoreResult<()>;

    /// Deletes a document; an unknown id succeeds without effect
    async fn remove(&self, id: &str) -> StoreResult<()>;

    /// Delivers the current snapshot now and after every change
    async fn subscribe(&self, on_change: SnapshotCallback<T>) -> StoreResult<Subscription>;
}

/// The `SystemConfig` singleton
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Replaces the stored config
    async fn save(&self, config: &SystemConfig) -> StoreResult<()>;

    /// Delivers the current config (default if never saved) now and after every save
    async fn subscribe(&self, on_change: ConfigCallback) -> StoreResult<Subscription>;
}

/// All collections of one backend
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn CollectionStore<User>>,
    pub groups: Arc<dyn CollectionStore<Group>>,
    pub tasks: Arc<dyn CollectionStore<Task>>,
    pub config: Arc<dyn ConfigStore>,
}

impl Store {
    /// File-backed store rooted at `dir` (created if missing)
    pub fn local(dir: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(LocalStore::open(dir)?.into_store())
    }

    /// Redis-backed store; every key starts with `prefix`
    pub fn shared(client: RedisClient, prefix: &str) -> Self {
        SharedStore::new(client, prefix).into_store()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sub.is_active());
        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        drop(sub);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        {
            let _sub = Subscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_messages_name_collection() {
        let err = StoreError::write("tasks", "disk full");
        assert_eq!(err.to_string(), "failed to write tasks: disk full");
    }
}
