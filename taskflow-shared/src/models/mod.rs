/// Persisted entities for TaskFlow
///
/// Every entity is stored as a camelCase JSON document keyed by its `id`.
/// The field names are part of the external contract: other tools read the
/// same collections.
///
/// # Models
///
/// - `user`: Managers and executors
/// - `group`: Named sets of executors that tasks can be assigned to
/// - `task`: Tasks with progress logs and subtasks
/// - `config`: The `SystemConfig` singleton
///
/// # Collections
///
/// Users, groups and tasks implement [`Entity`], which names the collection
/// and fixes the order snapshots are delivered in. Both storage backends sort
/// with [`sort_snapshot`] so subscribers see the same order regardless of
/// which backend is active.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cmp::Ordering;
use uuid::Uuid;

pub mod config;
pub mod group;
pub mod task;
pub mod user;

pub use config::{NotificationPreference, SystemConfig};
pub use group::{CreateGroup, Group};
pub use task::{
    AssigneeType, Attachment, CreateTask, ProgressLog, ProgressReport, ReportingFrequency,
    SubTask, Task, TaskStatus, MAX_ATTACHMENT_BYTES,
};
pub use user::{CreateUser, User, UserRole};

/// A document stored in a keyed collection
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection name used for file names, Redis keys and log fields
    const COLLECTION: &'static str;

    /// Identity of the document within its collection
    fn id(&self) -> &str;

    /// Order in which snapshots of this collection are delivered
    fn canonical_order(a: &Self, b: &Self) -> Ordering {
        a.id().cmp(b.id())
    }
}

/// Sorts a snapshot into the collection's canonical order
pub fn sort_snapshot<T: Entity>(items: &mut [T]) {
    items.sort_by(T::canonical_order);
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generates a new document id with a readable prefix (`task-…`, `u-…`)
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_has_prefix_and_is_unique() {
        let a = new_id("task");
        let b = new_id("task");
        assert!(a.starts_with("task-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_now_millis_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(now_millis() > 1_577_836_800_000);
    }
}
