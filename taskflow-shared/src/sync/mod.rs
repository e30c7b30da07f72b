/// Synchronization layer
///
/// Owns the live read replica of users, groups, tasks and config, and is the
/// only path by which the rest of the system writes.
///
/// # Read path
///
/// [`SyncLayer::mount`] opens one subscription per collection. Every
/// snapshot the store pushes replaces that collection in the replica under a
/// write lock, then bumps a revision counter published on a
/// `tokio::sync::watch` channel ([`SyncLayer::changes`]). Collections load
/// independently; the layer counts as ready once the first tasks snapshot is
/// in.
///
/// # Write path
///
/// Mutations are validated, then sent straight to the store. The replica is
/// never updated optimistically: a write becomes visible here only when the
/// store's next snapshot arrives. A failed write therefore leaves the
/// replica as it was.
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::store::Store;
/// use taskflow_shared::sync::SyncLayer;
///
/// # async fn example() -> anyhow::Result<()> {
/// let sync = SyncLayer::mount(Store::local("./data")?).await?;
/// sync.wait_until_ready().await;
///
/// let tasks = sync.read().tasks.len();
/// println!("{} tasks", tasks);
///
/// sync.teardown();
/// # Ok(())
/// # }
/// ```

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};
use thiserror::Error;
use tokio::sync::watch;
use validator::Validate;

use crate::models::{
    now_millis, CreateGroup, CreateTask, CreateUser, Group, ProgressLog, ProgressReport,
    SystemConfig, Task, User,
};
use crate::rules::StatusProgress;
use crate::store::{Store, StoreError, Subscription};

pub mod replica;

pub use replica::{CollectionStates, LoadState, Replica};

/// Sync layer errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// Input rejected before anything was written
    #[error("validation failed: {0}")]
    Validation(String),

    /// The store refused the write
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The referenced document is not in the replica
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl From<validator::ValidationErrors> for SyncError {
    fn from(err: validator::ValidationErrors) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl SyncError {
    fn invalid(message: impl Into<String>) -> Self {
        SyncError::Validation(message.into())
    }

    fn not_found(kind: &'static str, id: &str) -> Self {
        SyncError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

type SharedReplica = Arc<RwLock<Replica>>;

/// Live replica plus the write API
pub struct SyncLayer {
    store: Store,
    replica: SharedReplica,
    revision: Arc<watch::Sender<u64>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SyncLayer {
    /// Subscribes to every collection of `store`
    ///
    /// Stores deliver the current snapshot during `subscribe`, so the
    /// returned layer is normally ready already.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if any subscription cannot be opened;
    /// subscriptions opened before the failure are closed again.
    pub async fn mount(store: Store) -> SyncResult<Self> {
        let replica: SharedReplica = Arc::new(RwLock::new(Replica {
            states: CollectionStates::all(LoadState::Loading),
            ..Default::default()
        }));
        let (revision, _) = watch::channel(0u64);
        let revision = Arc::new(revision);

        let users = store
            .users
            .subscribe(on_snapshot(&replica, &revision, |r, users: Vec<User>| {
                tracing::debug!(collection = "users", count = users.len(), "Applied snapshot");
                r.users = users;
                r.states.users = LoadState::Live;
            }))
            .await?;

        let groups = store
            .groups
            .subscribe(on_snapshot(&replica, &revision, |r, groups: Vec<Group>| {
                tracing::debug!(collection = "groups", count = groups.len(), "Applied snapshot");
                r.groups = groups;
                r.states.groups = LoadState::Live;
            }))
            .await?;

        let tasks = store
            .tasks
            .subscribe(on_snapshot(&replica, &revision, |r, tasks: Vec<Task>| {
                tracing::debug!(collection = "tasks", count = tasks.len(), "Applied snapshot");
                r.tasks = tasks;
                r.states.tasks = LoadState::Live;
            }))
            .await?;

        let config = store
            .config
            .subscribe(on_snapshot(&replica, &revision, |r, config: SystemConfig| {
                tracing::debug!(collection = "config", "Applied snapshot");
                r.config = config;
                r.states.config = LoadState::Live;
            }))
            .await?;

        tracing::info!("Sync layer mounted");

        Ok(SyncLayer {
            store,
            replica,
            revision,
            subscriptions: Mutex::new(vec![users, groups, tasks, config]),
        })
    }

    /// Closes every subscription; the replica keeps its last contents
    ///
    /// Safe to call more than once. Dropping the layer does the same.
    pub fn teardown(&self) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if subscriptions.is_empty() {
            return;
        }
        subscriptions.clear();
        tracing::info!("Sync layer torn down");
    }

    /// Waits for the first tasks snapshot
    pub async fn wait_until_ready(&self) {
        let mut changes = self.changes();
        while !self.is_ready() {
            if changes.changed().await.is_err() {
                return;
            }
        }
    }

    /// Whether the first tasks snapshot has arrived
    pub fn is_ready(&self) -> bool {
        self.read().is_ready()
    }

    /// Revision counter, bumped after every applied snapshot
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Borrows the replica
    ///
    /// Hold the guard briefly; snapshots wait while it is held.
    pub fn read(&self) -> RwLockReadGuard<'_, Replica> {
        self.replica
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copies the replica
    pub fn snapshot(&self) -> Replica {
        self.read().clone()
    }

    /// Load state of every collection
    pub fn states(&self) -> CollectionStates {
        self.read().states
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.read().task(id).cloned()
    }

    pub fn user(&self, id: &str) -> Option<User> {
        self.read().user(id).cloned()
    }

    pub fn config(&self) -> SystemConfig {
        self.read().config.clone()
    }

    fn require_task(&self, id: &str) -> SyncResult<Task> {
        self.task(id).ok_or_else(|| SyncError::not_found("task", id))
    }

    // ----- tasks -----

    /// Creates a pending task starting now
    pub async fn add_task(&self, input: CreateTask) -> SyncResult<Task> {
        input.validate()?;
        let task = Task::from_create(input, now_millis());
        self.store.tasks.put(&task).await?;

        tracing::info!(
            task_id = %task.id,
            assignee_id = %task.assignee_id,
            assignee_type = ?task.assignee_type,
            "Task created"
        );
        Ok(task)
    }

    /// Replaces a task document
    ///
    /// Status and progress are coupled against the replica's current copy
    /// before the write.
    pub async fn update_task(&self, task: &Task) -> SyncResult<()> {
        validate_task(task)?;
        let mut task = task.clone();
        if let Some(current) = self.task(&task.id) {
            StatusProgress::of(&current)
                .edited_to(task.status, task.progress)
                .apply_to(&mut task);
        }
        self.store.tasks.put(&task).await?;
        tracing::debug!(task_id = %task.id, "Task updated");
        Ok(())
    }

    pub async fn delete_task(&self, id: &str) -> SyncResult<()> {
        self.store.tasks.remove(id).await?;
        tracing::info!(task_id = %id, "Task deleted");
        Ok(())
    }

    /// Records an executor's progress report on a task
    ///
    /// `report.status` and `report.progress` are coupled against the
    /// task's stored pair, so a report at 100% completes the task.
    pub async fn submit_report(&self, task_id: &str, report: ProgressReport) -> SyncResult<Task> {
        self.submit_report_at(task_id, report, now_millis()).await
    }

    /// [`submit_report`](Self::submit_report) with an explicit timestamp
    pub async fn submit_report_at(
        &self,
        task_id: &str,
        report: ProgressReport,
        now: i64,
    ) -> SyncResult<Task> {
        report.validate()?;
        if let Some(attachment) = &report.attachment {
            if !attachment.within_limit() {
                return Err(SyncError::invalid(format!(
                    "attachment {} exceeds the size limit",
                    attachment.name
                )));
            }
        }

        let task = with_report(self.require_task(task_id)?, &report, now);
        self.store.tasks.put(&task).await?;

        tracing::info!(
            task_id = %task.id,
            status = task.status.as_str(),
            progress = task.progress,
            "Progress report submitted"
        );
        Ok(task)
    }

    /// Adds a manager reply to an existing log entry
    pub async fn reply_to_log(&self, task_id: &str, log_id: &str, reply: &str) -> SyncResult<Task> {
        if reply.trim().is_empty() {
            return Err(SyncError::invalid("reply is empty"));
        }

        let mut task = self.require_task(task_id)?;
        let log = task
            .logs
            .iter_mut()
            .find(|l| l.id == log_id)
            .ok_or_else(|| SyncError::not_found("log", log_id))?;
        log.manager_reply = Some(reply.to_string());
        log.manager_reply_at = Some(now_millis());

        self.store.tasks.put(&task).await?;
        tracing::debug!(task_id = %task_id, log_id = %log_id, "Manager replied to log");
        Ok(task)
    }

    /// Flips a subtask's completion flag
    pub async fn toggle_subtask(&self, task_id: &str, subtask_id: &str) -> SyncResult<Task> {
        let mut task = self.require_task(task_id)?;
        let subtask = task
            .subtasks
            .iter_mut()
            .flatten()
            .find(|s| s.id == subtask_id)
            .ok_or_else(|| SyncError::not_found("subtask", subtask_id))?;
        subtask.is_completed = !subtask.is_completed;

        self.store.tasks.put(&task).await?;
        Ok(task)
    }

    // ----- users -----

    pub async fn add_user(&self, input: CreateUser) -> SyncResult<User> {
        input.validate()?;
        let user = User::from_create(input);
        self.store.users.put(&user).await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User created");
        Ok(user)
    }

    /// Replaces a user document
    pub async fn update_user(&self, user: &User) -> SyncResult<()> {
        CreateUser {
            name: user.name.trim().to_string(),
            email: user.email.clone(),
            role: user.role,
            password: None,
            avatar: None,
        }
        .validate()?;

        self.store.users.put(user).await?;
        tracing::debug!(user_id = %user.id, "User updated");
        Ok(())
    }

    /// Deletes a user; tasks assigned to it are left in place
    pub async fn delete_user(&self, id: &str) -> SyncResult<()> {
        self.store.users.remove(id).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    // ----- groups -----

    pub async fn add_group(&self, input: CreateGroup) -> SyncResult<Group> {
        input.validate()?;
        let group = Group::from_create(input);
        self.store.groups.put(&group).await?;

        tracing::info!(group_id = %group.id, members = group.member_ids.len(), "Group created");
        Ok(group)
    }

    /// Replaces a group document
    pub async fn update_group(&self, group: &Group) -> SyncResult<()> {
        if group.name.trim().is_empty() {
            return Err(SyncError::invalid("name is required"));
        }
        self.store.groups.put(group).await?;
        tracing::debug!(group_id = %group.id, "Group updated");
        Ok(())
    }

    /// Deletes a group; tasks assigned to it are left in place
    pub async fn delete_group(&self, id: &str) -> SyncResult<()> {
        self.store.groups.remove(id).await?;
        tracing::info!(group_id = %id, "Group deleted");
        Ok(())
    }

    // ----- config -----

    pub async fn save_config(&self, config: &SystemConfig) -> SyncResult<()> {
        self.store.config.save(config).await?;
        tracing::info!(
            preference = ?config.notification_preference,
            "System config saved"
        );
        Ok(())
    }

    /// Updates only the deep-link base URL
    pub async fn set_base_url(&self, base_url: &str) -> SyncResult<SystemConfig> {
        let mut config = self.config();
        config.system_base_url = base_url.trim().to_string();
        self.save_config(&config).await?;
        Ok(config)
    }
}

/// Builds a store callback that swaps one collection into the replica
fn on_snapshot<V>(
    replica: &SharedReplica,
    revision: &Arc<watch::Sender<u64>>,
    apply: fn(&mut Replica, V),
) -> Box<dyn Fn(V) + Send + Sync>
where
    V: Send + 'static,
{
    let replica = replica.clone();
    let revision = revision.clone();
    Box::new(move |value| {
        {
            let mut replica = replica
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            apply(&mut replica, value);
        }
        revision.send_modify(|n| *n += 1);
    })
}

/// Field checks for whole-document task updates
fn validate_task(task: &Task) -> SyncResult<()> {
    if task.title.trim().is_empty() {
        return Err(SyncError::invalid("title is required"));
    }
    if task.assignee_id.is_empty() {
        return Err(SyncError::invalid("an assignee is required"));
    }
    if task.progress > 100 {
        return Err(SyncError::invalid("progress must be between 0 and 100"));
    }
    if task.estimated_duration < 0.0 {
        return Err(SyncError::invalid("estimated duration cannot be negative"));
    }
    Ok(())
}

/// Applies a progress report to a task
fn with_report(mut task: Task, report: &ProgressReport, now: i64) -> Task {
    StatusProgress::of(&task)
        .edited_to(report.status, report.progress)
        .apply_to(&mut task);
    task.logs.insert(0, ProgressLog::from_report(report, now));
    task.last_reported_at = Some(now);
    if task.last_reminder_sent_at.is_some() {
        task.last_reported_after_reminder = Some(true);
    }
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AssigneeType, Attachment, ReportingFrequency, TaskStatus, UserRole, MAX_ATTACHMENT_BYTES,
    };
    use crate::store::{CollectionStore, SnapshotCallback, StoreResult};
    use async_trait::async_trait;
    use tempfile::TempDir;

    async fn mounted() -> (TempDir, SyncLayer) {
        let dir = TempDir::new().unwrap();
        let sync = SyncLayer::mount(Store::local(dir.path()).unwrap()).await.unwrap();
        (dir, sync)
    }

    fn task_input(title: &str) -> CreateTask {
        CreateTask {
            title: title.to_string(),
            description: String::new(),
            assignee_id: "u-1".to_string(),
            assignee_type: AssigneeType::User,
            due_date: 0,
            estimated_duration: 4.0,
            reporting_frequency: ReportingFrequency::Daily,
            subtasks: vec!["First".to_string(), "Second".to_string()],
        }
    }

    fn report(status: TaskStatus, progress: u8) -> ProgressReport {
        ProgressReport {
            hours_spent: 1.5,
            comment: "done aisles".to_string(),
            status,
            progress,
            attachment: None,
        }
    }

    #[tokio::test]
    async fn test_mount_empty_store_is_ready() {
        let (_dir, sync) = mounted().await;
        sync.wait_until_ready().await;

        let replica = sync.snapshot();
        assert!(replica.tasks.is_empty());
        assert!(replica.users.is_empty());
        assert_eq!(replica.config, SystemConfig::default());
        assert_eq!(replica.states, CollectionStates::all(LoadState::Live));
    }

    #[tokio::test]
    async fn test_writes_arrive_through_snapshots() {
        let (_dir, sync) = mounted().await;
        let before = *sync.changes().borrow();

        let task = sync.add_task(task_input("Count stock")).await.unwrap();

        assert_eq!(sync.task(&task.id), Some(task));
        assert!(*sync.changes().borrow() > before);
    }

    #[tokio::test]
    async fn test_validation_rejects_before_write() {
        let (_dir, sync) = mounted().await;

        let err = sync.add_task(task_input("")).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));

        let err = sync
            .add_user(CreateUser {
                name: "Ann".to_string(),
                email: "not-an-email".to_string(),
                role: UserRole::Executor,
                password: None,
                avatar: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));

        assert!(sync.read().tasks.is_empty());
        assert!(sync.read().users.is_empty());
    }

    #[tokio::test]
    async fn test_submit_report() {
        let (_dir, sync) = mounted().await;
        let task = sync.add_task(task_input("Count stock")).await.unwrap();

        let updated = sync
            .submit_report(&task.id, report(TaskStatus::InProgress, 40))
            .await
            .unwrap();

        assert_eq!(updated.status, TaskStatus::InProgress);
        assert_eq!(updated.progress, 40);
        assert_eq!(updated.logs.len(), 1);
        assert_eq!(updated.logs[0].hours_spent, 1.5);
        assert!(updated.last_reported_at.is_some());
        assert_eq!(updated.last_reported_after_reminder, None);

        let second = sync
            .submit_report(&task.id, report(TaskStatus::Completed, 100))
            .await
            .unwrap();
        assert_eq!(second.logs.len(), 2);
        assert_eq!(second.logs[0].timestamp, second.last_reported_at.unwrap());
        assert_eq!(sync.task(&task.id), Some(second));
    }

    #[tokio::test]
    async fn test_report_at_full_progress_completes() {
        let (_dir, sync) = mounted().await;
        let task = sync.add_task(task_input("Count stock")).await.unwrap();

        let updated = sync
            .submit_report(&task.id, report(TaskStatus::InProgress, 100))
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.progress, 100);

        let reopened = sync
            .submit_report(&task.id, report(TaskStatus::Completed, 60))
            .await
            .unwrap();
        assert_eq!(reopened.status, TaskStatus::InProgress);
        assert_eq!(reopened.progress, 60);
    }

    #[tokio::test]
    async fn test_update_task_couples_status_and_progress() {
        let (_dir, sync) = mounted().await;
        let task = sync.add_task(task_input("Count stock")).await.unwrap();
        sync.submit_report(&task.id, report(TaskStatus::InProgress, 20))
            .await
            .unwrap();

        let mut edit = sync.task(&task.id).unwrap();
        edit.status = TaskStatus::Completed;
        sync.update_task(&edit).await.unwrap();

        let stored = sync.task(&task.id).unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.progress, 100);
    }

    #[test]
    fn test_report_after_reminder_is_flagged() {
        let mut task = Task::from_create(task_input("Count stock"), 0);
        task.last_reminder_sent_at = Some(50);
        task.last_reported_after_reminder = Some(false);

        let task = with_report(task, &report(TaskStatus::InProgress, 10), 100);
        assert_eq!(task.last_reported_after_reminder, Some(true));
        assert_eq!(task.last_reported_at, Some(100));
    }

    #[tokio::test]
    async fn test_report_validation() {
        let (_dir, sync) = mounted().await;
        let task = sync.add_task(task_input("Count stock")).await.unwrap();

        let mut negative = report(TaskStatus::InProgress, 10);
        negative.hours_spent = -1.0;
        assert!(matches!(
            sync.submit_report(&task.id, negative).await,
            Err(SyncError::Validation(_))
        ));

        assert!(matches!(
            sync.submit_report(&task.id, report(TaskStatus::InProgress, 101)).await,
            Err(SyncError::Validation(_))
        ));

        let mut oversized = report(TaskStatus::InProgress, 10);
        oversized.attachment = Some(Attachment {
            name: "scan.png".to_string(),
            data: "a".repeat(MAX_ATTACHMENT_BYTES + 1),
        });
        assert!(matches!(
            sync.submit_report(&task.id, oversized).await,
            Err(SyncError::Validation(_))
        ));

        assert!(matches!(
            sync.submit_report("task-missing", report(TaskStatus::InProgress, 10)).await,
            Err(SyncError::NotFound { kind: "task", .. })
        ));

        assert!(sync.task(&task.id).unwrap().logs.is_empty());
    }

    #[tokio::test]
    async fn test_reply_and_toggle_subtask() {
        let (_dir, sync) = mounted().await;
        let task = sync.add_task(task_input("Count stock")).await.unwrap();
        let task = sync
            .submit_report(&task.id, report(TaskStatus::InProgress, 20))
            .await
            .unwrap();
        let log_id = task.logs[0].id.clone();

        let replied = sync.reply_to_log(&task.id, &log_id, "Thanks").await.unwrap();
        assert_eq!(replied.logs[0].manager_reply.as_deref(), Some("Thanks"));
        assert!(replied.logs[0].manager_reply_at.is_some());
        assert_eq!(replied.logs[0].comment, task.logs[0].comment);

        let subtask_id = task.subtasks.as_ref().unwrap()[1].id.clone();
        let toggled = sync.toggle_subtask(&task.id, &subtask_id).await.unwrap();
        assert!(toggled.subtasks.as_ref().unwrap()[1].is_completed);
        assert!(!toggled.subtasks.as_ref().unwrap()[0].is_completed);

        assert!(matches!(
            sync.reply_to_log(&task.id, "log-missing", "Hi").await,
            Err(SyncError::NotFound { kind: "log", .. })
        ));
    }

    #[tokio::test]
    async fn test_set_base_url_keeps_other_settings() {
        let (_dir, sync) = mounted().await;
        sync.save_config(&SystemConfig {
            email_js_service_id: "svc".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

        sync.set_base_url("https://tasks.example.com ").await.unwrap();

        let config = sync.config();
        assert_eq!(config.system_base_url, "https://tasks.example.com");
        assert_eq!(config.email_js_service_id, "svc");
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent_and_stops_updates() {
        let (_dir, sync) = mounted().await;
        sync.teardown();
        sync.teardown();

        sync.add_task(task_input("Count stock")).await.unwrap();
        assert!(sync.read().tasks.is_empty());
    }

    /// Task collection that accepts subscriptions but refuses every write
    struct RejectingTasks;

    #[async_trait]
    impl CollectionStore<Task> for RejectingTasks {
        async fn put(&self, _: &Task) -> StoreResult<()> {
            Err(StoreError::write("tasks", "permission denied"))
        }

        async fn remove(&self, _: &str) -> StoreResult<()> {
            Err(StoreError::write("tasks", "permission denied"))
        }

        async fn subscribe(&self, on_change: SnapshotCallback<Task>) -> StoreResult<Subscription> {
            on_change(Vec::new());
            Ok(Subscription::new(|| {}))
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_replica_untouched() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::local(dir.path()).unwrap();
        store.tasks = Arc::new(RejectingTasks);
        let sync = SyncLayer::mount(store).await.unwrap();

        let err = sync.add_task(task_input("Count stock")).await.unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::Write { .. })));
        assert!(sync.read().tasks.is_empty());
    }
}
