/// Session and routing controller
///
/// Resolves who is signed in, decides which top-level view is active, and
/// applies access control before a task is opened.
///
/// # States
///
/// ```text
///            users empty                 users exist, nobody signed in
///   ┌───────────────────┐            ┌───────────────────┐
///   │       Setup       │            │       Login       │
///   └─────────┬─────────┘            └─────────┬─────────┘
///   complete_setup                      attempt_login / restored session
///             │                                │
///             └──────────►  Authenticated  ◄───┘
///                          (user, view)
///                               │ logout / user deleted
///                               ▼
///                        Login or Setup
/// ```
///
/// A [`Session`] is an explicit object: created by [`Session::init`] at
/// start, fed live data through [`Session::refresh`] whenever the sync layer
/// reports a change, and reset by [`Session::logout`].
///
/// # Deep links
///
/// A `taskId` carried by the start address is held until someone is
/// authenticated and the tasks collection is live. Then exactly one attempt
/// is made to open it: managers open any existing task, executors only tasks
/// visible to them. Either way the pending id is dropped and the parameter is
/// stripped from [`Session::location`].

use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::models::{CreateUser, Task, User, UserRole};
use crate::rules::{is_visible_to, tasks_for_user};
use crate::sync::{LoadState, SyncError, SyncLayer};

pub mod deep_link;
pub mod persistence;

pub use persistence::{FileSessionStore, MemorySessionStore, SessionPersistence};

/// Shown when an executor follows a link to a task that is not theirs
pub const ACCESS_DENIED_NOTICE: &str =
    "You do not have access to this task, or it is not assigned to you.";

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("invalid password")]
    InvalidPassword,

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("session persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Manager screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerView {
    Dashboard,
    CreateTask,
    UserManagement,
    TaskDetail,
    SystemSettings,
}

/// Executor screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorView {
    List,
    Detail,
}

/// Active screen of a signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Manager(ManagerView),
    Executor(ExecutorView),
}

impl View {
    /// Landing screen for a role
    pub fn home(role: UserRole) -> Self {
        match role {
            UserRole::Manager => View::Manager(ManagerView::Dashboard),
            UserRole::Executor => View::Executor(ExecutorView::List),
        }
    }

    fn fits(&self, role: UserRole) -> bool {
        matches!(
            (self, role),
            (View::Manager(_), UserRole::Manager) | (View::Executor(_), UserRole::Executor)
        )
    }
}

/// Where the session stands
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Setup,
    Login,
    Authenticated { user: User, view: View },
}

/// Signed-in user and routing state
pub struct Session {
    sync: Arc<SyncLayer>,
    persistence: Box<dyn SessionPersistence>,
    user: Option<User>,
    /// Whether `user` has been seen in a users snapshot yet
    confirmed: bool,
    /// Persisted identity waiting for the users collection
    remembered: Option<String>,
    view: Option<View>,
    selected_task_id: Option<String>,
    pending_task_id: Option<String>,
    location: Option<Url>,
    notice: Option<String>,
}

impl Session {
    /// Starts a session
    ///
    /// Picks up a `taskId` from `location` and restores a persisted identity
    /// if it still resolves.
    pub fn init(
        sync: Arc<SyncLayer>,
        persistence: impl SessionPersistence + 'static,
        location: Option<Url>,
    ) -> Result<Self, SessionError> {
        let pending_task_id = location.as_ref().and_then(deep_link::task_id_from);
        let remembered = persistence.load()?;

        if let Some(task_id) = &pending_task_id {
            tracing::info!(task_id = %task_id, "Deep link pending");
        }

        let mut session = Session {
            sync,
            persistence: Box::new(persistence),
            user: None,
            confirmed: false,
            remembered,
            view: None,
            selected_task_id: None,
            pending_task_id,
            location,
            notice: None,
        };
        session.refresh()?;
        Ok(session)
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        if let (Some(user), Some(view)) = (&self.user, self.view) {
            return SessionState::Authenticated {
                user: user.clone(),
                view,
            };
        }
        if self.sync.read().users.is_empty() {
            SessionState::Setup
        } else {
            SessionState::Login
        }
    }

    /// Signed-in user
    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn view(&self) -> Option<View> {
        self.view
    }

    /// Task shown by the detail views
    pub fn selected_task_id(&self) -> Option<&str> {
        self.selected_task_id.as_deref()
    }

    /// Deep-linked task still waiting to be opened
    pub fn pending_task_id(&self) -> Option<&str> {
        self.pending_task_id.as_deref()
    }

    /// Visible address, with any consumed `taskId` removed
    pub fn location(&self) -> Option<&Url> {
        self.location.as_ref()
    }

    /// Takes the latest user-facing message, if any
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Reconciles the session with the latest replica
    ///
    /// Call after every change reported by the sync layer. Restores a
    /// remembered identity once users are loaded, follows edits to the
    /// signed-in user, logs out if that user was deleted, and resolves a
    /// pending deep link.
    pub fn refresh(&mut self) -> Result<(), SessionError> {
        let current_id = self.user.as_ref().map(|u| u.id.clone());
        let (fresh, remembered, users_live) = {
            let replica = self.sync.read();
            let fresh = current_id.as_ref().and_then(|id| replica.user(id).cloned());
            let remembered = self
                .remembered
                .as_ref()
                .and_then(|id| replica.user(id).cloned());
            (fresh, remembered, replica.states.users == LoadState::Live)
        };

        match (current_id, fresh) {
            (Some(_), Some(fresh)) => {
                if self.view.map_or(true, |v| !v.fits(fresh.role)) {
                    self.view = Some(View::home(fresh.role));
                    self.selected_task_id = None;
                }
                self.user = Some(fresh);
                self.confirmed = true;
            }
            (Some(current_id), None) if self.confirmed && users_live => {
                tracing::info!(user_id = %current_id, "Signed-in user no longer exists");
                return self.logout();
            }
            (Some(_), None) => {}
            (None, _) => {
                if let Some(user) = remembered {
                    tracing::info!(user_id = %user.id, "Restored session");
                    self.remembered = None;
                    self.authenticate(user, true);
                } else if users_live {
                    if let Some(stale) = self.remembered.take() {
                        tracing::info!(user_id = %stale, "Remembered user no longer exists");
                        self.persistence.clear()?;
                    }
                }
            }
        }

        self.resolve_pending_link();
        Ok(())
    }

    /// Creates the first manager and signs it in
    ///
    /// Only allowed while there are no users.
    pub async fn complete_setup(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, SessionError> {
        if !self.sync.read().users.is_empty() {
            return Err(SyncError::Validation("setup has already been completed".to_string()).into());
        }

        let user = self
            .sync
            .add_user(CreateUser {
                name: name.trim().to_string(),
                email: email.trim().to_string(),
                role: UserRole::Manager,
                password: Some(password.to_string()),
                avatar: None,
            })
            .await?;

        self.persistence.save(&user.id)?;
        // The new user may not be in the replica yet
        let confirmed = self.sync.read().user(&user.id).is_some();
        self.authenticate(user.clone(), confirmed);
        self.view = Some(View::Manager(ManagerView::UserManagement));

        tracing::info!(user_id = %user.id, "Initial manager created");
        self.resolve_pending_link();
        Ok(user)
    }

    /// User a login form should have selected
    ///
    /// `selected` if it still exists, otherwise the first user.
    pub fn login_candidate(&self, selected: Option<&str>) -> Option<User> {
        let replica = self.sync.read();
        let candidate = selected
            .and_then(|id| replica.user(id))
            .or_else(|| replica.users.first())
            .cloned();
        candidate
    }

    /// Signs in with a password check
    ///
    /// Users without a stored password are let in with any input.
    pub fn attempt_login(&mut self, user_id: &str, password: &str) -> Result<User, SessionError> {
        let user = self
            .sync
            .user(user_id)
            .ok_or_else(|| SessionError::UnknownUser(user_id.to_string()))?;

        if !user.password_matches(password) {
            tracing::warn!(user_id = %user_id, "Login rejected: wrong password");
            return Err(SessionError::InvalidPassword);
        }

        self.persistence.save(&user.id)?;
        self.authenticate(user.clone(), true);
        tracing::info!(user_id = %user.id, role = user.role.as_str(), "Signed in");

        self.resolve_pending_link();
        Ok(user)
    }

    /// Signs out and forgets the pending link and persisted identity
    pub fn logout(&mut self) -> Result<(), SessionError> {
        if let Some(user) = self.user.take() {
            tracing::info!(user_id = %user.id, "Signed out");
        }
        self.confirmed = false;
        self.remembered = None;
        self.view = None;
        self.selected_task_id = None;
        self.pending_task_id = None;
        self.location = self.location.as_ref().map(deep_link::strip_task_id);
        self.persistence.clear()
    }

    /// Switches a manager to another screen
    pub fn navigate(&mut self, view: ManagerView) -> Result<(), SessionError> {
        let user = self.user.as_ref().ok_or(SessionError::NotAuthenticated)?;
        if !user.role.can_view_all_tasks() {
            return Err(SessionError::AccessDenied(format!("{:?} is for managers", view)));
        }
        if view != ManagerView::TaskDetail {
            self.selected_task_id = None;
        }
        self.view = Some(View::Manager(view));
        Ok(())
    }

    /// Opens a task's detail view after checking access
    pub fn open_task(&mut self, task_id: &str) -> Result<(), SessionError> {
        let user = self.user.as_ref().ok_or(SessionError::NotAuthenticated)?;

        let view = if user.role.can_view_all_tasks() {
            View::Manager(ManagerView::TaskDetail)
        } else {
            let replica = self.sync.read();
            let visible = replica
                .task(task_id)
                .map(|task| is_visible_to(task, user, &replica.groups))
                .unwrap_or(false);
            if !visible {
                tracing::warn!(user_id = %user.id, task_id = %task_id, "Task access denied");
                return Err(SessionError::AccessDenied(task_id.to_string()));
            }
            View::Executor(ExecutorView::Detail)
        };

        self.selected_task_id = Some(task_id.to_string());
        self.view = Some(view);
        Ok(())
    }

    /// Replies to an executor's log entry; managers only
    pub async fn reply_to_log(
        &self,
        task_id: &str,
        log_id: &str,
        reply: &str,
    ) -> Result<Task, SessionError> {
        let user = self.user.as_ref().ok_or(SessionError::NotAuthenticated)?;
        if !user.role.can_view_all_tasks() {
            tracing::warn!(user_id = %user.id, task_id = %task_id, "Reply refused");
            return Err(SessionError::AccessDenied("replies are for managers".to_string()));
        }
        Ok(self.sync.reply_to_log(task_id, log_id, reply).await?)
    }

    /// Leaves a detail view
    pub fn close_task(&mut self) {
        self.selected_task_id = None;
        if let Some(user) = &self.user {
            self.view = Some(View::home(user.role));
        }
    }

    /// Tasks the signed-in user may see: all for managers, own for executors
    pub fn visible_tasks(&self) -> Vec<Task> {
        let Some(user) = &self.user else {
            return Vec::new();
        };
        let replica = self.sync.read();
        let tasks = if user.role.can_view_all_tasks() {
            replica.tasks.clone()
        } else {
            tasks_for_user(&replica.tasks, user, &replica.groups)
                .into_iter()
                .cloned()
                .collect()
        };
        tasks
    }

    /// Ends the session object without touching the persisted identity
    pub fn teardown(self) {
        tracing::debug!("Session torn down");
    }

    fn authenticate(&mut self, user: User, confirmed: bool) {
        self.view = Some(View::home(user.role));
        self.selected_task_id = None;
        self.user = Some(user);
        self.confirmed = confirmed;
    }

    /// Makes the single attempt to open a deep-linked task
    fn resolve_pending_link(&mut self) {
        if self.user.is_none() || !self.sync.is_ready() {
            return;
        }
        let Some(task_id) = self.pending_task_id.take() else {
            return;
        };

        let is_manager = self
            .user
            .as_ref()
            .map_or(false, |u| u.role.can_view_all_tasks());
        let exists = self.sync.read().task(&task_id).is_some();

        if is_manager && !exists {
            tracing::info!(task_id = %task_id, "Deep-linked task does not exist");
        } else if let Err(e) = self.open_task(&task_id) {
            tracing::info!(task_id = %task_id, error = %e, "Deep link refused");
            self.notice = Some(ACCESS_DENIED_NOTICE.to_string());
        } else {
            tracing::info!(task_id = %task_id, "Opened deep-linked task");
        }

        self.location = self.location.as_ref().map(deep_link::strip_task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AssigneeType, CreateGroup, CreateTask, ProgressReport, ReportingFrequency, TaskStatus,
    };
    use crate::store::Store;
    use tempfile::TempDir;

    async fn sync() -> (TempDir, Arc<SyncLayer>) {
        let dir = TempDir::new().unwrap();
        let sync = SyncLayer::mount(Store::local(dir.path()).unwrap()).await.unwrap();
        (dir, Arc::new(sync))
    }

    fn new_user(name: &str, role: UserRole, password: Option<&str>) -> CreateUser {
        CreateUser {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            role,
            password: password.map(str::to_string),
            avatar: None,
        }
    }

    fn new_task(assignee: &str, assignee_type: AssigneeType) -> CreateTask {
        CreateTask {
            title: "Count stock".to_string(),
            description: String::new(),
            assignee_id: assignee.to_string(),
            assignee_type,
            due_date: 0,
            estimated_duration: 1.0,
            reporting_frequency: ReportingFrequency::None,
            subtasks: vec![],
        }
    }

    #[tokio::test]
    async fn test_setup_then_user_management() {
        let (_dir, sync) = sync().await;
        let mut session = Session::init(sync.clone(), MemorySessionStore::new(), None).unwrap();
        assert_eq!(session.state(), SessionState::Setup);

        let admin = session.complete_setup("Ann", "ann@example.com", "pw").await.unwrap();
        assert_eq!(admin.role, UserRole::Manager);
        assert_eq!(session.view(), Some(View::Manager(ManagerView::UserManagement)));

        let err = session.complete_setup("Bob", "bob@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, SessionError::Sync(SyncError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_checks_password() {
        let (_dir, sync) = sync().await;
        let ann = sync.add_user(new_user("Ann", UserRole::Executor, Some("pw"))).await.unwrap();
        let legacy = sync.add_user(new_user("Leo", UserRole::Executor, None)).await.unwrap();

        let mut session = Session::init(sync.clone(), MemorySessionStore::new(), None).unwrap();
        assert_eq!(session.state(), SessionState::Login);

        assert!(matches!(
            session.attempt_login(&ann.id, "nope"),
            Err(SessionError::InvalidPassword)
        ));
        assert!(matches!(
            session.attempt_login("u-missing", "pw"),
            Err(SessionError::UnknownUser(_))
        ));

        session.attempt_login(&legacy.id, "anything").unwrap();
        assert_eq!(session.view(), Some(View::Executor(ExecutorView::List)));
    }

    #[tokio::test]
    async fn test_session_restored_without_password() {
        let (_dir, sync) = sync().await;
        let ann = sync.add_user(new_user("Ann", UserRole::Manager, Some("pw"))).await.unwrap();

        let session = Session::init(sync, MemorySessionStore::with_user(ann.id.clone()), None).unwrap();
        assert_eq!(session.current_user().map(|u| u.id.clone()), Some(ann.id));
        assert_eq!(session.view(), Some(View::Manager(ManagerView::Dashboard)));
    }

    #[tokio::test]
    async fn test_stale_remembered_identity_is_cleared() {
        let (_dir, sync) = sync().await;
        sync.add_user(new_user("Ann", UserRole::Manager, None)).await.unwrap();

        let session = Session::init(sync, MemorySessionStore::with_user("u-gone"), None).unwrap();
        assert_eq!(session.state(), SessionState::Login);
    }

    #[tokio::test]
    async fn test_deep_link_denied_for_unassigned_executor() {
        let (_dir, sync) = sync().await;
        let ann = sync.add_user(new_user("Ann", UserRole::Executor, None)).await.unwrap();
        let bob = sync.add_user(new_user("Bob", UserRole::Executor, None)).await.unwrap();
        let task = sync.add_task(new_task(&bob.id, AssigneeType::User)).await.unwrap();

        let location = Url::parse(&format!("https://tasks.example.com/?taskId={}", task.id)).unwrap();
        let mut session = Session::init(sync.clone(), MemorySessionStore::new(), Some(location)).unwrap();
        assert_eq!(session.pending_task_id(), Some(task.id.as_str()));

        session.attempt_login(&ann.id, "").unwrap();

        assert_eq!(session.take_notice().as_deref(), Some(ACCESS_DENIED_NOTICE));
        assert_eq!(session.pending_task_id(), None);
        assert_eq!(session.selected_task_id(), None);
        assert_eq!(session.view(), Some(View::Executor(ExecutorView::List)));
        assert_eq!(session.location().unwrap().as_str(), "https://tasks.example.com/");

        // A reload starts from the stripped address and does not try again
        let reloaded = Session::init(
            sync,
            MemorySessionStore::with_user(ann.id),
            session.location().cloned(),
        )
        .unwrap();
        assert_eq!(reloaded.pending_task_id(), None);
    }

    #[tokio::test]
    async fn test_deep_link_opens_for_group_member() {
        let (_dir, sync) = sync().await;
        let ann = sync.add_user(new_user("Ann", UserRole::Executor, None)).await.unwrap();
        let group = sync
            .add_group(CreateGroup {
                name: "Ops".to_string(),
                member_ids: vec![ann.id.clone()],
            })
            .await
            .unwrap();
        let task = sync.add_task(new_task(&group.id, AssigneeType::Group)).await.unwrap();

        let location = Url::parse(&format!("https://x.io/app?taskId={}&tab=1", task.id)).unwrap();
        let mut session = Session::init(sync, MemorySessionStore::new(), Some(location)).unwrap();
        session.attempt_login(&ann.id, "").unwrap();

        assert_eq!(session.selected_task_id(), Some(task.id.as_str()));
        assert_eq!(session.view(), Some(View::Executor(ExecutorView::Detail)));
        assert_eq!(session.location().unwrap().as_str(), "https://x.io/app?tab=1");
        assert_eq!(session.take_notice(), None);
    }

    #[tokio::test]
    async fn test_manager_opens_any_task() {
        let (_dir, sync) = sync().await;
        let boss = sync.add_user(new_user("Boss", UserRole::Manager, None)).await.unwrap();
        let task = sync.add_task(new_task("u-someone", AssigneeType::User)).await.unwrap();

        let mut session = Session::init(sync, MemorySessionStore::new(), None).unwrap();
        session.attempt_login(&boss.id, "").unwrap();
        session.open_task(&task.id).unwrap();
        assert_eq!(session.view(), Some(View::Manager(ManagerView::TaskDetail)));
        assert_eq!(session.visible_tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_executor_cannot_navigate_manager_views() {
        let (_dir, sync) = sync().await;
        let ann = sync.add_user(new_user("Ann", UserRole::Executor, None)).await.unwrap();

        let mut session = Session::init(sync, MemorySessionStore::new(), None).unwrap();
        assert!(matches!(
            session.navigate(ManagerView::Dashboard),
            Err(SessionError::NotAuthenticated)
        ));
        session.attempt_login(&ann.id, "").unwrap();
        assert!(matches!(
            session.navigate(ManagerView::SystemSettings),
            Err(SessionError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_only_managers_reply_to_logs() {
        let (_dir, sync) = sync().await;
        let boss = sync.add_user(new_user("Boss", UserRole::Manager, None)).await.unwrap();
        let ann = sync.add_user(new_user("Ann", UserRole::Executor, None)).await.unwrap();
        let task = sync.add_task(new_task(&ann.id, AssigneeType::User)).await.unwrap();
        let reported = sync
            .submit_report(
                &task.id,
                ProgressReport {
                    hours_spent: 1.0,
                    comment: "Half done".to_string(),
                    status: TaskStatus::InProgress,
                    progress: 50,
                    attachment: None,
                },
            )
            .await
            .unwrap();
        let log_id = reported.logs[0].id.clone();

        let mut executor = Session::init(sync.clone(), MemorySessionStore::new(), None).unwrap();
        assert!(matches!(
            executor.reply_to_log(&task.id, &log_id, "Thanks").await,
            Err(SessionError::NotAuthenticated)
        ));
        executor.attempt_login(&ann.id, "").unwrap();
        assert!(matches!(
            executor.reply_to_log(&task.id, &log_id, "Thanks").await,
            Err(SessionError::AccessDenied(_))
        ));
        assert_eq!(sync.task(&task.id).unwrap().logs[0].manager_reply, None);

        let mut manager = Session::init(sync.clone(), MemorySessionStore::new(), None).unwrap();
        manager.attempt_login(&boss.id, "").unwrap();
        let replied = manager.reply_to_log(&task.id, &log_id, "Thanks").await.unwrap();
        assert_eq!(replied.logs[0].manager_reply.as_deref(), Some("Thanks"));
    }

    #[tokio::test]
    async fn test_deleted_user_is_logged_out() {
        let (_dir, sync) = sync().await;
        let ann = sync.add_user(new_user("Ann", UserRole::Manager, None)).await.unwrap();
        let bob = sync.add_user(new_user("Bob", UserRole::Manager, None)).await.unwrap();

        let persistence = Arc::new(MemorySessionStore::new());
        let mut session = Session::init(sync.clone(), SharedPersistence(persistence.clone()), None).unwrap();
        session.attempt_login(&ann.id, "").unwrap();
        assert_eq!(persistence.load().unwrap(), Some(ann.id.clone()));

        sync.delete_user(&ann.id).await.unwrap();
        session.refresh().unwrap();

        assert_eq!(session.state(), SessionState::Login);
        assert_eq!(persistence.load().unwrap(), None);

        // Selection falls back to the first remaining user
        let candidate = session.login_candidate(Some(&ann.id)).unwrap();
        assert_eq!(candidate.id, bob.id);
    }

    #[tokio::test]
    async fn test_logout_returns_to_setup_when_no_users_remain() {
        let (_dir, sync) = sync().await;
        let mut session = Session::init(sync.clone(), MemorySessionStore::new(), None).unwrap();
        let admin = session.complete_setup("Ann", "ann@example.com", "pw").await.unwrap();

        sync.delete_user(&admin.id).await.unwrap();
        session.logout().unwrap();
        assert_eq!(session.state(), SessionState::Setup);
    }

    /// Lets a test inspect persistence owned by the session
    struct SharedPersistence(Arc<MemorySessionStore>);

    impl SessionPersistence for SharedPersistence {
        fn load(&self) -> Result<Option<String>, SessionError> {
            self.0.load()
        }
        fn save(&self, user_id: &str) -> Result<(), SessionError> {
            self.0.save(user_id)
        }
        fn clear(&self) -> Result<(), SessionError> {
            self.0.clear()
        }
    }
}
