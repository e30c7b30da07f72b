/// Task visibility
///
/// An executor sees a task when it is the direct assignee or a current
/// member of the assigned group. Managers see every task; that decision
/// belongs to the session controller, which consults
/// [`UserRole::can_view_all_tasks`](crate::models::UserRole::can_view_all_tasks)
/// before falling back to [`is_visible_to`].
///
/// Group membership is looked up in the snapshot passed in, so removing a
/// user from a group makes its tasks invisible on the very next check.

use crate::models::{AssigneeType, Group, Task, User};

/// Whether `task` is assigned to `user`, directly or through a group
///
/// An assignee id that matches no group in `groups` resolves to `false`.
///
/// # Example
///
/// ```
/// use taskflow_shared::models::{AssigneeType, Group, Task};
/// use taskflow_shared::rules::is_visible_to;
/// # use taskflow_shared::models::{User, UserRole, TaskStatus, ReportingFrequency};
/// # let user = User { id: "u-1".into(), name: "E".into(), email: "e@x.io".into(),
/// #     role: UserRole::Executor, password: None, avatar: None };
/// # let mut task = Task { id: "t".into(), title: "T".into(), description: String::new(),
/// #     assignee_id: String::new(), assignee_type: AssigneeType::User, start_date: 0,
/// #     due_date: 0, estimated_duration: 0.0, status: TaskStatus::Pending, progress: 0,
/// #     reporting_frequency: ReportingFrequency::None, last_reported_at: None,
/// #     last_reminder_sent_at: None, last_reported_after_reminder: None,
/// #     logs: vec![], subtasks: None };
/// let groups = vec![Group { id: "g-1".into(), name: "Ops".into(), member_ids: vec!["u-1".into()] }];
///
/// task.assignee_type = AssigneeType::Group;
/// task.assignee_id = "g-1".into();
/// assert!(is_visible_to(&task, &user, &groups));
///
/// task.assignee_id = "g-deleted".into();
/// assert!(!is_visible_to(&task, &user, &groups));
/// ```
pub fn is_visible_to(task: &Task, user: &User, groups: &[Group]) -> bool {
    match task.assignee_type {
        AssigneeType::User => task.assignee_id == user.id,
        AssigneeType::Group => groups
            .iter()
            .find(|g| g.id == task.assignee_id)
            .map(|g| g.has_member(&user.id))
            .unwrap_or(false),
    }
}

/// Tasks an executor should see in its task list
///
/// Preserves the order of `tasks`.
pub fn tasks_for_user<'a>(tasks: &'a [Task], user: &User, groups: &[Group]) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| is_visible_to(t, user, groups))
        .collect()
}
