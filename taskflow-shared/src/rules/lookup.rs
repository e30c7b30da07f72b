/// Total lookups over live collections
///
/// Tasks may reference users or groups that were deleted, or that the local
/// replica has not seen yet (collections arrive independently). Every lookup
/// here is total: a missing id yields [`UNKNOWN`] or an empty result instead
/// of an error.

use crate::models::{AssigneeType, Group, Task, User};

/// Display value for an id that matches nothing in the live collection
pub const UNKNOWN: &str = "Unknown";

/// Name of a user, or [`UNKNOWN`]
pub fn user_name<'a>(users: &'a [User], user_id: &str) -> &'a str {
    users
        .iter()
        .find(|u| u.id == user_id)
        .map(|u| u.name.as_str())
        .unwrap_or(UNKNOWN)
}

/// Name of a group, or [`UNKNOWN`]
pub fn group_name<'a>(groups: &'a [Group], group_id: &str) -> &'a str {
    groups
        .iter()
        .find(|g| g.id == group_id)
        .map(|g| g.name.as_str())
        .unwrap_or(UNKNOWN)
}

/// Name of whoever a task is assigned to, or [`UNKNOWN`]
pub fn assignee_name<'a>(task: &Task, users: &'a [User], groups: &'a [Group]) -> &'a str {
    match task.assignee_type {
        AssigneeType::User => user_name(users, &task.assignee_id),
        AssigneeType::Group => group_name(groups, &task.assignee_id),
    }
}

/// Who should be notified about a task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients {
    /// Addresses, in member order; deleted members are skipped
    pub emails: Vec<String>,
    /// User name, or group name for group tasks
    pub name: String,
}

impl Recipients {
    /// Whether nobody can be reached
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

/// Resolves notification recipients for a task
///
/// A user task notifies that user; a group task notifies every member that
/// still exists and has an address.
pub fn recipients_for(task: &Task, users: &[User], groups: &[Group]) -> Recipients {
    match task.assignee_type {
        AssigneeType::User => match users.iter().find(|u| u.id == task.assignee_id) {
            Some(user) if !user.email.is_empty() => Recipients {
                emails: vec![user.email.clone()],
                name: user.name.clone(),
            },
            Some(user) => Recipients {
                emails: vec![],
                name: user.name.clone(),
            },
            None => Recipients {
                emails: vec![],
                name: UNKNOWN.to_string(),
            },
        },
        AssigneeType::Group => match groups.iter().find(|g| g.id == task.assignee_id) {
            Some(group) => Recipients {
                emails: group
                    .member_ids
                    .iter()
                    .filter_map(|id| users.iter().find(|u| &u.id == id))
                    .map(|u| u.email.clone())
                    .filter(|e| !e.is_empty())
                    .collect(),
                name: group.name.clone(),
            },
            None => Recipients {
                emails: vec![],
                name: UNKNOWN.to_string(),
            },
        },
    }
}

/// Deep link to a task: `{base}?taskId={id}`
///
/// A single trailing slash on `base_url` is dropped.
pub fn task_link(base_url: &str, task_id: &str) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    format!("{}?taskId={}", base, task_id)
}
