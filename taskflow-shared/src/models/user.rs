/// User model
///
/// Users are either managers (create tasks, administer users, groups and
/// system settings) or executors (report progress on tasks visible to them).
///
/// # Document
///
/// ```json
/// {
///   "id": "u-4f1c…",
///   "name": "Mei Lin",
///   "email": "mei@example.com",
///   "role": "EXECUTOR",
///   "password": "secret",
///   "avatar": "https://…"
/// }
/// ```
///
/// `password` is compared in plaintext and may be absent on legacy
/// documents; such users log in without a password. `email` is used for
/// notification delivery and is unique in practice only.
///
/// Deleting a user does not touch tasks still assigned to its id; lookups
/// against the live collection resolve those ids as unknown.
///
/// # Example
///
/// ```
/// use taskflow_shared::models::user::{CreateUser, User, UserRole};
///
/// let user = User::from_create(CreateUser {
///     name: "Mei Lin".to_string(),
///     email: "mei@example.com".to_string(),
///     role: UserRole::Executor,
///     password: Some("secret".to_string()),
///     avatar: None,
/// });
/// assert!(user.id.starts_with("u-"));
/// assert!(user.password_matches("secret"));
/// ```

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{new_id, Entity};

/// Role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Creates tasks and administers users, groups and settings
    Manager,

    /// Performs assigned tasks and reports progress
    Executor,
}

impl UserRole {
    /// Converts role to its persisted string
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Manager => "MANAGER",
            UserRole::Executor => "EXECUTOR",
        }
    }

    /// Managers see every task
    pub fn can_view_all_tasks(&self) -> bool {
        matches!(self, UserRole::Manager)
    }

    /// Managers administer users, groups and settings
    pub fn can_manage_users(&self) -> bool {
        matches!(self, UserRole::Manager)
    }
}

/// User document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Address used for notifications
    pub email: String,

    /// Manager or executor
    pub role: UserRole,

    /// Plaintext password; absent on legacy users
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Optional avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    /// Display name
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,

    /// Notification address
    #[validate(email(message = "a valid email is required"))]
    pub email: String,

    /// Role of the new user
    pub role: UserRole,

    /// Optional initial password
    pub password: Option<String>,

    /// Optional avatar URL
    pub avatar: Option<String>,
}

impl User {
    /// Builds a user document with a fresh id
    pub fn from_create(input: CreateUser) -> Self {
        User {
            id: new_id("u"),
            name: input.name,
            email: input.email,
            role: input.role,
            password: input.password.filter(|p| !p.is_empty()),
            avatar: input.avatar,
        }
    }

    /// Checks a supplied password
    ///
    /// Users without a stored password, or with an empty one, accept any
    /// input.
    pub fn password_matches(&self, supplied: &str) -> bool {
        match &self.password {
            None => true,
            Some(stored) if stored.is_empty() => true,
            Some(stored) => stored == supplied,
        }
    }

    /// Convenience check for the manager role
    pub fn is_manager(&self) -> bool {
        self.role == UserRole::Manager
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }
}
