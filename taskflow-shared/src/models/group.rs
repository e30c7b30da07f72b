/// Group model
///
/// A group is a named, ordered set of executor ids. Tasks assigned to a group
/// are visible to every *current* member: membership is read live on every
/// visibility check and never snapshotted onto the task.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{new_id, Entity};

/// Group document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Unique group ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Member user ids, in the order they were added
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// Input for creating a new group
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroup {
    /// Display name
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,

    /// Initial members
    #[validate(length(min = 1, message = "a group needs at least one member"))]
    pub member_ids: Vec<String>,
}

impl Group {
    /// Builds a group document with a fresh id
    ///
    /// Repeated member ids are collapsed, keeping the first occurrence.
    pub fn from_create(input: CreateGroup) -> Self {
        let mut group = Group {
            id: new_id("g"),
            name: input.name,
            member_ids: Vec::with_capacity(input.member_ids.len()),
        };
        for member in input.member_ids {
            group.add_member(member);
        }
        group
    }

    /// Whether `user_id` is currently a member
    pub fn has_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|m| m == user_id)
    }

    /// Adds a member if not already present
    ///
    /// Returns `true` if the member was added.
    pub fn add_member(&mut self, user_id: impl Into<String>) -> bool {
        let user_id = user_id.into();
        if self.has_member(&user_id) {
            return false;
        }
        self.member_ids.push(user_id);
        true
    }

    /// Removes a member
    ///
    /// Returns `true` if the member was present.
    pub fn remove_member(&mut self, user_id: &str) -> bool {
        let before = self.member_ids.len();
        self.member_ids.retain(|m| m != user_id);
        before != self.member_ids.len()
    }
}

impl Entity for Group {
    const COLLECTION: &'static str = "groups";

    fn id(&self) -> &str {
        &self.id
    }
}
