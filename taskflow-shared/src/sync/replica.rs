/// In-memory read replica
///
/// Holds the latest snapshot of each collection. A snapshot always replaces
/// a collection wholesale; nothing else writes here.

use serde::Serialize;

use crate::models::{Group, SystemConfig, Task, User};

/// Lifecycle of one collection in the replica
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// Not subscribed yet
    #[default]
    Uninitialized,

    /// Subscribed, waiting for the first snapshot
    Loading,

    /// At least one snapshot applied
    Live,
}

/// Load state of every collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStates {
    pub users: LoadState,
    pub groups: LoadState,
    pub tasks: LoadState,
    pub config: LoadState,
}

impl CollectionStates {
    pub(crate) fn all(state: LoadState) -> Self {
        CollectionStates {
            users: state,
            groups: state,
            tasks: state,
            config: state,
        }
    }
}

/// Latest known state of every collection
#[derive(Debug, Clone, Default)]
pub struct Replica {
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    pub tasks: Vec<Task>,
    pub config: SystemConfig,
    pub states: CollectionStates,
}

impl Replica {
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Whether the first tasks snapshot has arrived
    ///
    /// Users, groups and config do not gate readiness.
    pub fn is_ready(&self) -> bool {
        self.states.tasks == LoadState::Live
    }
}
