/// Domain rules
///
/// Pure functions over entity snapshots. Nothing in this module performs
/// I/O, holds state, or fails on inconsistent data: a dangling user or group
/// id degrades to "not visible", "not overdue" or [`lookup::UNKNOWN`].
///
/// # Modules
///
/// - [`visibility`]: which tasks a user may see
/// - [`reports`]: missed-report detection and the daily reminder gate
/// - [`coupling`]: status/progress coupling applied at the point of edit
/// - [`workload`]: estimated-vs-actual hours and dashboard statistics
/// - [`lookup`]: total name lookups, notification recipients, deep links
///
/// Derived values are recomputed from the snapshot on every call; there is
/// no cached "overdue" or "visible" flag anywhere in the system.

pub mod coupling;
pub mod lookup;
pub mod reports;
pub mod visibility;
pub mod workload;

pub use coupling::StatusProgress;
pub use lookup::{assignee_name, group_name, recipients_for, task_link, user_name, Recipients, UNKNOWN};
pub use reports::{daily_reminder_due, is_overdue, overdue_tasks};
pub use visibility::{is_visible_to, tasks_for_user};
pub use workload::{dashboard_stats, workload, DashboardStats, Workload};
