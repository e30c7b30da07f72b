/// Task model
///
/// A task is assigned either to a single user or to a group, carries a
/// reporting frequency that drives missed-report detection, and accumulates
/// progress logs from executors.
///
/// # Document
///
/// ```json
/// {
///   "id": "task-9b2e…",
///   "title": "Quarterly stock count",
///   "description": "Count warehouse B",
///   "assigneeId": "g-ops",
///   "assigneeType": "GROUP",
///   "startDate": 1760000000000,
///   "dueDate": 1760600000000,
///   "estimatedDuration": 8,
///   "status": "IN_PROGRESS",
///   "progress": 40,
///   "reportingFrequency": "DAILY",
///   "lastReportedAt": 1760086400000,
///   "logs": [ { "id": "log-…", "timestamp": 1760086400000, "hoursSpent": 2, "comment": "…" } ],
///   "subtasks": [ { "id": "st-…", "title": "Aisle 1-4", "isCompleted": true } ]
/// }
/// ```
///
/// # Invariants
///
/// - `logs` is newest first and append-only; the only permitted change to a
///   historical entry is adding `managerReply` / `managerReplyAt`.
/// - `status` and `progress` are coupled only at the point of a user edit
///   (see `rules::coupling`); stored documents may disagree.
/// - `dueDate >= startDate` is expected but not enforced.
///
/// Older documents used `reminderFrequency` for the reporting frequency; it
/// is still accepted on read.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use validator::Validate;

use super::{new_id, Entity};

/// Largest inline attachment accepted on a progress log, in encoded bytes
pub const MAX_ATTACHMENT_BYTES: usize = 800 * 1024;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Task execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not started yet
    Pending,

    /// Being worked on
    InProgress,

    /// Stuck, needs attention
    Blocked,

    /// Finished
    Completed,
}

impl TaskStatus {
    /// All statuses, in dashboard order
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Blocked,
    ];

    /// Converts status to its persisted string
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Blocked => "BLOCKED",
            TaskStatus::Completed => "COMPLETED",
        }
    }
}

/// Whether a task is delegated to a user or a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssigneeType {
    User,
    Group,
}

/// How often an executor is expected to report progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportingFrequency {
    /// No reporting expectation; never overdue
    #[default]
    None,
    Hourly,
    Daily,
    Weekly,
    /// Fixed 30-day window, not calendar aware
    Monthly,
}

impl ReportingFrequency {
    /// Maximum silence before a report counts as missed, in milliseconds
    ///
    /// Returns `None` for [`ReportingFrequency::None`].
    pub fn threshold_millis(&self) -> Option<i64> {
        match self {
            ReportingFrequency::None => None,
            ReportingFrequency::Hourly => Some(MILLIS_PER_HOUR),
            ReportingFrequency::Daily => Some(24 * MILLIS_PER_HOUR),
            ReportingFrequency::Weekly => Some(168 * MILLIS_PER_HOUR),
            ReportingFrequency::Monthly => Some(720 * MILLIS_PER_HOUR),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportingFrequency::None => "NONE",
            ReportingFrequency::Hourly => "HOURLY",
            ReportingFrequency::Daily => "DAILY",
            ReportingFrequency::Weekly => "WEEKLY",
            ReportingFrequency::Monthly => "MONTHLY",
        }
    }
}

/// One progress report from an executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressLog {
    /// Unique log ID
    pub id: String,

    /// When the report was submitted (epoch millis)
    pub timestamp: i64,

    /// Hours spent since the previous report
    pub hours_spent: f64,

    /// Free-text comment
    #[serde(default)]
    pub comment: String,

    /// Original attachment file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,

    /// Inline-encoded attachment (data URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_data: Option<String>,

    /// Manager's reply, added after the fact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_reply: Option<String>,

    /// When the manager replied (epoch millis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_reply_at: Option<i64>,
}

/// Checklist item on a task; informational only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
}

/// Task document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task ID
    pub id: String,

    /// Short title
    pub title: String,

    /// Longer description
    #[serde(default)]
    pub description: String,

    /// User id or group id, depending on `assignee_type`
    pub assignee_id: String,

    /// Whether `assignee_id` names a user or a group
    pub assignee_type: AssigneeType,

    /// When the task was assigned (epoch millis)
    pub start_date: i64,

    /// Deadline (epoch millis)
    pub due_date: i64,

    /// Estimated effort in hours
    #[serde(default)]
    pub estimated_duration: f64,

    /// Current status
    pub status: TaskStatus,

    /// Completion percentage, 0 to 100
    #[serde(default)]
    pub progress: u8,

    /// Expected reporting cadence
    #[serde(default, alias = "reminderFrequency")]
    pub reporting_frequency: ReportingFrequency,

    /// When the last progress report arrived (epoch millis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reported_at: Option<i64>,

    /// When the last automatic reminder went out (epoch millis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reminder_sent_at: Option<i64>,

    /// Whether a report arrived after the last reminder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reported_after_reminder: Option<bool>,

    /// Progress logs, newest first
    #[serde(default)]
    pub logs: Vec<ProgressLog>,

    /// Optional checklist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<SubTask>>,
}

/// Input for creating a new task
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    /// Short title
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,

    /// Longer description
    #[serde(default)]
    pub description: String,

    /// User or group id
    #[validate(length(min = 1, message = "an assignee is required"))]
    pub assignee_id: String,

    /// Whether the assignee is a user or a group
    pub assignee_type: AssigneeType,

    /// Deadline (epoch millis)
    pub due_date: i64,

    /// Estimated effort in hours
    #[validate(range(min = 0.0, message = "estimated duration cannot be negative"))]
    pub estimated_duration: f64,

    /// Expected reporting cadence
    #[serde(default)]
    pub reporting_frequency: ReportingFrequency,

    /// Checklist titles
    #[serde(default)]
    pub subtasks: Vec<String>,
}

/// Inline attachment submitted with a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Original file name
    pub name: String,

    /// Encoded content (data URL)
    pub data: String,
}

/// Input for an executor's progress report
///
/// `status` and `progress` are the values after the coupling rules were
/// applied at the point of edit; they are stored as given.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    /// Hours spent since the previous report
    #[validate(range(min = 0.0, message = "hours spent cannot be negative"))]
    pub hours_spent: f64,

    /// Free-text comment
    #[serde(default)]
    pub comment: String,

    /// Status after this report
    pub status: TaskStatus,

    /// Progress after this report
    #[validate(range(max = 100, message = "progress must be between 0 and 100"))]
    pub progress: u8,

    /// Optional inline attachment
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

impl Task {
    /// Builds a pending task document with a fresh id
    pub fn from_create(input: CreateTask, now: i64) -> Self {
        let subtasks = if input.subtasks.is_empty() {
            None
        } else {
            Some(
                input
                    .subtasks
                    .into_iter()
                    .map(|title| SubTask {
                        id: new_id("st"),
                        title,
                        is_completed: false,
                    })
                    .collect(),
            )
        };

        Task {
            id: new_id("task"),
            title: input.title,
            description: input.description,
            assignee_id: input.assignee_id,
            assignee_type: input.assignee_type,
            start_date: now,
            due_date: input.due_date,
            estimated_duration: input.estimated_duration,
            status: TaskStatus::Pending,
            progress: 0,
            reporting_frequency: input.reporting_frequency,
            last_reported_at: None,
            last_reminder_sent_at: None,
            last_reported_after_reminder: None,
            logs: Vec::new(),
            subtasks,
        }
    }

    /// Total hours across all logs
    pub fn hours_logged(&self) -> f64 {
        self.logs.iter().map(|l| l.hours_spent).sum()
    }

    /// Finds a log entry by id
    pub fn log(&self, log_id: &str) -> Option<&ProgressLog> {
        self.logs.iter().find(|l| l.id == log_id)
    }
}

impl ProgressLog {
    /// Builds a log entry from a report
    pub fn from_report(report: &ProgressReport, now: i64) -> Self {
        ProgressLog {
            id: new_id("log"),
            timestamp: now,
            hours_spent: report.hours_spent,
            comment: report.comment.clone(),
            attachment_name: report.attachment.as_ref().map(|a| a.name.clone()),
            attachment_data: report.attachment.as_ref().map(|a| a.data.clone()),
            manager_reply: None,
            manager_reply_at: None,
        }
    }
}

impl Attachment {
    /// Whether the encoded content fits under [`MAX_ATTACHMENT_BYTES`]
    pub fn within_limit(&self) -> bool {
        self.data.len() <= MAX_ATTACHMENT_BYTES
    }
}

impl Entity for Task {
    const COLLECTION: &'static str = "tasks";

    fn id(&self) -> &str {
        &self.id
    }

    /// Newest assignment first
    fn canonical_order(a: &Self, b: &Self) -> Ordering {
        b.start_date
            .cmp(&a.start_date)
            .then_with(|| a.id.cmp(&b.id))
    }
}
