/// Workload aggregation and dashboard statistics
///
/// Workload compares estimated hours against hours actually logged, per user.
/// Only tasks assigned directly to a user count toward that user; group tasks
/// are left out rather than split between members.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::{AssigneeType, Task, TaskStatus, User};

/// Estimated vs. actual hours for one user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    pub user_id: String,
    pub user_name: String,
    /// Sum of `estimatedDuration` over directly assigned tasks
    pub estimated_hours: f64,
    /// Sum of `hoursSpent` over the logs of those tasks
    pub actual_hours: f64,
    /// Number of directly assigned tasks
    pub task_count: usize,
}

/// Aggregates workload for every user, in the order of `users`
///
/// Users without tasks get a zero row. Tasks assigned to ids that match no
/// user are ignored.
pub fn workload(users: &[User], tasks: &[Task]) -> Vec<Workload> {
    let mut totals: HashMap<&str, (f64, f64, usize)> = HashMap::new();

    for task in tasks.iter().filter(|t| t.assignee_type == AssigneeType::User) {
        let entry = totals.entry(task.assignee_id.as_str()).or_default();
        entry.0 += task.estimated_duration;
        entry.1 += task.hours_logged();
        entry.2 += 1;
    }

    users
        .iter()
        .map(|u| {
            let (estimated, actual, count) = totals.get(u.id.as_str()).copied().unwrap_or_default();
            Workload {
                user_id: u.id.clone(),
                user_name: u.name.clone(),
                estimated_hours: estimated,
                actual_hours: actual,
                task_count: count,
            }
        })
        .collect()
}

/// Headline numbers for the manager dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub blocked: usize,
    pub completed: usize,
    /// Completed share of all tasks, rounded to a whole percent
    pub completion_rate: u8,
}

impl DashboardStats {
    /// Count for one status
    pub fn count(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::InProgress => self.in_progress,
            TaskStatus::Blocked => self.blocked,
            TaskStatus::Completed => self.completed,
        }
    }
}

/// Counts tasks per status
pub fn dashboard_stats(tasks: &[Task]) -> DashboardStats {
    let mut stats = DashboardStats {
        total: tasks.len(),
        ..Default::default()
    };

    for task in tasks {
        match task.status {
            TaskStatus::Pending => stats.pending += 1,
            TaskStatus::InProgress => stats.in_progress += 1,
            TaskStatus::Blocked => stats.blocked += 1,
            TaskStatus::Completed => stats.completed += 1,
        }
    }

    if stats.total > 0 {
        let rate = (stats.completed as f64 / stats.total as f64 * 100.0).round();
        stats.completion_rate = rate as u8;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProgressLog, ReportingFrequency, UserRole};

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: format!("name-{}", id),
            email: format!("{}@example.com", id),
            role: UserRole::Executor,
            password: None,
            avatar: None,
        }
    }

    fn log(hours: f64) -> ProgressLog {
        ProgressLog {
            id: "log".to_string(),
            timestamp: 0,
            hours_spent: hours,
            comment: String::new(),
            attachment_name: None,
            attachment_data: None,
            manager_reply: None,
            manager_reply_at: None,
        }
    }

    fn task(assignee_type: AssigneeType, assignee: &str, estimate: f64, logs: Vec<ProgressLog>, status: TaskStatus) -> Task {
        Task {
            id: format!("t-{}-{}", assignee, estimate),
            title: "T".to_string(),
            description: String::new(),
            assignee_id: assignee.to_string(),
            assignee_type,
            start_date: 0,
            due_date: 0,
            estimated_duration: estimate,
            status,
            progress: 0,
            reporting_frequency: ReportingFrequency::None,
            last_reported_at: None,
            last_reminder_sent_at: None,
            last_reported_after_reminder: None,
            logs,
            subtasks: None,
        }
    }

    #[test]
    fn test_workload_direct_tasks_only() {
        let users = vec![user("u-1"), user("u-2")];
        let tasks = vec![
            task(AssigneeType::User, "u-1", 8.0, vec![log(2.0), log(1.5)], TaskStatus::InProgress),
            task(AssigneeType::User, "u-1", 4.0, vec![log(4.0)], TaskStatus::Completed),
            task(AssigneeType::Group, "u-1", 100.0, vec![log(50.0)], TaskStatus::InProgress),
            task(AssigneeType::User, "u-gone", 3.0, vec![], TaskStatus::Pending),
        ];

        let rows = workload(&users, &tasks);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, "u-1");
        assert_eq!(rows[0].estimated_hours, 12.0);
        assert_eq!(rows[0].actual_hours, 7.5);
        assert_eq!(rows[0].task_count, 2);

        assert_eq!(rows[1].estimated_hours, 0.0);
        assert_eq!(rows[1].task_count, 0);
    }

    #[test]
    fn test_dashboard_stats() {
        let tasks = vec![
            task(AssigneeType::User, "a", 1.0, vec![], TaskStatus::Completed),
            task(AssigneeType::User, "b", 1.0, vec![], TaskStatus::Blocked),
            task(AssigneeType::User, "c", 1.0, vec![], TaskStatus::InProgress),
        ];
        let stats = dashboard_stats(&tasks);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.count(TaskStatus::Completed), 1);
        assert_eq!(stats.count(TaskStatus::Blocked), 1);
        assert_eq!(stats.count(TaskStatus::Pending), 0);
        assert_eq!(stats.completion_rate, 33);
    }

    #[test]
    fn test_dashboard_stats_empty() {
        assert_eq!(dashboard_stats(&[]), DashboardStats::default());
    }
}
