/// Notification messages
///
/// Builds [`NotificationRequest`]s for the three messages the system sends:
///
/// - **Assignment notice**: sent after a task is created, to the assignee
///   (every member for group tasks), using the default template
/// - **Overdue reminder**: sent by the reminder routine, using the reminder
///   template when one is configured
/// - **Test message**: sent from the settings screen to check credentials
///
/// Recipients and names come from the live replica; a deleted assignee
/// yields no recipients and the name `Unknown`.

use chrono::{Local, TimeZone};
use taskflow_shared::models::{Group, SystemConfig, Task, User};
use taskflow_shared::rules::{recipients_for, task_link};
use taskflow_shared::sync::SyncLayer;

use crate::notifiers::{
    Delivery, NotificationRequest, Notifier, NotifyError, NotifyResult, RelayCredentials,
};

const SIGNATURE: &str = "TaskFlow notification";

/// Due date as a local calendar date
fn due_date_label(due_date: i64) -> String {
    Local
        .timestamp_millis_opt(due_date)
        .single()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Assignment notice for a newly created task
pub fn assignment_request(
    task: &Task,
    users: &[User],
    groups: &[Group],
    config: &SystemConfig,
) -> NotificationRequest {
    let recipients = recipients_for(task, users, groups);
    let link = task_link(&config.system_base_url, &task.id);

    let message = format!(
        "Hello,\n\nYou have been assigned a new task.\n\nTask: {}\nDue date: {}\n\nReport progress here:\n{}\n\n{}",
        task.title,
        due_date_label(task.due_date),
        link,
        SIGNATURE
    );

    NotificationRequest {
        credentials: RelayCredentials::from_config(config, &config.email_js_template_id),
        to_emails: recipients.emails,
        to_name: recipients.name,
        subject: format!("[Task Assignment] {}", task.title),
        message,
        task_link: link,
    }
}

/// Reminder for a task whose progress report is overdue
pub fn reminder_request(
    task: &Task,
    users: &[User],
    groups: &[Group],
    config: &SystemConfig,
) -> NotificationRequest {
    let recipients = recipients_for(task, users, groups);
    let link = task_link(&config.system_base_url, &task.id);

    let message = format!(
        "Hello {},\n\nA progress report for \"{}\" is overdue ({} reporting).\nCurrent progress: {}%\n\nPlease report here:\n{}\n\n{}",
        recipients.name,
        task.title,
        task.reporting_frequency.as_str(),
        task.progress,
        link,
        SIGNATURE
    );

    NotificationRequest {
        credentials: RelayCredentials::from_config(config, config.reminder_template_id()),
        to_emails: recipients.emails,
        to_name: recipients.name,
        subject: format!("[Report Overdue] {}", task.title),
        message,
        task_link: link,
    }
}

/// Test message for checking the delivery settings
pub fn test_request(config: &SystemConfig, to_email: &str, link: &str) -> NotificationRequest {
    NotificationRequest {
        credentials: RelayCredentials::from_config(config, &config.email_js_template_id),
        to_emails: vec![to_email.trim().to_string()],
        to_name: "Test recipient".to_string(),
        subject: "TaskFlow test message".to_string(),
        message: "This is a test message from TaskFlow. If you received it, notification delivery is set up correctly.".to_string(),
        task_link: link.to_string(),
    }
}

/// Sends the assignment notice for `task`
///
/// The task is already stored when this runs; a failure is returned to the
/// caller to report and leaves the task untouched.
pub async fn notify_assignment(
    notifier: &dyn Notifier,
    sync: &SyncLayer,
    task: &Task,
) -> NotifyResult<Delivery> {
    let request = {
        let replica = sync.read();
        assignment_request(task, &replica.users, &replica.groups, &replica.config)
    };

    match notifier.deliver(&request).await {
        Ok(delivery) => {
            tracing::info!(task_id = %task.id, notifier = notifier.name(), "Assignment notice delivered");
            Ok(delivery)
        }
        Err(e) => {
            tracing::warn!(task_id = %task.id, notifier = notifier.name(), error = %e, "Assignment notice failed");
            Err(e)
        }
    }
}

/// Sends a test message to `to_email`
pub async fn send_test_message(
    notifier: &dyn Notifier,
    config: &SystemConfig,
    to_email: &str,
    link: &str,
) -> NotifyResult<Delivery> {
    if to_email.trim().is_empty() {
        return Err(NotifyError::NoRecipients);
    }

    let delivery = notifier.deliver(&test_request(config, to_email, link)).await;
    if let Err(e) = &delivery {
        tracing::warn!(notifier = notifier.name(), error = %e, "Test message failed");
    }
    delivery
}
