/// Daily reminder routine against a local store
///
/// Run with: cargo test -p taskflow-notifier --test reminder_routine

use std::sync::Arc;
use taskflow_notifier::notifiers::MockNotifier;
use taskflow_notifier::reminder::ReminderRoutine;
use taskflow_notifier::{notify_assignment, NotifyError};
use taskflow_shared::models::{
    AssigneeType, CreateTask, CreateUser, NotificationPreference, ProgressReport,
    ReportingFrequency, SystemConfig, TaskStatus, UserRole,
};
use taskflow_shared::store::Store;
use taskflow_shared::sync::SyncLayer;
use tempfile::TempDir;

const DAY: i64 = 24 * 3_600_000;

fn relay_config() -> SystemConfig {
    SystemConfig {
        email_js_service_id: "service_gmail".to_string(),
        email_js_template_id: "template_default".to_string(),
        email_js_reminder_template_id: Some("template_overdue".to_string()),
        email_js_public_key: "pk".to_string(),
        system_base_url: "https://taskflow.example.com".to_string(),
        ..Default::default()
    }
}

fn executor(name: &str) -> CreateUser {
    CreateUser {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        role: UserRole::Executor,
        password: None,
        avatar: None,
    }
}

fn daily_task(title: &str, assignee_id: &str) -> CreateTask {
    CreateTask {
        title: title.to_string(),
        description: String::new(),
        assignee_id: assignee_id.to_string(),
        assignee_type: AssigneeType::User,
        due_date: 0,
        estimated_duration: 2.0,
        reporting_frequency: ReportingFrequency::Daily,
        subtasks: vec![],
    }
}

async fn mount(dir: &TempDir) -> Arc<SyncLayer> {
    Arc::new(SyncLayer::mount(Store::local(dir.path()).unwrap()).await.unwrap())
}

#[tokio::test]
async fn test_reminders_sent_once_per_day() {
    let dir = TempDir::new().unwrap();
    let sync = mount(&dir).await;
    sync.save_config(&relay_config()).await.unwrap();

    let eve = sync.add_user(executor("Eve")).await.unwrap();
    let bounce = sync.add_user(executor("Bounce")).await.unwrap();
    let gone = sync.add_user(executor("Gone")).await.unwrap();

    let overdue = sync.add_task(daily_task("Inventory", &eve.id)).await.unwrap();
    let bounced = sync.add_task(daily_task("Audit", &bounce.id)).await.unwrap();
    let orphan = sync.add_task(daily_task("Cleanup", &gone.id)).await.unwrap();
    let quiet = sync
        .add_task(CreateTask {
            reporting_frequency: ReportingFrequency::None,
            ..daily_task("Someday", &eve.id)
        })
        .await
        .unwrap();
    sync.delete_user(&gone.id).await.unwrap();

    let notifier = Arc::new(MockNotifier::new().failing_for("bounce@example.com"));
    let routine = ReminderRoutine::new(sync.clone(), notifier.clone());

    let now = overdue.start_date + 2 * DAY;
    let outcome = routine.run_once_at(now).await.unwrap();

    assert!(outcome.ran);
    assert_eq!(outcome.sent, 1);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(sync.config().last_auto_reminder_sent_at, Some(now));

    let reminded = sync.task(&overdue.id).unwrap();
    assert_eq!(reminded.last_reminder_sent_at, Some(now));
    assert_eq!(reminded.last_reported_after_reminder, Some(false));

    // Failed and unaddressed tasks are left as they were
    assert_eq!(sync.task(&bounced.id).unwrap().last_reminder_sent_at, None);
    assert_eq!(sync.task(&orphan.id).unwrap().last_reminder_sent_at, None);
    assert_eq!(sync.task(&quiet.id).unwrap().last_reminder_sent_at, None);

    let requests = notifier.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|r| r.credentials.template_id == "template_overdue"));

    // Same day: the gate stays closed
    let again = routine.run_once_at(now + 1).await.unwrap();
    assert!(!again.ran);
    assert_eq!(notifier.requests().len(), 2);
}

#[tokio::test]
async fn test_report_after_reminder_is_flagged() {
    let dir = TempDir::new().unwrap();
    let sync = mount(&dir).await;
    sync.save_config(&relay_config()).await.unwrap();

    let eve = sync.add_user(executor("Eve")).await.unwrap();
    let task = sync.add_task(daily_task("Inventory", &eve.id)).await.unwrap();

    let routine = ReminderRoutine::new(sync.clone(), Arc::new(MockNotifier::new()));
    let now = task.start_date + 2 * DAY;
    routine.run_once_at(now).await.unwrap();

    let reported = sync
        .submit_report_at(
            &task.id,
            ProgressReport {
                hours_spent: 1.5,
                comment: "Caught up".to_string(),
                status: TaskStatus::InProgress,
                progress: 20,
                attachment: None,
            },
            now + 3_600_000,
        )
        .await
        .unwrap();

    assert_eq!(reported.last_reported_after_reminder, Some(true));
    assert_eq!(reported.logs.len(), 1);
}

#[tokio::test]
async fn test_outlook_mode_never_runs() {
    let dir = TempDir::new().unwrap();
    let sync = mount(&dir).await;
    sync.save_config(&SystemConfig {
        notification_preference: NotificationPreference::Outlook,
        ..relay_config()
    })
    .await
    .unwrap();

    let eve = sync.add_user(executor("Eve")).await.unwrap();
    let task = sync.add_task(daily_task("Inventory", &eve.id)).await.unwrap();

    let notifier = Arc::new(MockNotifier::new());
    let routine = ReminderRoutine::new(sync.clone(), notifier.clone());
    let outcome = routine.run_once_at(task.start_date + 2 * DAY).await.unwrap();

    assert!(!outcome.ran);
    assert!(notifier.requests().is_empty());
    assert_eq!(sync.config().last_auto_reminder_sent_at, None);
}

#[tokio::test]
async fn test_failed_assignment_notice_keeps_task() {
    let dir = TempDir::new().unwrap();
    let sync = mount(&dir).await;
    sync.save_config(&relay_config()).await.unwrap();

    let eve = sync.add_user(executor("Eve")).await.unwrap();
    let task = sync.add_task(daily_task("Inventory", &eve.id)).await.unwrap();

    let notifier = MockNotifier::failing();
    let result = notify_assignment(&notifier, &sync, &task).await;

    assert!(matches!(result, Err(NotifyError::Delivery(_))));
    assert_eq!(sync.task(&task.id), Some(task));
    assert_eq!(notifier.requests()[0].subject, "[Task Assignment] Inventory");
}
