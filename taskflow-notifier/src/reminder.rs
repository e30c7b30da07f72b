/// Daily overdue-reminder routine
///
/// Once per local calendar day, sends a reminder for every task that has
/// missed its expected progress report.
///
/// # Gate
///
/// The routine only runs when all of these hold:
///
/// - the notification preference is EMAILJS and the relay credentials are complete
/// - the tasks and config collections have loaded
/// - `lastAutoReminderSentAt` is absent or before local midnight today
///
/// The first thing a run does is save `lastAutoReminderSentAt = now`, so a
/// second process checking the gate moments later sees today's run and skips.
/// Two processes passing the gate before either save lands can still both
/// send; that window is accepted.
///
/// # Per task
///
/// A reminder goes to every resolvable recipient of the overdue task. When
/// the relay accepts it, the task is stamped with `lastReminderSentAt = now`
/// and `lastReportedAfterReminder = false`. Failures are counted and logged;
/// nothing is retried until the next day's run.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskflow_notifier::notifiers::EmailJsNotifier;
/// use taskflow_notifier::reminder::ReminderRoutine;
/// use taskflow_shared::store::Store;
/// use taskflow_shared::sync::SyncLayer;
///
/// # async fn example() -> anyhow::Result<()> {
/// let sync = Arc::new(SyncLayer::mount(Store::local("./data")?).await?);
/// let routine = ReminderRoutine::new(sync, Arc::new(EmailJsNotifier::new()));
///
/// let shutdown = routine.shutdown_token();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     shutdown.cancel();
/// });
///
/// routine.run().await;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use taskflow_shared::models::{now_millis, SystemConfig};
use taskflow_shared::rules::{daily_reminder_due, overdue_tasks};
use taskflow_shared::sync::{LoadState, SyncLayer, SyncResult};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::messages::reminder_request;
use crate::notifiers::Notifier;

/// Reminder routine configuration
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// How often the gate is checked, in seconds
    pub check_interval_secs: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        ReminderConfig {
            check_interval_secs: 3600,
        }
    }
}

/// Result of one pass of the routine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderOutcome {
    /// Whether the gate opened
    pub ran: bool,

    /// Reminders accepted by the notifier
    pub sent: usize,

    /// Reminders the notifier rejected, or whose task stamp failed to save
    pub failed: usize,

    /// Overdue tasks with nobody to notify
    pub skipped: usize,
}

/// Sends daily reminders for overdue tasks
pub struct ReminderRoutine {
    sync: Arc<SyncLayer>,
    notifier: Arc<dyn Notifier>,
    config: ReminderConfig,
    shutdown: CancellationToken,
}

impl ReminderRoutine {
    pub fn new(sync: Arc<SyncLayer>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_config(sync, notifier, ReminderConfig::default())
    }

    pub fn with_config(
        sync: Arc<SyncLayer>,
        notifier: Arc<dyn Notifier>,
        config: ReminderConfig,
    ) -> Self {
        ReminderRoutine {
            sync,
            notifier,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops [`ReminderRoutine::run`] when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Checks the gate on every interval tick until shut down
    pub async fn run(&self) {
        tracing::info!(
            notifier = self.notifier.name(),
            interval_secs = self.config.check_interval_secs,
            "Reminder routine starting"
        );

        tokio::select! {
            _ = self.shutdown.cancelled() => {
                tracing::info!("Reminder routine shut down");
                return;
            }
            _ = self.sync.wait_until_ready() => {}
        }

        let mut ticker = interval(Duration::from_secs(self.config.check_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Reminder routine shut down");
                    return;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(outcome) if outcome.ran => tracing::info!(
                            sent = outcome.sent,
                            failed = outcome.failed,
                            skipped = outcome.skipped,
                            "Daily reminders processed"
                        ),
                        Ok(_) => tracing::debug!("Daily reminders not due"),
                        Err(e) => tracing::error!(error = %e, "Daily reminder run failed"),
                    }
                }
            }
        }
    }

    pub async fn run_once(&self) -> SyncResult<ReminderOutcome> {
        self.run_once_at(now_millis()).await
    }

    /// One pass of the routine as of `now` (epoch millis)
    ///
    /// # Errors
    ///
    /// Only a failure to claim the day's run (saving the config) is an
    /// error; delivery problems are counted in the outcome.
    pub async fn run_once_at(&self, now: i64) -> SyncResult<ReminderOutcome> {
        let mut outcome = ReminderOutcome::default();

        let (config, loaded) = {
            let replica = self.sync.read();
            let loaded = replica.states.tasks == LoadState::Live
                && replica.states.config == LoadState::Live;
            (replica.config.clone(), loaded)
        };

        if !loaded
            || !config.sends_automatically()
            || !daily_reminder_due(config.last_auto_reminder_sent_at, now)
        {
            return Ok(outcome);
        }

        // Claim today's run before sending anything
        let claimed = SystemConfig {
            last_auto_reminder_sent_at: Some(now),
            ..config
        };
        self.sync.save_config(&claimed).await?;
        outcome.ran = true;

        let pending: Vec<_> = {
            let replica = self.sync.read();
            overdue_tasks(&replica.tasks, now)
                .into_iter()
                .map(|task| {
                    (
                        task.id.clone(),
                        reminder_request(task, &replica.users, &replica.groups, &claimed),
                    )
                })
                .collect()
        };

        tracing::info!(overdue = pending.len(), "Sending daily reminders");

        for (task_id, request) in pending {
            if request.to_emails.is_empty() {
                tracing::debug!(task_id = %task_id, "Overdue task has no recipients");
                outcome.skipped += 1;
                continue;
            }

            if let Err(e) = self.notifier.deliver(&request).await {
                tracing::warn!(task_id = %task_id, error = %e, "Reminder delivery failed");
                outcome.failed += 1;
                continue;
            }

            // Stamp the latest copy; skip tasks deleted while sending
            let Some(mut task) = self.sync.task(&task_id) else {
                outcome.sent += 1;
                continue;
            };
            task.last_reminder_sent_at = Some(now);
            task.last_reported_after_reminder = Some(false);

            match self.sync.update_task(&task).await {
                Ok(()) => {
                    tracing::debug!(task_id = %task_id, "Reminder sent");
                    outcome.sent += 1;
                }
                Err(e) => {
                    tracing::warn!(task_id = %task_id, error = %e, "Failed to record reminder");
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }
}
