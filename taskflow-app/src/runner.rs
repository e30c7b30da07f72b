/// Headless runner
///
/// Keeps one session reconciled with the live replica and runs the daily
/// reminder routine beside it until shut down.
///
/// ```text
/// sync.changes() ──► session.refresh() ──► log state transitions / notices
/// interval tick  ──► reminder routine  ──► mail relay
/// ```

use taskflow_shared::session::{Session, SessionState};
use tokio_util::sync::CancellationToken;

use crate::bootstrap::App;

fn log_state(state: &SessionState) {
    match state {
        SessionState::Setup => tracing::info!("No users yet; waiting for initial setup"),
        SessionState::Login => tracing::info!("Waiting for sign-in"),
        SessionState::Authenticated { user, view } => tracing::info!(
            user_id = %user.id,
            role = user.role.as_str(),
            view = ?view,
            "Signed in"
        ),
    }
}

/// Applies the latest replica to `session`, logging anything that changed
///
/// Returns the state after the refresh.
pub fn reconcile(session: &mut Session) -> SessionState {
    let before = session.state();
    if let Err(e) = session.refresh() {
        tracing::warn!(error = %e, "Session refresh failed");
    }

    let after = session.state();
    if after != before {
        log_state(&after);
    }
    if let Some(task_id) = session.selected_task_id() {
        tracing::debug!(task_id = %task_id, "Task open");
    }
    if let Some(notice) = session.take_notice() {
        tracing::warn!(notice = %notice, "Session notice");
    }
    after
}

/// Runs until `shutdown` is cancelled
pub async fn run(app: &App, shutdown: CancellationToken) -> anyhow::Result<()> {
    let routine = app.reminder_routine();
    let reminders_shutdown = routine.shutdown_token();
    let reminders = tokio::spawn(async move { routine.run().await });

    let mut session = app.session()?;
    log_state(&session.state());
    reconcile(&mut session);

    let mut changes = app.sync.changes();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    tracing::warn!("Sync layer closed");
                    break;
                }
                reconcile(&mut session);
            }
        }
    }

    reminders_shutdown.cancel();
    if let Err(e) = reminders.await {
        tracing::error!(error = %e, "Reminder routine panicked");
    }

    session.teardown();
    app.shutdown();
    tracing::info!("Runner stopped");
    Ok(())
}
