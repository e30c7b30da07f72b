/// Missed-report detection and the daily reminder gate
///
/// A task is overdue when the time since its last report (or since it was
/// assigned, if nobody has reported yet) exceeds the threshold of its
/// reporting frequency. Completed tasks and tasks without a frequency are
/// never overdue.
///
/// ```text
/// elapsed = now - (lastReportedAt ?? startDate)
/// overdue = status != COMPLETED && frequency != NONE && elapsed > threshold
/// ```

use chrono::{DateTime, Duration, Local, TimeZone, Utc};

use crate::models::{Task, TaskStatus};

/// Whether `task` has missed its expected report at `now` (epoch millis)
pub fn is_overdue(task: &Task, now: i64) -> bool {
    if task.status == TaskStatus::Completed {
        return false;
    }

    let Some(threshold) = task.reporting_frequency.threshold_millis() else {
        return false;
    };

    let since = task.last_reported_at.unwrap_or(task.start_date);
    now.saturating_sub(since) > threshold
}

/// Tasks that have missed a report at `now`
pub fn overdue_tasks(tasks: &[Task], now: i64) -> Vec<&Task> {
    tasks.iter().filter(|t| is_overdue(t, now)).collect()
}

/// Whether the daily reminder routine should run at `now`
///
/// True if it has never run, or last ran before the start of the current
/// day in local time.
pub fn daily_reminder_due(last_run: Option<i64>, now: i64) -> bool {
    daily_reminder_due_in(&Local, last_run, now)
}

/// [`daily_reminder_due`] against an explicit time zone
pub fn daily_reminder_due_in<Tz: TimeZone>(tz: &Tz, last_run: Option<i64>, now: i64) -> bool {
    let Some(last_run) = last_run else {
        return true;
    };

    match start_of_day_millis(tz, now) {
        Some(start) => last_run < start,
        // Unrepresentable instant; run rather than skip a day silently
        None => true,
    }
}

/// Epoch millis of the first local instant of the day containing `now`
///
/// That is local midnight, or the end of the gap when a DST change skips
/// midnight.
fn start_of_day_millis<Tz: TimeZone>(tz: &Tz, now: i64) -> Option<i64> {
    let now_utc: DateTime<Utc> = Utc.timestamp_millis_opt(now).single()?;
    let local_date = now_utc.with_timezone(tz).date_naive();
    let midnight = local_date.and_hms_opt(0, 0, 0)?;

    (0..24 * 60)
        .find_map(|minute| {
            tz.from_local_datetime(&(midnight + Duration::minutes(minute)))
                .earliest()
        })
        .map(|start| start.timestamp_millis())
}
