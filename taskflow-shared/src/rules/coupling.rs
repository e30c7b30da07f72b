/// Status/progress coupling
///
/// Applied at the single point where a user edits a task's status or
/// progress, never as an after-the-fact check on stored documents:
///
/// - setting status `COMPLETED` forces progress to 100
/// - setting progress to 100 forces status `COMPLETED`
/// - lowering progress below 100 while `COMPLETED` reverts to `IN_PROGRESS`
/// - every other combination is accepted as-is
///
/// # Example
///
/// ```
/// use taskflow_shared::models::TaskStatus;
/// use taskflow_shared::rules::StatusProgress;
///
/// let edit = StatusProgress::new(TaskStatus::InProgress, 40).with_progress(100);
/// assert_eq!(edit.status, TaskStatus::Completed);
///
/// let edit = edit.with_progress(50);
/// assert_eq!(edit.status, TaskStatus::InProgress);
/// ```

use serde::{Deserialize, Serialize};

use crate::models::{Task, TaskStatus};

/// A task's status and progress under edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusProgress {
    pub status: TaskStatus,
    pub progress: u8,
}

impl StatusProgress {
    /// Starts an edit from explicit values
    ///
    /// No coupling is applied; the values are taken as they are.
    pub fn new(status: TaskStatus, progress: u8) -> Self {
        StatusProgress { status, progress }
    }

    /// Starts an edit from a task's stored values
    pub fn of(task: &Task) -> Self {
        StatusProgress::new(task.status, task.progress)
    }

    /// The user picked a new status
    pub fn with_status(self, status: TaskStatus) -> Self {
        if status == TaskStatus::Completed {
            return StatusProgress::new(status, 100);
        }
        StatusProgress::new(status, self.progress)
    }

    /// The user moved the progress slider
    ///
    /// Values above 100 are clamped.
    pub fn with_progress(self, progress: u8) -> Self {
        let progress = progress.min(100);
        if progress == 100 {
            return StatusProgress::new(TaskStatus::Completed, 100);
        }
        if self.status == TaskStatus::Completed {
            return StatusProgress::new(TaskStatus::InProgress, progress);
        }
        StatusProgress::new(self.status, progress)
    }

    /// Moves to a requested pair, applying whichever side changed
    ///
    /// A status change is applied first, then a progress change measured
    /// against the starting progress.
    pub fn edited_to(self, status: TaskStatus, progress: u8) -> Self {
        let mut edit = self;
        if status != self.status {
            edit = edit.with_status(status);
        }
        if progress != self.progress {
            edit = edit.with_progress(progress);
        }
        edit
    }

    /// Writes the values back onto a task
    pub fn apply_to(self, task: &mut Task) {
        task.status = self.status;
        task.progress = self.progress;
    }
}
