//! # TaskFlow Notifier Library
//!
//! Delivery of task notifications: assignment notices, overdue reminders and
//! the settings test message.
//!
//! ## Modules
//!
//! - `notifiers`: Delivery channels (mail relay, mail-client composition, mock)
//! - `messages`: Builds notification requests from tasks and configuration
//! - `reminder`: The daily overdue-reminder routine
//!
//! Delivery failures are reported to the caller and never touch task state
//! that was already written.
//!
//! ## Example
//!
//! ```no_run
//! use taskflow_notifier::notifiers::{MockNotifier, Notifier};
//!
//! let notifier = MockNotifier::new();
//! println!("Notifier: {}", notifier.name());
//! ```

pub mod messages;
pub mod notifiers;
pub mod reminder;

pub use messages::{notify_assignment, send_test_message};
pub use notifiers::{notifier_for, Delivery, NotificationRequest, Notifier, NotifyError};
pub use reminder::{ReminderOutcome, ReminderRoutine};
