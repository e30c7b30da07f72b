/// Notification delivery channels
///
/// Every channel implements [`Notifier`]: given a [`NotificationRequest`] it
/// either hands the message to something that sends it, or composes it for a
/// person to send by hand.
///
/// # Channels
///
/// - `emailjs`: Sends through the EmailJS mail relay (EMAILJS mode)
/// - `mailto`: Composes a `mailto:` link for the user's mail client (OUTLOOK mode)
/// - `mock`: Records requests for tests
///
/// Use [`notifier_for`] to pick the channel the system configuration asks for.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use taskflow_shared::models::{NotificationPreference, SystemConfig};
use thiserror::Error;

pub mod emailjs;
pub mod mailto;
pub mod mock;

pub use emailjs::EmailJsNotifier;
pub use mailto::MailtoNotifier;
pub use mock::MockNotifier;

/// Delivery errors
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Service id, template id or public key is empty
    #[error("mail relay credentials are incomplete")]
    MissingCredentials,

    /// Nobody to send to
    #[error("no recipients for notification")]
    NoRecipients,

    /// The relay refused the message
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Transport failure talking to the relay
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Mail-relay credential set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelayCredentials {
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
}

impl RelayCredentials {
    /// Credentials from the system configuration using `template_id`
    pub fn from_config(config: &SystemConfig, template_id: &str) -> Self {
        RelayCredentials {
            service_id: config.email_js_service_id.clone(),
            template_id: template_id.to_string(),
            public_key: config.email_js_public_key.clone(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.service_id.is_empty() && !self.template_id.is_empty() && !self.public_key.is_empty()
    }
}

/// A message ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub credentials: RelayCredentials,

    /// Recipient addresses; group notices go to every member at once
    pub to_emails: Vec<String>,

    /// Display name of the user or group addressed
    pub to_name: String,

    pub subject: String,
    pub message: String,

    /// Deep link back into the application
    pub task_link: String,
}

/// What a channel did with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the relay for these recipients
    Sent { recipients: usize },

    /// Composed for manual sending; carries the `mailto:` link
    Composed(String),
}

/// A notification delivery channel
///
/// Implementations must be thread-safe; the reminder routine shares one
/// notifier across its runs.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logs
    fn name(&self) -> &str;

    /// Attempts delivery of one request
    ///
    /// # Errors
    ///
    /// - `NoRecipients` when `to_emails` is empty
    /// - `MissingCredentials` for relay channels without a full credential set
    /// - `Delivery` / `Http` when the relay rejects or cannot be reached
    async fn deliver(&self, request: &NotificationRequest) -> NotifyResult<Delivery>;
}

/// Channel selected by the configured notification preference
pub fn notifier_for(config: &SystemConfig, http: reqwest::Client) -> Arc<dyn Notifier> {
    match config.notification_preference {
        NotificationPreference::Emailjs => Arc::new(EmailJsNotifier::with_client(http)),
        NotificationPreference::Outlook => Arc::new(MailtoNotifier::new()),
    }
}
