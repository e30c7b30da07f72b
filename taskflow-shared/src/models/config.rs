/// System configuration singleton
///
/// Process-wide settings shared by every client: how notifications are
/// delivered, the mail-relay credentials, the base URL used to build task
/// deep links, and the gate timestamp of the daily reminder routine.
///
/// The document is created with empty defaults on first read and replaced
/// in full by every save (last writer wins).

use serde::{Deserialize, Serialize};

/// How reminders and assignment notices are delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPreference {
    /// Sent automatically through the mail relay
    #[default]
    Emailjs,

    /// Composed for manual sending from the user's mail client
    Outlook,
}

/// System configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    /// Delivery mode
    #[serde(default)]
    pub notification_preference: NotificationPreference,

    /// Mail-relay service id
    #[serde(default)]
    pub email_js_service_id: String,

    /// Mail-relay template used for assignment notices and tests
    #[serde(default)]
    pub email_js_template_id: String,

    /// Mail-relay template used for overdue reminders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_js_reminder_template_id: Option<String>,

    /// Mail-relay public key
    #[serde(default)]
    pub email_js_public_key: String,

    /// Base URL of the deployed application, used for deep links
    #[serde(default)]
    pub system_base_url: String,

    /// Last time the daily reminder routine ran (epoch millis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_auto_reminder_sent_at: Option<i64>,
}

impl SystemConfig {
    /// Whether the full mail-relay credential triple is present
    pub fn has_relay_credentials(&self) -> bool {
        !self.email_js_service_id.is_empty()
            && !self.email_js_template_id.is_empty()
            && !self.email_js_public_key.is_empty()
    }

    /// Template for reminders, falling back to the default template
    pub fn reminder_template_id(&self) -> &str {
        match self.email_js_reminder_template_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => &self.email_js_template_id,
        }
    }

    /// Whether reminders go out automatically
    pub fn sends_automatically(&self) -> bool {
        self.notification_preference == NotificationPreference::Emailjs
            && self.has_relay_credentials()
    }
}
