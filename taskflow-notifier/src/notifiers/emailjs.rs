/// EmailJS mail-relay channel
///
/// Posts the message to the EmailJS REST send endpoint. The template on the
/// EmailJS side receives these parameters:
///
/// | Parameter   | Value                                 |
/// |-------------|---------------------------------------|
/// | `to_name`   | Recipient (user or group) name        |
/// | `to_email`  | Comma-separated recipient addresses   |
/// | `subject`   | Subject line                          |
/// | `message`   | Plain-text body                       |
/// | `task_link` | Deep link to the task                 |
///
/// # Example
///
/// ```no_run
/// use taskflow_notifier::notifiers::{EmailJsNotifier, NotificationRequest, Notifier, RelayCredentials};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let notifier = EmailJsNotifier::new();
/// let request = NotificationRequest {
///     credentials: RelayCredentials {
///         service_id: "service_gmail".into(),
///         template_id: "template_default".into(),
///         public_key: "pk".into(),
///     },
///     to_emails: vec!["eve@example.com".into()],
///     to_name: "Eve".into(),
///     subject: "Hello".into(),
///     message: "Hi there".into(),
///     task_link: "https://taskflow.example.com?taskId=task-1".into(),
/// };
/// notifier.deliver(&request).await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use serde::Serialize;

use super::{Delivery, NotificationRequest, Notifier, NotifyError, NotifyResult};

/// Public EmailJS send endpoint
pub const EMAILJS_SEND_URL: &str = "https://api.emailjs.com/api/v1.0/email/send";

#[derive(Debug, Serialize)]
struct SendPayload<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams<'a>,
}

#[derive(Debug, Serialize)]
struct TemplateParams<'a> {
    to_name: &'a str,
    to_email: String,
    subject: &'a str,
    message: &'a str,
    task_link: &'a str,
}

fn payload(request: &NotificationRequest) -> SendPayload<'_> {
    SendPayload {
        service_id: &request.credentials.service_id,
        template_id: &request.credentials.template_id,
        user_id: &request.credentials.public_key,
        template_params: TemplateParams {
            to_name: &request.to_name,
            to_email: request.to_emails.join(","),
            subject: &request.subject,
            message: &request.message,
            task_link: &request.task_link,
        },
    }
}

/// Sends through EmailJS
#[derive(Debug, Clone)]
pub struct EmailJsNotifier {
    http: reqwest::Client,
    endpoint: String,
}

impl EmailJsNotifier {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Reuses an existing HTTP client
    pub fn with_client(http: reqwest::Client) -> Self {
        EmailJsNotifier {
            http,
            endpoint: EMAILJS_SEND_URL.to_string(),
        }
    }

    /// Points at a different send endpoint (self-hosted relay, test server)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for EmailJsNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for EmailJsNotifier {
    fn name(&self) -> &str {
        "emailjs"
    }

    async fn deliver(&self, request: &NotificationRequest) -> NotifyResult<Delivery> {
        if request.to_emails.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        if !request.credentials.is_complete() {
            return Err(NotifyError::MissingCredentials);
        }

        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // EmailJS explains rejections in a plain-text body
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Mail relay rejected message");
            return Err(NotifyError::Delivery(format!("{}: {}", status, body)));
        }

        tracing::debug!(
            recipients = request.to_emails.len(),
            subject = %request.subject,
            "Message handed to mail relay"
        );

        Ok(Delivery::Sent {
            recipients: request.to_emails.len(),
        })
    }
}
