/// Mail-client composition channel (OUTLOOK mode)
///
/// Nothing is sent. The message is turned into a `mailto:` link that the
/// user opens in their own mail client and sends by hand; credentials are
/// not needed.

use async_trait::async_trait;
use url::{form_urlencoded, Url};

use super::{Delivery, NotificationRequest, Notifier, NotifyError, NotifyResult};

/// Composes `mailto:` links
#[derive(Debug, Clone, Default)]
pub struct MailtoNotifier;

impl MailtoNotifier {
    pub fn new() -> Self {
        MailtoNotifier
    }

    /// `mailto:` link for `request`
    pub fn compose(request: &NotificationRequest) -> NotifyResult<Url> {
        if request.to_emails.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let mut link = Url::parse(&format!("mailto:{}", request.to_emails.join(",")))
            .map_err(|e| NotifyError::Delivery(format!("invalid recipient list: {}", e)))?;

        // Mail clients expect %20, not the form encoding's '+'
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("subject", &request.subject)
            .append_pair("body", &request.message)
            .finish()
            .replace('+', "%20");
        link.set_query(Some(&query));

        Ok(link)
    }
}

#[async_trait]
impl Notifier for MailtoNotifier {
    fn name(&self) -> &str {
        "mailto"
    }

    async fn deliver(&self, request: &NotificationRequest) -> NotifyResult<Delivery> {
        let link = Self::compose(request)?;
        tracing::debug!(recipients = request.to_emails.len(), "Composed mailto link");
        Ok(Delivery::Composed(link.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifiers::RelayCredentials;

    fn request(to: &[&str]) -> NotificationRequest {
        NotificationRequest {
            credentials: RelayCredentials::default(),
            to_emails: to.iter().map(|s| s.to_string()).collect(),
            to_name: "Eve".to_string(),
            subject: "Hello there".to_string(),
            message: "Line 1\nLine 2 + more".to_string(),
            task_link: String::new(),
        }
    }

    #[test]
    fn test_compose() {
        let link = MailtoNotifier::compose(&request(&["eve@example.com", "eli@example.com"])).unwrap();
        assert_eq!(
            link.as_str(),
            "mailto:eve@example.com,eli@example.com?subject=Hello%20there&body=Line%201%0ALine%202%20%2B%20more"
        );
    }

    #[tokio::test]
    async fn test_deliver_composes_without_credentials() {
        let delivery = MailtoNotifier::new()
            .deliver(&request(&["eve@example.com"]))
            .await
            .unwrap();

        match delivery {
            Delivery::Composed(link) => assert!(link.starts_with("mailto:eve@example.com?subject=")),
            other => panic!("expected composed link, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_recipients() {
        let result = MailtoNotifier::new().deliver(&request(&[])).await;
        assert!(matches!(result, Err(NotifyError::NoRecipients)));
    }
}
