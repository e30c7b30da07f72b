/// Mock channel for tests
///
/// Records every request it is given and reports it as sent. It can be told
/// to fail every delivery, or only deliveries to particular addresses, to
/// exercise failure handling without a mail relay.
///
/// # Example
///
/// ```
/// use taskflow_notifier::notifiers::MockNotifier;
///
/// let notifier = MockNotifier::new().failing_for("bounce@example.com");
/// assert!(notifier.requests().is_empty());
/// ```

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use super::{Delivery, NotificationRequest, Notifier, NotifyError, NotifyResult};

/// Records requests instead of sending them
#[derive(Debug, Default)]
pub struct MockNotifier {
    requests: Mutex<Vec<NotificationRequest>>,
    fail_all: bool,
    failing: HashSet<String>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivery fails
    pub fn failing() -> Self {
        MockNotifier {
            fail_all: true,
            ..Self::default()
        }
    }

    /// Deliveries including `email` fail
    pub fn failing_for(mut self, email: impl Into<String>) -> Self {
        self.failing.insert(email.into());
        self
    }

    /// Requests received so far, failed ones included
    pub fn requests(&self) -> Vec<NotificationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn should_fail(&self, request: &NotificationRequest) -> bool {
        self.fail_all || request.to_emails.iter().any(|e| self.failing.contains(e))
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn deliver(&self, request: &NotificationRequest) -> NotifyResult<Delivery> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        if request.to_emails.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        if self.should_fail(request) {
            return Err(NotifyError::Delivery("mock failure".to_string()));
        }

        Ok(Delivery::Sent {
            recipients: request.to_emails.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifiers::RelayCredentials;

    fn request(to: &str) -> NotificationRequest {
        NotificationRequest {
            credentials: RelayCredentials::default(),
            to_emails: vec![to.to_string()],
            to_name: "Eve".to_string(),
            subject: "s".to_string(),
            message: "m".to_string(),
            task_link: String::new(),
        }
    }

    #[test]
    fn test_name() {
        assert_eq!(MockNotifier::new().name(), "mock");
    }

    #[tokio::test]
    async fn test_records_and_succeeds() {
        let notifier = MockNotifier::new();
        let delivery = notifier.deliver(&request("eve@example.com")).await.unwrap();

        assert_eq!(delivery, Delivery::Sent { recipients: 1 });
        assert_eq!(notifier.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_selective_failure() {
        let notifier = MockNotifier::new().failing_for("bounce@example.com");

        assert!(notifier.deliver(&request("eve@example.com")).await.is_ok());
        assert!(matches!(
            notifier.deliver(&request("bounce@example.com")).await,
            Err(NotifyError::Delivery(_))
        ));
        assert_eq!(notifier.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_failing() {
        let notifier = MockNotifier::failing();
        assert!(notifier.deliver(&request("eve@example.com")).await.is_err());
    }
}
