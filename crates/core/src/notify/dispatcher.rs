use std::sync::Arc;

use tracing::{debug, warn};

use super::error::NotifyError;
use super::message::compose_message;
use super::traits::Notifier;
use crate::request::PassengerRequest;
use crate::reservation::RunOutcome;

/// Sends the single outcome message of a run, if anyone should get one.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    notifier: Option<Arc<dyn Notifier>>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { notifier }
    }

    /// A dispatcher that never sends anything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.notifier.is_some()
    }

    /// Send the outcome message. Returns whether a message was sent.
    ///
    /// A send failure is logged and returned; it never changes the outcome.
    pub async fn notify(
        &self,
        outcome: &RunOutcome,
        request: &PassengerRequest,
    ) -> Result<bool, NotifyError> {
        let Some(message) = compose_message(outcome, request) else {
            debug!("Notification not requested");
            return Ok(false);
        };
        let Some(notifier) = &self.notifier else {
            debug!("No mail server configured, skipping notification");
            return Ok(false);
        };

        match notifier.send(&message).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(notifier = notifier.name(), error = %e, "Failed to send notification");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("notifier", &self.notifier.as_ref().map(|n| n.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockNotifier};

    fn outcome() -> RunOutcome {
        RunOutcome::Reserved { attempt: 1 }
    }

    #[tokio::test]
    async fn test_disabled_dispatcher_is_noop() {
        let mut request = fixtures::guest_request();
        request.notify_email = Some("me@example.com".to_string());
        let sent = NotificationDispatcher::disabled()
            .notify(&outcome(), &request)
            .await
            .unwrap();
        assert!(!sent);
    }

    #[tokio::test]
    async fn test_request_without_email_is_noop() {
        let notifier = Arc::new(MockNotifier::new());
        let dispatcher = NotificationDispatcher::new(Some(notifier.clone()));
        let sent = dispatcher
            .notify(&outcome(), &fixtures::guest_request())
            .await
            .unwrap();
        assert!(!sent);
        assert_eq!(notifier.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_sends_once() {
        let notifier = Arc::new(MockNotifier::new());
        let dispatcher = NotificationDispatcher::new(Some(notifier.clone()));
        let mut request = fixtures::guest_request();
        request.notify_email = Some("me@example.com".to_string());

        assert!(dispatcher.notify(&outcome(), &request).await.unwrap());
        let sent = notifier.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "me@example.com");
    }

    #[tokio::test]
    async fn test_send_failure_is_returned() {
        let notifier = Arc::new(MockNotifier::new());
        notifier.set_fail(true).await;
        let dispatcher = NotificationDispatcher::new(Some(notifier.clone()));
        let mut request = fixtures::guest_request();
        request.notify_email = Some("me@example.com".to_string());

        let result = dispatcher.notify(&outcome(), &request).await;
        assert!(matches!(result, Err(NotifyError::Transport(_))));
    }
}
