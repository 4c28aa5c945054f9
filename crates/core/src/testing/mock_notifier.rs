//! Mock notifier for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notify::{EmailMessage, Notifier, NotifyError};

/// Mock implementation of the Notifier trait.
///
/// Records every message instead of sending it, and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    sent: Arc<RwLock<Vec<EmailMessage>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockNotifier {
    /// Create a new mock notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all sent messages.
    pub async fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.read().await.clone()
    }

    /// Get the number of messages sent.
    pub async fn sent_count(&self) -> usize {
        self.sent.read().await.len()
    }

    /// Make every send fail with a transport error.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        if *self.fail.read().await {
            return Err(NotifyError::Transport("mock transport failure".to_string()));
        }
        self.sent.write().await.push(message.clone());
        Ok(())
    }
}
