//! Trait definitions for the notify module.

use async_trait::async_trait;

use super::error::NotifyError;
use super::message::EmailMessage;

/// Delivers outcome emails.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns the name of this notifier implementation.
    fn name(&self) -> &str;

    /// Send one message. Called at most once per run.
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}
