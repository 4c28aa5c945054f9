//! Error types for the notify module.

use thiserror::Error;

/// Errors that can occur while sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A sender or recipient address could not be parsed.
    #[error("Invalid email address '{address}': {reason}")]
    Address { address: String, reason: String },

    /// The message could not be assembled.
    #[error("Failed to build email: {0}")]
    Build(String),

    /// The mail server refused or could not be reached.
    #[error("Failed to send email: {0}")]
    Transport(String),
}
