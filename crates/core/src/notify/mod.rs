//! Outcome notification by email.
//!
//! A run produces at most one message, addressed to the email given with the
//! request. Sending is skipped when the request has no address or no mail
//! server is configured.

mod dispatcher;
mod error;
mod message;
mod smtp;
mod traits;

pub use dispatcher::NotificationDispatcher;
pub use error::NotifyError;
pub use message::{compose_message, EmailMessage};
pub use smtp::SmtpNotifier;
pub use traits::Notifier;
