//! Error types for page automation.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by a [`PageAutomation`](super::PageAutomation) implementation.
#[derive(Debug, Clone, Error)]
pub enum AutomationError {
    /// No element matched the selector.
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// A select control has no option with the requested value.
    #[error("option '{value}' not found in {selector}")]
    OptionNotFound { selector: String, value: String },

    /// An element handle from an earlier page load was used after a reload.
    #[error("stale element handle: {handle}")]
    StaleElement { handle: String },

    /// A wait or command did not finish in time.
    #[error("{what} timed out after {duration:?}")]
    Timeout { what: String, duration: Duration },

    /// Page script raised an exception.
    #[error("page script failed: {message}")]
    Script { message: String },

    /// The DevTools peer answered with something unexpected.
    #[error("DevTools protocol error: {detail}")]
    Protocol { detail: String },

    /// Could not reach the DevTools endpoint.
    #[error("failed to connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// The page session is gone; nothing further can succeed on it.
    #[error("automation session closed")]
    SessionClosed,

    /// The browser process could not be started.
    #[error("failed to launch browser: {reason}")]
    Launch { reason: String },
}

impl AutomationError {
    pub fn not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    pub fn timeout(what: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            duration,
        }
    }

    /// Whether the underlying session can no longer be used.
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            Self::SessionClosed | Self::ConnectionFailed { .. } | Self::Launch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutomationError::not_found("input#dptRsStnCdNm");
        assert_eq!(err.to_string(), "element not found: input#dptRsStnCdNm");

        let err = AutomationError::timeout("waiting for div#gate", Duration::from_secs(60));
        assert_eq!(err.to_string(), "waiting for div#gate timed out after 60s");
    }

    #[test]
    fn test_session_lost() {
        assert!(AutomationError::SessionClosed.is_session_lost());
        assert!(!AutomationError::not_found("a").is_session_lost());
        assert!(!AutomationError::timeout("x", Duration::from_millis(1)).is_session_lost());
    }
}
