//! Types for the reservation orchestrator.

use std::time::Duration;

use thiserror::Error;

use crate::automation::AutomationError;

/// Why an attempt (or the whole run) failed.
#[derive(Debug, Clone, Error)]
pub enum ReservationError {
    /// A page operation failed.
    #[error("{0}")]
    Automation(#[from] AutomationError),

    /// The queueing gate was still shown when the deadline passed.
    #[error("queue gate did not clear within {0:?}")]
    GateTimeout(Duration),

    /// No result row matched the requested departure and arrival times.
    #[error("no train departing {departure} and arriving {arrival} found")]
    NoMatchingTrain { departure: String, arrival: String },

    /// The matching train has no seats left.
    #[error("train departing {departure} is sold out")]
    SoldOut { departure: String },

    /// The matching row has no reserve button.
    #[error("reserve button for the {departure} train is unavailable")]
    ReserveActionUnavailable { departure: String },

    /// Login was rejected or the guest reservation form was not reached.
    #[error("identity check failed: {0}")]
    Identity(String),

    /// The run was stopped from outside.
    #[error("reservation cancelled")]
    Cancelled,
}

impl ReservationError {
    /// Fatal errors end the run; everything else is retried.
    pub fn is_fatal(&self) -> bool {
        match self {
            ReservationError::Cancelled => true,
            ReservationError::Automation(e) => e.is_session_lost(),
            _ => false,
        }
    }
}

/// Result of one pass through the step pipeline.
#[derive(Debug, Clone)]
pub enum AttemptResult {
    Success,
    Recoverable(ReservationError),
    Fatal(ReservationError),
}

impl From<Result<(), ReservationError>> for AttemptResult {
    fn from(result: Result<(), ReservationError>) -> Self {
        match result {
            Ok(()) => AttemptResult::Success,
            Err(e) if e.is_fatal() => AttemptResult::Fatal(e),
            Err(e) => AttemptResult::Recoverable(e),
        }
    }
}

/// Terminal result of a whole run. Produced exactly once.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// A seat was claimed on this attempt (1-based).
    Reserved { attempt: u32 },
    /// Every attempt failed; `last_error` is the final attempt's failure.
    Exhausted {
        attempts: u32,
        last_error: ReservationError,
    },
    /// A fatal error stopped the run early.
    Aborted {
        attempt: u32,
        reason: ReservationError,
    },
}

impl RunOutcome {
    pub fn is_reserved(&self) -> bool {
        matches!(self, RunOutcome::Reserved { .. })
    }

    /// The error that ended the run, if it did not succeed.
    pub fn error(&self) -> Option<&ReservationError> {
        match self {
            RunOutcome::Reserved { .. } => None,
            RunOutcome::Exhausted { last_error, .. } => Some(last_error),
            RunOutcome::Aborted { reason, .. } => Some(reason),
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Reserved { attempt } => write!(f, "reserved on attempt {attempt}"),
            RunOutcome::Exhausted {
                attempts,
                last_error,
            } => write!(f, "gave up after {attempts} attempts: {last_error}"),
            RunOutcome::Aborted { attempt, reason } => {
                write!(f, "aborted during attempt {attempt}: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ReservationError::Cancelled.is_fatal());
        assert!(ReservationError::from(AutomationError::SessionClosed).is_fatal());
        assert!(!ReservationError::from(AutomationError::not_found("td")).is_fatal());
        assert!(!ReservationError::GateTimeout(Duration::from_secs(60)).is_fatal());
        assert!(!ReservationError::SoldOut {
            departure: "10:37".to_string()
        }
        .is_fatal());
    }

    #[test]
    fn test_attempt_result_from_result() {
        assert!(matches!(AttemptResult::from(Ok(())), AttemptResult::Success));
        assert!(matches!(
            AttemptResult::from(Err(ReservationError::Identity("rejected".to_string()))),
            AttemptResult::Recoverable(ReservationError::Identity(_))
        ));
        assert!(matches!(
            AttemptResult::from(Err(ReservationError::Cancelled)),
            AttemptResult::Fatal(ReservationError::Cancelled)
        ));
    }

    #[test]
    fn test_error_display() {
        let err = ReservationError::NoMatchingTrain {
            departure: "10:37".to_string(),
            arrival: "12:07".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no train departing 10:37 and arriving 12:07 found"
        );

        let err = ReservationError::from(AutomationError::not_found("input#custNm"));
        assert_eq!(err.to_string(), "element not found: input#custNm");
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = RunOutcome::Reserved { attempt: 2 };
        assert!(outcome.is_reserved());
        assert!(outcome.error().is_none());
        assert_eq!(outcome.to_string(), "reserved on attempt 2");

        let outcome = RunOutcome::Exhausted {
            attempts: 10,
            last_error: ReservationError::SoldOut {
                departure: "10:37".to_string(),
            },
        };
        assert!(!outcome.is_reserved());
        assert!(matches!(
            outcome.error(),
            Some(ReservationError::SoldOut { .. })
        ));
    }
}
