//! Reservation orchestrator for the SRT booking site.
//!
//! The orchestrator drives a page through a fixed step pipeline:
//! - **Search**: stations, date, submit, queue gate
//! - **Claim**: find the requested train and press its reserve button
//! - **Identity**: guest form or member login, chosen by the request
//!
//! Failed attempts are retried from a reloaded page until the attempt budget
//! is spent.

mod gate;
mod runner;
mod session;
pub mod selectors;
mod steps;
mod types;

pub use gate::{wait_for_gate, GateWait};
pub use runner::ReservationOrchestrator;
pub use session::ReservationSession;
pub use types::{AttemptResult, ReservationError, RunOutcome};
