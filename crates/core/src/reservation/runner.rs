//! Reservation orchestrator implementation.
//!
//! Runs the step pipeline up to `max_attempts` times. Every attempt after the
//! first starts from a reloaded page; a fatal error or cancellation ends the
//! run at once.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use super::steps::{settle, Steps};
use super::types::{AttemptResult, ReservationError, RunOutcome};
use crate::automation::PageAutomation;
use crate::config::ReservationConfig;
use crate::request::PassengerRequest;

/// Drives reservation attempts against a page until one succeeds.
pub struct ReservationOrchestrator {
    config: ReservationConfig,
    page: Arc<dyn PageAutomation>,
    cancel: Option<watch::Receiver<bool>>,
}

impl ReservationOrchestrator {
    pub fn new(config: ReservationConfig, page: Arc<dyn PageAutomation>) -> Self {
        Self {
            config,
            page,
            cancel: None,
        }
    }

    /// Stop the run once the channel carries `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &ReservationConfig {
        &self.config
    }

    /// Open the search page and attempt the reservation until it succeeds,
    /// the attempt budget runs out, or a fatal error occurs.
    pub async fn run(&self, request: &PassengerRequest) -> RunOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut cancel = self.cancel.clone();
        info!(
            page = self.page.name(),
            identity = request.identity.mode_name(),
            journey = %request.journey_summary(),
            max_attempts,
            "Starting reservation"
        );

        let open = async {
            self.page.navigate(&self.config.initial_url).await?;
            Ok::<(), ReservationError>(())
        };
        if let Err(reason) = cancellable(&mut cancel, open).await {
            error!(error = %reason, "Could not open the search page");
            return RunOutcome::Aborted { attempt: 0, reason };
        }

        let mut attempt = 1;
        loop {
            info!(attempt, max_attempts, "Starting attempt");
            let result = cancellable(&mut cancel, self.attempt(attempt, request)).await;

            match AttemptResult::from(result) {
                AttemptResult::Success => {
                    info!(attempt, max_attempts, "Reservation succeeded");
                    return RunOutcome::Reserved { attempt };
                }
                AttemptResult::Fatal(reason) => {
                    error!(attempt, max_attempts, error = %reason, "Reservation aborted");
                    return RunOutcome::Aborted { attempt, reason };
                }
                AttemptResult::Recoverable(last_error) => {
                    warn!(attempt, max_attempts, error = %last_error, "Attempt failed");
                    if attempt >= max_attempts {
                        warn!(attempts = max_attempts, "All attempts failed");
                        return RunOutcome::Exhausted {
                            attempts: max_attempts,
                            last_error,
                        };
                    }
                }
            }

            let delay = self.config.retry_delay();
            info!(delay = ?delay, "Retrying");
            let pause = async {
                settle(delay).await;
                Ok::<(), ReservationError>(())
            };
            if let Err(reason) = cancellable(&mut cancel, pause).await {
                error!(attempt, error = %reason, "Reservation aborted");
                return RunOutcome::Aborted { attempt, reason };
            }
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        attempt: u32,
        request: &PassengerRequest,
    ) -> Result<(), ReservationError> {
        if attempt > 1 {
            info!(attempt, "Reloading page");
            self.page.reload().await?;
            settle(self.config.reload_settle()).await;
        }
        Steps::new(self.page.as_ref(), &self.config, request)
            .run()
            .await
    }
}

/// Run `work` unless cancellation is requested first.
pub(crate) async fn cancellable<F>(
    cancel: &mut Option<watch::Receiver<bool>>,
    work: F,
) -> Result<(), ReservationError>
where
    F: Future<Output = Result<(), ReservationError>>,
{
    let Some(rx) = cancel else {
        return work.await;
    };
    if *rx.borrow() {
        return Err(ReservationError::Cancelled);
    }
    tokio::select! {
        result = work => result,
        _ = cancelled(rx) => Err(ReservationError::Cancelled),
    }
}

/// Resolves once the channel carries `true`. Never resolves if the sender is
/// dropped without cancelling.
pub(crate) async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancel| *cancel).await.is_err() {
        std::future::pending::<()>().await;
    }
}
