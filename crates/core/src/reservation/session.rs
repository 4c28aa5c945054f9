//! One end-to-end reservation run: attempts, notification, payment hold and
//! page release.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use super::runner::{cancelled, ReservationOrchestrator};
use super::types::RunOutcome;
use crate::automation::PageAutomation;
use crate::config::ReservationConfig;
use crate::notify::NotificationDispatcher;
use crate::request::PassengerRequest;

/// Owns the page for a whole run and releases it exactly once.
pub struct ReservationSession {
    orchestrator: ReservationOrchestrator,
    page: Arc<dyn PageAutomation>,
    dispatcher: NotificationDispatcher,
    hold_after_success: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl ReservationSession {
    pub fn new(
        config: ReservationConfig,
        page: Arc<dyn PageAutomation>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        let hold_after_success = config.hold_after_success();
        Self {
            orchestrator: ReservationOrchestrator::new(config, Arc::clone(&page)),
            page,
            dispatcher,
            hold_after_success,
            cancel: None,
        }
    }

    /// Cancellation stops the attempts and cuts the payment hold short.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.orchestrator = self.orchestrator.with_cancellation(cancel.clone());
        self.cancel = Some(cancel);
        self
    }

    /// Close the page right after a successful reservation.
    pub fn without_hold(mut self) -> Self {
        self.hold_after_success = Duration::ZERO;
        self
    }

    /// Run to completion. The page is closed before this returns.
    pub async fn run(self, request: &PassengerRequest) -> RunOutcome {
        let outcome = self.orchestrator.run(request).await;
        info!(outcome = %outcome, "Reservation finished");

        match self.dispatcher.notify(&outcome, request).await {
            Ok(true) => info!("Outcome notification sent"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Outcome notification failed"),
        }

        if outcome.is_reserved() {
            self.hold().await;
        }

        if let Err(e) = self.page.close().await {
            warn!(error = %e, "Failed to close page");
        }
        outcome
    }

    /// Keep the browser open so the passenger can pay.
    async fn hold(&self) {
        if self.hold_after_success.is_zero() {
            return;
        }
        info!(
            hold = ?self.hold_after_success,
            "Complete the payment in the open browser; it closes when the hold ends"
        );

        let mut cancel = self.cancel.clone();
        let wait_cancel = async {
            match cancel.as_mut() {
                Some(rx) => cancelled(rx).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = tokio::time::sleep(self.hold_after_success) => info!("Payment hold over"),
            _ = wait_cancel => info!("Payment hold ended early"),
        }
    }
}
