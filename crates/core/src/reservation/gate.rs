//! Waiting out the site's queueing interstitial.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval};
use tracing::{debug, info, warn};

use super::selectors::GATE;
use super::types::ReservationError;
use crate::automation::{AutomationError, PageAutomation};

/// Whether the gate had to be waited out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateWait {
    Absent,
    Cleared(Duration),
}

/// Block until the queue gate is gone, or fail with
/// [`ReservationError::GateTimeout`] once `timeout` elapses.
///
/// Progress is logged every `pulse` while waiting; a zero `pulse` stays quiet.
pub async fn wait_for_gate(
    page: &dyn PageAutomation,
    timeout: Duration,
    pulse: Duration,
) -> Result<GateWait, ReservationError> {
    if page.count(GATE).await? == 0 {
        debug!("No queue gate");
        return Ok(GateWait::Absent);
    }

    info!(timeout = ?timeout, "Queue gate shown, waiting for it to clear");
    let started = Instant::now();
    let mut pulse = (!pulse.is_zero()).then(|| interval_at(started + pulse, pulse));

    let hidden = page.wait_for_hidden(GATE, timeout);
    tokio::pin!(hidden);
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            result = &mut hidden => {
                return match result {
                    Ok(()) => {
                        let waited = started.elapsed();
                        info!(waited = ?waited, "Queue gate cleared");
                        Ok(GateWait::Cleared(waited))
                    }
                    Err(AutomationError::Timeout { .. }) => {
                        warn!(timeout = ?timeout, "Queue gate did not clear");
                        Err(ReservationError::GateTimeout(timeout))
                    }
                    Err(e) => Err(e.into()),
                };
            }
            _ = &mut deadline => {
                warn!(timeout = ?timeout, "Queue gate did not clear");
                return Err(ReservationError::GateTimeout(timeout));
            }
            _ = tick(&mut pulse) => {
                info!(waited = ?started.elapsed(), "Still waiting in queue");
            }
        }
    }
}

async fn tick(pulse: &mut Option<Interval>) {
    match pulse {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
