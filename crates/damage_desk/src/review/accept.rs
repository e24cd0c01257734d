//! Accept with a grace period: `Idle -> Pending -> Idle`.
//!
//! Accepting a report arms a single timer. Cancelling (or dropping the
//! controller) before the deadline aborts it with no further effect; when it
//! fires, the controller returns to `Idle` and the timeout action runs once.
//! A fired action can no longer be cancelled; its task is kept so callers can
//! wait for it with [`AcceptController::wait_in_flight`] before shutting down.

use crate::model::Report;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const ACCEPT_DELAY_MS: u64 = 5000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcceptState {
    Idle,
    Pending { report_id: String, deadline: Instant },
}

struct PendingAccept {
    report_id: String,
    deadline: Instant,
    generation: u64,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    pending: Option<PendingAccept>,
    generation: u64,
    /// Timer tasks whose action is running or has run.
    fired: Vec<JoinHandle<()>>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the one pending-accept timer. Must be used inside a tokio runtime.
pub struct AcceptController {
    delay: Duration,
    slot: Arc<Mutex<Slot>>,
}

impl Default for AcceptController {
    fn default() -> Self {
        Self::new(Duration::from_millis(ACCEPT_DELAY_MS))
    }
}

impl AcceptController {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the timer for `report`. Returns false (and does nothing) while
    /// another report is pending.
    pub fn start<F, Fut>(&self, report: Report, on_timeout: F) -> bool
    where
        F: FnOnce(Report) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // Held across the spawn so the timer task cannot observe the slot
        // before `pending` is in place.
        let mut slot = lock(&self.slot);
        if let Some(p) = &slot.pending {
            debug!(pending = %p.report_id, requested = %report.id, "accept ignored");
            return false;
        }
        slot.generation += 1;
        let generation = slot.generation;
        let deadline = Instant::now() + self.delay;
        let report_id = report.id.clone();
        let shared = Arc::clone(&self.slot);

        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let fired = {
                let mut slot = lock(&shared);
                let ours = slot
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.generation == generation);
                if ours {
                    if let Some(p) = slot.pending.take() {
                        slot.fired.retain(|h| !h.is_finished());
                        slot.fired.push(p.timer);
                    }
                }
                ours
            };
            if fired {
                info!(report_id = %report.id, "accept confirmed");
                on_timeout(report).await;
            }
        });

        info!(report_id = %report_id, delay_ms = self.delay.as_millis() as u64, "accept pending");
        slot.pending = Some(PendingAccept {
            report_id,
            deadline,
            generation,
            timer,
        });
        true
    }

    /// Abort the pending accept. Returns the cancelled report id, or None when idle.
    pub fn cancel(&self) -> Option<String> {
        let pending = lock(&self.slot).pending.take()?;
        pending.timer.abort();
        info!(report_id = %pending.report_id, "accept cancelled");
        Some(pending.report_id)
    }

    pub fn state(&self) -> AcceptState {
        match &lock(&self.slot).pending {
            Some(p) => AcceptState::Pending {
                report_id: p.report_id.clone(),
                deadline: p.deadline,
            },
            None => AcceptState::Idle,
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }

    pub fn pending_report_id(&self) -> Option<String> {
        lock(&self.slot).pending.as_ref().map(|p| p.report_id.clone())
    }

    /// Fired actions that have not completed yet.
    pub fn in_flight(&self) -> usize {
        lock(&self.slot)
            .fired
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Wait until every fired action has completed. A pending accept is not
    /// waited for. Returns how many actions were awaited.
    pub async fn wait_in_flight(&self) -> usize {
        let mut waited = 0;
        loop {
            let fired = std::mem::take(&mut lock(&self.slot).fired);
            if fired.is_empty() {
                return waited;
            }
            for handle in fired {
                if let Err(e) = handle.await {
                    warn!(error = %e, "accepted report task failed");
                }
                waited += 1;
            }
        }
    }
}

impl Drop for AcceptController {
    fn drop(&mut self) {
        if let Some(p) = lock(&self.slot).pending.take() {
            p.timer.abort();
            debug!(report_id = %p.report_id, "pending accept dropped");
        }
    }
}
