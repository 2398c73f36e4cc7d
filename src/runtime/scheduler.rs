//! Fixed-interval tick driver.
//!
//! One tick runs immediately, then one per interval. Each tick runs on the
//! blocking pool while holding the engine lock and is awaited before the next
//! interval firing is taken, so ticks never overlap. Firings missed while a
//! tick was running are skipped. A tick that panics is recorded on the engine
//! as a failed tick and the loop carries on.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::engine::{Engine, TickOutcome};
use crate::domain::risk::HaltReason;

/// Why [`Scheduler::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulerExit {
    Cancelled,
    EngineStopped,
    Halted(HaltReason),
}

/// Lock the engine, recovering the guard if a previous holder panicked.
pub fn lock_engine(engine: &Mutex<Engine>) -> MutexGuard<'_, Engine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Scheduler {
    engine: Arc<Mutex<Engine>>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(engine: Arc<Mutex<Engine>>, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            engine,
            interval,
            shutdown,
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(&self) -> SchedulerExit {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_ms = self.interval.as_millis() as u64, "scheduler started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("scheduler shutting down");
                    return SchedulerExit::Cancelled;
                }
                _ = ticker.tick() => {
                    match self.tick_once().await {
                        TickOutcome::NotRunning => {
                            info!("engine no longer running, scheduler exiting");
                            return SchedulerExit::EngineStopped;
                        }
                        TickOutcome::Evaluated { halted: Some(reason), .. } => {
                            warn!(%reason, "engine halted by risk governor");
                            self.shutdown.cancel();
                            return SchedulerExit::Halted(reason);
                        }
                        outcome => debug!(?outcome, "tick complete"),
                    }
                }
            }
        }
    }

    async fn tick_once(&self) -> TickOutcome {
        let engine = Arc::clone(&self.engine);
        match tokio::task::spawn_blocking(move || lock_engine(&engine).tick()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = format!("tick aborted: {e}");
                error!(error = %e, "tick worker failed");
                lock_engine(&self.engine).record_failure(reason.clone());
                TickOutcome::Failed { reason }
            }
        }
    }
}
