use super::execution::{ExecutionOutcome, Executor};
use crate::config::EngineConfig;
use crate::domain::ports::{ClockRef, ScheduledOrderStoreRef};
use crate::error::Result;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// What a single tick did.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// The tick found a previous one still running and did nothing.
    pub skipped: bool,
    pub due: usize,
    pub completed: usize,
    pub failed: usize,
    pub retried: usize,
    pub stranded: usize,
    /// Stale `processing` orders settled before the due orders were run.
    pub recovered: usize,
    /// Due orders another writer changed before this tick could claim them.
    pub lost_claims: usize,
    pub errors: usize,
}

impl TickReport {
    fn tally(&mut self, outcome: &ExecutionOutcome) {
        match outcome {
            ExecutionOutcome::Completed(_) => self.completed += 1,
            ExecutionOutcome::Failed(_) => self.failed += 1,
            ExecutionOutcome::Retrying(_) => self.retried += 1,
            ExecutionOutcome::Stranded { .. } => self.stranded += 1,
        }
    }
}

/// Resets the in-flight flag when the tick ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic driver that executes due scheduled orders.
///
/// Ticks are single-flight: a tick that starts while another is running
/// returns immediately with `skipped` set. Each tick first settles stale
/// `processing` orders, then processes due orders one at a time in
/// scheduled-time order.
pub struct SchedulerLoop {
    store: ScheduledOrderStoreRef,
    clock: ClockRef,
    executor: Arc<Executor>,
    lookahead: chrono::Duration,
    stale_after: chrono::Duration,
    interval: Duration,
    in_flight: AtomicBool,
}

impl SchedulerLoop {
    pub fn new(
        store: ScheduledOrderStoreRef,
        clock: ClockRef,
        executor: Arc<Executor>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            clock,
            executor,
            lookahead: config.lookahead,
            stale_after: config.stale_after,
            interval: config.tick_interval,
            in_flight: AtomicBool::new(false),
        }
    }

    pub async fn tick(&self) -> Result<TickReport> {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            tracing::warn!("previous scheduler tick still running, skipping");
            return Ok(TickReport {
                skipped: true,
                ..TickReport::default()
            });
        };

        let mut report = TickReport::default();
        self.recover_stale(&mut report).await;

        let cutoff = self.clock.now() + self.lookahead;
        let due = self.store.find_due(cutoff).await?;
        report.due = due.len();
        if due.is_empty() {
            return Ok(report);
        }
        tracing::info!(count = due.len(), %cutoff, "processing due scheduled orders");

        for order in due {
            let claimed = match self.executor.claim(&order).await {
                Ok(Some(claimed)) => claimed,
                Ok(None) => {
                    tracing::debug!(scheduled_order_id = %order.id, "claim lost to another writer");
                    report.lost_claims += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!(scheduled_order_id = %order.id, "failed to claim: {}", e);
                    report.errors += 1;
                    continue;
                }
            };

            match self.executor.execute(claimed).await {
                Ok(outcome) => report.tally(&outcome),
                Err(e) => {
                    tracing::error!(
                        scheduled_order_id = %order.id,
                        "failed to record execution outcome: {}",
                        e
                    );
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            completed = report.completed,
            failed = report.failed,
            retried = report.retried,
            stranded = report.stranded,
            recovered = report.recovered,
            lost_claims = report.lost_claims,
            errors = report.errors,
            "scheduler tick finished"
        );
        Ok(report)
    }

    /// Settles orders whose execution ended without recording an outcome.
    async fn recover_stale(&self, report: &mut TickReport) {
        let older_than = self.clock.now() - self.stale_after;
        let stale = match self.store.find_stale_processing(older_than).await {
            Ok(stale) => stale,
            Err(e) => {
                tracing::error!("failed to look up stale processing orders: {}", e);
                report.errors += 1;
                return;
            }
        };

        for order in stale {
            let id = order.id;
            match self.executor.recover(order).await {
                Ok(outcome) => {
                    report.recovered += 1;
                    report.tally(&outcome);
                }
                Err(e) => {
                    tracing::error!(scheduled_order_id = %id, "failed to recover stale order: {}", e);
                    report.errors += 1;
                }
            }
        }
    }

    /// Ticks on a fixed interval until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(interval_secs = self.interval.as_secs(), "scheduler loop started");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!("scheduler tick failed: {}", e);
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("scheduler loop received shutdown signal");
                    break;
                }
            }
        }

        tracing::info!("scheduler loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_is_exclusive_and_released() {
        let flag = AtomicBool::new(false);
        let first = InFlight::acquire(&flag);
        assert!(first.is_some());
        assert!(InFlight::acquire(&flag).is_none());
        drop(first);
        assert!(InFlight::acquire(&flag).is_some());
    }
}
