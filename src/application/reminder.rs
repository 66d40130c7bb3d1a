use super::bounded;
use crate::config::EngineConfig;
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::ports::{ClockRef, NotifierRef, ScheduledOrderStoreRef};
use crate::error::Result;
use serde::Serialize;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    pub candidates: usize,
    pub sent: usize,
    pub errors: usize,
}

/// Sends one pre-delivery reminder per pending order.
///
/// The `reminder_sent` flag is written before the notification goes out, so an
/// order is reminded at most once even if the send fails.
pub struct ReminderNotifier {
    store: ScheduledOrderStoreRef,
    notifier: NotifierRef,
    clock: ClockRef,
    window_start: chrono::Duration,
    window_end: chrono::Duration,
    interval: Duration,
    call_timeout: Duration,
}

impl ReminderNotifier {
    pub fn new(
        store: ScheduledOrderStoreRef,
        notifier: NotifierRef,
        clock: ClockRef,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            window_start: config.reminder_window_start,
            window_end: config.reminder_window_end,
            interval: config.reminder_interval,
            call_timeout: config.call_timeout,
        }
    }

    pub async fn remind(&self) -> Result<ReminderReport> {
        let now = self.clock.now();
        let candidates = self
            .store
            .find_reminder_candidates(now + self.window_start, now + self.window_end)
            .await?;
        let mut report = ReminderReport {
            candidates: candidates.len(),
            ..ReminderReport::default()
        };

        for order in candidates {
            let mut next = order.clone();
            if !next.mark_reminded(now) {
                continue;
            }
            let stored = match self.store.replace(&order, next).await {
                Ok(Some(stored)) => stored,
                Ok(None) => {
                    tracing::debug!(scheduled_order_id = %order.id, "order changed, skipping reminder");
                    continue;
                }
                Err(e) => {
                    tracing::error!(scheduled_order_id = %order.id, "failed to flag reminder: {}", e);
                    report.errors += 1;
                    continue;
                }
            };

            let notification = Notification {
                kind: NotificationKind::Reminder,
                scheduled_order_id: stored.id,
                title: "Your scheduled order is coming up".to_string(),
                message: format!(
                    "{} item(s) for {} will be ordered at {}.",
                    stored.cart_snapshot.total_items(),
                    stored.bill_snapshot.total_amount,
                    stored.scheduled_time.format("%H:%M UTC")
                ),
            };
            match bounded(
                "notification",
                self.call_timeout,
                self.notifier.send(&stored.user_id, notification),
            )
            .await
            {
                Ok(()) => {
                    tracing::info!(scheduled_order_id = %stored.id, "reminder sent");
                    report.sent += 1;
                }
                Err(e) => {
                    tracing::error!(scheduled_order_id = %stored.id, "failed to send reminder: {}", e);
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }

    /// Runs reminder passes on a fixed interval until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(interval_secs = self.interval.as_secs(), "reminder notifier started");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.remind().await {
                        tracing::error!("reminder pass failed: {}", e);
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }

        tracing::info!("reminder notifier stopped");
    }
}
