use crate::domain::bill::BillPolicy;
use chrono::Duration;
use std::time::Duration as StdDuration;

/// Tunables for scheduling, execution and reminders.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Earliest a new order may be scheduled, relative to now.
    pub min_lead_time: Duration,
    /// How far ahead of its scheduled time an order may be executed.
    pub lookahead: Duration,
    pub max_retries: u32,
    /// A `processing` order untouched for this long is settled by the next tick.
    pub stale_after: Duration,
    /// Reminders go out for orders scheduled within `[now + start, now + end]`.
    pub reminder_window_start: Duration,
    pub reminder_window_end: Duration,
    pub tick_interval: StdDuration,
    pub reminder_interval: StdDuration,
    /// Upper bound on each collaborator call made while executing an order.
    pub call_timeout: StdDuration,
    /// Attempts at allocating a unique order number.
    pub order_number_attempts: u32,
    pub bill_policy: BillPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_lead_time: Duration::minutes(30),
            lookahead: Duration::minutes(5),
            max_retries: 3,
            stale_after: Duration::minutes(10),
            reminder_window_start: Duration::minutes(15),
            reminder_window_end: Duration::minutes(30),
            tick_interval: StdDuration::from_secs(60),
            reminder_interval: StdDuration::from_secs(60),
            call_timeout: StdDuration::from_secs(30),
            order_number_attempts: 3,
            bill_policy: BillPolicy::default(),
        }
    }
}
