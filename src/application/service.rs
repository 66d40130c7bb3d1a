use super::execution::{ExecutionOutcome, Executor};
use crate::config::EngineConfig;
use crate::domain::bill::compute_bill;
use crate::domain::ports::{AddressBookRef, ClockRef, ScheduledOrderStoreRef};
use crate::domain::scheduled_order::{
    MAX_NOTES_LEN, NewScheduledOrder, ScheduledOrder, ScheduledOrderStatus,
};
use crate::error::{Result, SchedulerError};
use std::sync::Arc;
use uuid::Uuid;

/// Re-reads allowed when a write loses a race that left the order `pending`
/// (e.g. the reminder flag was set in between).
const WRITE_ATTEMPTS: usize = 3;

/// User-facing operations on scheduled orders.
///
/// Every operation is scoped to the calling user: orders owned by someone
/// else are reported as not found.
pub struct ScheduledOrderService {
    store: ScheduledOrderStoreRef,
    addresses: AddressBookRef,
    clock: ClockRef,
    executor: Arc<Executor>,
    config: EngineConfig,
}

impl ScheduledOrderService {
    pub fn new(
        store: ScheduledOrderStoreRef,
        addresses: AddressBookRef,
        clock: ClockRef,
        executor: Arc<Executor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            addresses,
            clock,
            executor,
            config,
        }
    }

    /// Validates and persists a new `pending` scheduled order.
    pub async fn create(&self, request: NewScheduledOrder) -> Result<ScheduledOrder> {
        let now = self.clock.now();

        if request.user_id.trim().is_empty() {
            return Err(SchedulerError::ValidationError(
                "User id is required".to_string(),
            ));
        }
        let earliest = now + self.config.min_lead_time;
        if request.scheduled_time < earliest {
            return Err(SchedulerError::ValidationError(format!(
                "Scheduled time must be at least {} minutes from now (earliest {})",
                self.config.min_lead_time.num_minutes(),
                earliest.to_rfc3339()
            )));
        }
        if let Some(notes) = &request.notes
            && notes.chars().count() > MAX_NOTES_LEN
        {
            return Err(SchedulerError::ValidationError(format!(
                "Notes must be at most {} characters",
                MAX_NOTES_LEN
            )));
        }
        let expected_bill = compute_bill(request.cart_snapshot.items(), &self.config.bill_policy);
        if request.bill_snapshot != expected_bill {
            return Err(SchedulerError::ValidationError(
                "Bill snapshot does not match the cart snapshot".to_string(),
            ));
        }
        if self
            .addresses
            .resolve(&request.user_id, &request.address_id)
            .await?
            .is_none()
        {
            return Err(SchedulerError::ValidationError(format!(
                "Address {} not found",
                request.address_id
            )));
        }

        let order = ScheduledOrder::new(request, now);
        self.store.insert(order.clone()).await?;
        tracing::info!(
            scheduled_order_id = %order.id,
            user_id = %order.user_id,
            scheduled_time = %order.scheduled_time,
            total = %order.bill_snapshot.total_amount,
            "scheduled order created"
        );
        Ok(order)
    }

    pub async fn list(
        &self,
        user_id: &str,
        status: Option<ScheduledOrderStatus>,
    ) -> Result<Vec<ScheduledOrder>> {
        self.store.list_for_user(user_id, status).await
    }

    pub async fn get(&self, user_id: &str, id: Uuid) -> Result<ScheduledOrder> {
        match self.store.get(id).await? {
            Some(order) if order.user_id == user_id => Ok(order),
            _ => Err(SchedulerError::NotFound(id)),
        }
    }

    /// Cancels a `pending` order. Any other status is rejected untouched.
    pub async fn cancel(&self, user_id: &str, id: Uuid) -> Result<ScheduledOrder> {
        for _ in 0..WRITE_ATTEMPTS {
            let current = self.get(user_id, id).await?;
            let mut next = current.clone();
            next.cancel(self.clock.now())?;
            if let Some(stored) = self.store.replace(&current, next).await? {
                tracing::info!(scheduled_order_id = %id, "scheduled order cancelled");
                return Ok(stored);
            }
        }
        Err(SchedulerError::ConcurrentModification(id))
    }

    /// Executes a `pending` order right away, outside the schedule.
    ///
    /// Returns the order in whatever state the attempt left it: `completed`,
    /// `failed`, or back to `pending` with a bumped retry count.
    pub async fn execute_now(&self, user_id: &str, id: Uuid) -> Result<ScheduledOrder> {
        for _ in 0..WRITE_ATTEMPTS {
            let current = self.get(user_id, id).await?;
            let Some(claimed) = self.executor.claim(&current).await? else {
                continue;
            };
            tracing::info!(scheduled_order_id = %id, "executing scheduled order on request");
            return match self.executor.execute(claimed).await? {
                ExecutionOutcome::Completed(order)
                | ExecutionOutcome::Failed(order)
                | ExecutionOutcome::Retrying(order) => Ok(order),
                ExecutionOutcome::Stranded { id, order_number } => {
                    Err(SchedulerError::CompletionNotRecorded {
                        id,
                        order_number,
                        reason: "a later tick settles it".to_string(),
                    })
                }
            };
        }
        Err(SchedulerError::ConcurrentModification(id))
    }
}
