use super::materializer::Materializer;
use super::reconciler::Reconciler;
use super::{Collaborators, bounded};
use crate::config::EngineConfig;
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::ports::{
    CartServiceRef, ClockRef, NotifierRef, OrderServiceRef, ScheduledOrderStoreRef,
};
use crate::domain::scheduled_order::{ScheduledOrder, ScheduledOrderStatus};
use crate::error::{Result, SchedulerError};
use std::time::Duration;
use uuid::Uuid;

/// How one execution attempt of a claimed scheduled order ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed(ScheduledOrder),
    Failed(ScheduledOrder),
    /// A transient error; the order is back to `pending`.
    Retrying(ScheduledOrder),
    /// The real order exists but the scheduled order could not be marked
    /// completed. It stays `processing` until [`Executor::recover`] settles it.
    Stranded { id: Uuid, order_number: String },
}

enum Attempt {
    Completed(ScheduledOrder),
    Rejected(String),
}

/// The reconcile-then-materialize path shared by the scheduler loop and
/// immediate execution, including failure classification and retry bookkeeping.
pub struct Executor {
    store: ScheduledOrderStoreRef,
    orders: OrderServiceRef,
    carts: CartServiceRef,
    notifier: NotifierRef,
    clock: ClockRef,
    reconciler: Reconciler,
    materializer: Materializer,
    max_retries: u32,
    call_timeout: Duration,
}

impl Executor {
    pub fn new(collaborators: &Collaborators, config: &EngineConfig) -> Self {
        Self {
            store: collaborators.store.clone(),
            orders: collaborators.orders.clone(),
            carts: collaborators.carts.clone(),
            notifier: collaborators.notifier.clone(),
            clock: collaborators.clock.clone(),
            reconciler: Reconciler::new(collaborators.catalog.clone(), config.call_timeout),
            materializer: Materializer::new(collaborators, config),
            max_retries: config.max_retries.max(1),
            call_timeout: config.call_timeout,
        }
    }

    /// Atomically moves a `pending` order to `processing`.
    ///
    /// Returns `None` if another writer changed the record since it was read.
    pub async fn claim(&self, order: &ScheduledOrder) -> Result<Option<ScheduledOrder>> {
        let mut next = order.clone();
        next.claim(self.clock.now())?;
        self.store.replace(order, next).await
    }

    /// Runs a claimed order to its next resting state.
    ///
    /// Only store failures while recording the outcome surface as errors.
    pub async fn execute(&self, claimed: ScheduledOrder) -> Result<ExecutionOutcome> {
        match self.attempt(&claimed).await {
            Ok(Attempt::Completed(stored)) => {
                tracing::info!(
                    scheduled_order_id = %stored.id,
                    user_id = %stored.user_id,
                    "scheduled order completed"
                );
                self.notify_completed(&stored).await;
                Ok(ExecutionOutcome::Completed(stored))
            }
            Ok(Attempt::Rejected(reason)) => self.finish_failed(&claimed, reason).await,
            Err(SchedulerError::CompletionNotRecorded {
                id,
                order_number,
                reason,
            }) => {
                tracing::error!(
                    scheduled_order_id = %id,
                    %order_number,
                    "order placed but completion was not recorded: {}",
                    reason
                );
                Ok(ExecutionOutcome::Stranded { id, order_number })
            }
            Err(e) if !e.is_transient() => self.finish_failed(&claimed, e.to_string()).await,
            Err(e) => self.finish_retry(&claimed, e).await,
        }
    }

    /// Settles an order left `processing` by an execution that never
    /// recorded its outcome.
    ///
    /// If the order service holds an order for it, the scheduled order is
    /// completed with that order. Otherwise the lost attempt counts as a
    /// transient failure, so the order is retried or, once retries are spent,
    /// failed.
    pub async fn recover(&self, stale: ScheduledOrder) -> Result<ExecutionOutcome> {
        let placed = bounded(
            "order lookup",
            self.call_timeout,
            self.orders.find_by_source(stale.id),
        )
        .await?;

        let Some(receipt) = placed else {
            tracing::warn!(
                scheduled_order_id = %stale.id,
                since = %stale.updated_at,
                "no order was placed for stale processing order"
            );
            return self
                .finish_retry(&stale, SchedulerError::ExecutionInterrupted(stale.id))
                .await;
        };

        let mut completed = stale.clone();
        completed.complete(
            self.clock.now(),
            receipt.order_id,
            receipt.order_number,
            Vec::new(),
        )?;
        let stored = self.write(&stale, completed).await?;
        tracing::warn!(
            scheduled_order_id = %stored.id,
            order_number = stored.result_order_number.as_deref().unwrap_or_default(),
            "recorded completion of stale processing order"
        );

        if let Err(e) = bounded(
            "cart clear",
            self.call_timeout,
            self.carts.clear(&stored.user_id),
        )
        .await
        {
            tracing::error!(scheduled_order_id = %stored.id, "failed to clear cart: {}", e);
        }
        self.notify_completed(&stored).await;
        Ok(ExecutionOutcome::Completed(stored))
    }

    async fn attempt(&self, claimed: &ScheduledOrder) -> Result<Attempt> {
        let reconciliation = self.reconciler.reconcile(&claimed.cart_snapshot).await?;
        if let Some(reason) = reconciliation.failure_reason() {
            return Ok(Attempt::Rejected(reason));
        }
        let stored = self
            .materializer
            .materialize(claimed, reconciliation.price_changes)
            .await?;
        Ok(Attempt::Completed(stored))
    }

    async fn finish_failed(
        &self,
        claimed: &ScheduledOrder,
        reason: String,
    ) -> Result<ExecutionOutcome> {
        let mut failed = claimed.clone();
        failed.fail(self.clock.now(), reason)?;
        let stored = self.write(claimed, failed).await?;
        tracing::warn!(
            scheduled_order_id = %stored.id,
            reason = stored.failure_reason.as_deref().unwrap_or_default(),
            "scheduled order failed"
        );
        self.notify_failed(&stored).await;
        Ok(ExecutionOutcome::Failed(stored))
    }

    async fn finish_retry(
        &self,
        claimed: &ScheduledOrder,
        error: SchedulerError,
    ) -> Result<ExecutionOutcome> {
        let mut next = claimed.clone();
        next.record_transient_failure(self.clock.now(), error.to_string(), self.max_retries)?;
        let stored = self.write(claimed, next).await?;

        if stored.status == ScheduledOrderStatus::Failed {
            tracing::warn!(
                scheduled_order_id = %stored.id,
                attempts = stored.retry_count,
                "retries exhausted: {}",
                error
            );
            self.notify_failed(&stored).await;
            Ok(ExecutionOutcome::Failed(stored))
        } else {
            tracing::error!(
                scheduled_order_id = %stored.id,
                attempt = stored.retry_count,
                max_retries = self.max_retries,
                "execution attempt failed, will retry: {}",
                error
            );
            Ok(ExecutionOutcome::Retrying(stored))
        }
    }

    async fn write(&self, current: &ScheduledOrder, next: ScheduledOrder) -> Result<ScheduledOrder> {
        self.store
            .replace(current, next)
            .await?
            .ok_or(SchedulerError::ConcurrentModification(current.id))
    }

    async fn notify_completed(&self, order: &ScheduledOrder) {
        let order_number = order.result_order_number.clone().unwrap_or_default();
        self.notify(
            order,
            NotificationKind::Completed,
            "Your scheduled order has been placed",
            format!(
                "Order {} for {} is on its way.",
                order_number, order.bill_snapshot.total_amount
            ),
        )
        .await;
    }

    async fn notify_failed(&self, order: &ScheduledOrder) {
        let reason = order.failure_reason.clone().unwrap_or_default();
        self.notify(
            order,
            NotificationKind::Failed,
            "Your scheduled order could not be placed",
            reason,
        )
        .await;
    }

    async fn notify(
        &self,
        order: &ScheduledOrder,
        kind: NotificationKind,
        title: &str,
        message: String,
    ) {
        let notification = Notification {
            kind,
            scheduled_order_id: order.id,
            title: title.to_string(),
            message,
        };
        if let Err(e) = bounded(
            "notification",
            self.call_timeout,
            self.notifier.send(&order.user_id, notification),
        )
        .await
        {
            tracing::error!(scheduled_order_id = %order.id, "failed to send notification: {}", e);
        }
    }
}
