//! Application layer containing the scheduled-order use cases.
//!
//! `ScheduledOrderService` serves user requests against the store. The
//! `SchedulerLoop` and `ReminderNotifier` are the two periodic drivers; both
//! scheduled and immediate execution share the `Executor`, which runs the
//! `Reconciler` and then the `Materializer`.

pub mod execution;
pub mod materializer;
pub mod reconciler;
pub mod reminder;
pub mod scheduler;
pub mod service;

use crate::domain::ports::{
    AddressBookRef, CartServiceRef, CatalogRef, ClockRef, NotifierRef, OrderServiceRef,
    ScheduledOrderStoreRef,
};
use crate::error::{Result, SchedulerError};
use std::future::Future;
use std::time::Duration;

/// The store and external collaborators the engine is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: ScheduledOrderStoreRef,
    pub catalog: CatalogRef,
    pub addresses: AddressBookRef,
    pub orders: OrderServiceRef,
    pub carts: CartServiceRef,
    pub notifier: NotifierRef,
    pub clock: ClockRef,
}

/// Runs a collaborator call with a deadline, turning expiry into a timeout error.
pub(crate) async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(SchedulerError::Timeout {
            operation,
            limit,
        }),
    }
}
