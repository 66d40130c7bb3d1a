use super::catalog::{ProductRecord, StockLine};
use super::notification::Notification;
use super::order::{DeliveryAddress, NewOrder, OrderReceipt};
use super::scheduled_order::{ScheduledOrder, ScheduledOrderStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Durable home of scheduled orders.
///
/// Writes after the initial insert go through [`ScheduledOrderStore::replace`],
/// a compare-and-swap on the record version.
#[async_trait]
pub trait ScheduledOrderStore: Send + Sync {
    async fn insert(&self, order: ScheduledOrder) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<ScheduledOrder>>;
    /// Orders owned by `user_id`, ascending by scheduled time.
    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<ScheduledOrderStatus>,
    ) -> Result<Vec<ScheduledOrder>>;
    /// `pending` orders scheduled at or before `cutoff`, ascending by scheduled time.
    async fn find_due(&self, cutoff: DateTime<Utc>) -> Result<Vec<ScheduledOrder>>;
    /// `pending` orders not yet reminded whose scheduled time lies in `[from, to]`.
    async fn find_reminder_candidates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduledOrder>>;
    /// `processing` orders whose last write is at or before `older_than`:
    /// executions that never recorded an outcome.
    async fn find_stale_processing(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<ScheduledOrder>>;
    /// Stores `next` if the stored record still has `current.version`.
    ///
    /// Returns the written record (with its bumped version), or `None` when
    /// another writer got there first.
    async fn replace(
        &self,
        current: &ScheduledOrder,
        next: ScheduledOrder,
    ) -> Result<Option<ScheduledOrder>>;
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_product(&self, product_id: &str) -> Result<Option<ProductRecord>>;
    /// Takes every line out of stock, or none of them.
    async fn reserve_stock(&self, lines: &[StockLine]) -> Result<()>;
    /// Puts previously reserved stock back.
    async fn release_stock(&self, lines: &[StockLine]) -> Result<()>;
}

#[async_trait]
pub trait AddressBook: Send + Sync {
    /// Resolves an address only if it exists and belongs to `user_id`.
    async fn resolve(&self, user_id: &str, address_id: &str) -> Result<Option<DeliveryAddress>>;
}

/// Places real orders.
///
/// Creation is idempotent per scheduled order: a second `create` carrying the
/// same `source_scheduled_order_id` returns the receipt of the order already
/// placed instead of placing another.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Fails with `OrderNumberConflict` when the number is already taken by
    /// another scheduled order.
    async fn create(&self, order: NewOrder) -> Result<OrderReceipt>;
    /// The order placed for a scheduled order, if any.
    async fn find_by_source(&self, scheduled_order_id: Uuid) -> Result<Option<OrderReceipt>>;
}

#[async_trait]
pub trait CartService: Send + Sync {
    async fn clear(&self, user_id: &str) -> Result<()>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_id: &str, notification: Notification) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type ScheduledOrderStoreRef = Arc<dyn ScheduledOrderStore>;
pub type CatalogRef = Arc<dyn Catalog>;
pub type AddressBookRef = Arc<dyn AddressBook>;
pub type OrderServiceRef = Arc<dyn OrderService>;
pub type CartServiceRef = Arc<dyn CartService>;
pub type NotifierRef = Arc<dyn Notifier>;
pub type ClockRef = Arc<dyn Clock>;
