use crate::domain::cart::CartLine;
use crate::domain::catalog::{ProductRecord, StockLine};
use crate::domain::notification::Notification;
use crate::domain::order::{DeliveryAddress, NewOrder, OrderReceipt};
use crate::domain::ports::{
    AddressBook, CartService, Catalog, Notifier, OrderService, ScheduledOrderStore,
};
use crate::domain::scheduled_order::{ScheduledOrder, ScheduledOrderStatus};
use crate::error::{Result, SchedulerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory store for scheduled orders.
///
/// Uses `Arc<RwLock<HashMap<Uuid, ScheduledOrder>>>`; the version check in
/// `replace` happens under the write lock, which makes it a true compare-and-swap.
#[derive(Default, Clone)]
pub struct InMemoryScheduledOrderStore {
    orders: Arc<RwLock<HashMap<Uuid, ScheduledOrder>>>,
}

impl InMemoryScheduledOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn by_schedule(mut orders: Vec<ScheduledOrder>) -> Vec<ScheduledOrder> {
    orders.sort_by(|a, b| {
        a.scheduled_time
            .cmp(&b.scheduled_time)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    orders
}

#[async_trait]
impl ScheduledOrderStore for InMemoryScheduledOrderStore {
    async fn insert(&self, order: ScheduledOrder) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(SchedulerError::ValidationError(format!(
                "Scheduled order {} already exists",
                order.id
            )));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScheduledOrder>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<ScheduledOrderStatus>,
    ) -> Result<Vec<ScheduledOrder>> {
        let orders = self.orders.read().await;
        Ok(by_schedule(
            orders
                .values()
                .filter(|o| o.user_id == user_id && status.is_none_or(|s| o.status == s))
                .cloned()
                .collect(),
        ))
    }

    async fn find_due(&self, cutoff: DateTime<Utc>) -> Result<Vec<ScheduledOrder>> {
        let orders = self.orders.read().await;
        Ok(by_schedule(
            orders
                .values()
                .filter(|o| o.status == ScheduledOrderStatus::Pending && o.scheduled_time <= cutoff)
                .cloned()
                .collect(),
        ))
    }

    async fn find_reminder_candidates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduledOrder>> {
        let orders = self.orders.read().await;
        Ok(by_schedule(
            orders
                .values()
                .filter(|o| {
                    o.status == ScheduledOrderStatus::Pending
                        && !o.reminder_sent
                        && o.scheduled_time >= from
                        && o.scheduled_time <= to
                })
                .cloned()
                .collect(),
        ))
    }

    async fn find_stale_processing(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<ScheduledOrder>> {
        let orders = self.orders.read().await;
        Ok(by_schedule(
            orders
                .values()
                .filter(|o| {
                    o.status == ScheduledOrderStatus::Processing && o.updated_at <= older_than
                })
                .cloned()
                .collect(),
        ))
    }

    async fn replace(
        &self,
        current: &ScheduledOrder,
        mut next: ScheduledOrder,
    ) -> Result<Option<ScheduledOrder>> {
        let mut orders = self.orders.write().await;
        match orders.get(&current.id) {
            Some(stored) if stored.version == current.version => {
                next.version = current.version + 1;
                orders.insert(next.id, next.clone());
                Ok(Some(next))
            }
            Some(_) => Ok(None),
            None => Err(SchedulerError::NotFound(current.id)),
        }
    }
}

/// An in-memory product catalog.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<String, ProductRecord>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, product: ProductRecord) {
        let mut products = self.products.write().await;
        products.insert(product.product_id.clone(), product);
    }

    pub async fn stock(&self, product_id: &str) -> Option<u32> {
        let products = self.products.read().await;
        products.get(product_id).map(|p| p.stock)
    }
}

/// Sums quantities per product so repeated lines are checked against the total.
fn totals(lines: &[StockLine]) -> HashMap<&str, u64> {
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for line in lines {
        *totals.entry(line.product_id.as_str()).or_default() += u64::from(line.quantity);
    }
    totals
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_product(&self, product_id: &str) -> Result<Option<ProductRecord>> {
        let products = self.products.read().await;
        Ok(products.get(product_id).cloned())
    }

    async fn reserve_stock(&self, lines: &[StockLine]) -> Result<()> {
        let mut products = self.products.write().await;
        let wanted = totals(lines);

        for (product_id, requested) in &wanted {
            let available = products
                .get(*product_id)
                .filter(|p| p.is_available)
                .map_or(0, |p| p.stock);
            if u64::from(available) < *requested {
                return Err(SchedulerError::StockConflict {
                    product_id: product_id.to_string(),
                    requested: *requested,
                    available,
                });
            }
        }
        for (product_id, requested) in wanted {
            if let Some(product) = products.get_mut(product_id) {
                // Bounded by the stock checked above.
                product.stock = (u64::from(product.stock) - requested) as u32;
            }
        }
        Ok(())
    }

    async fn release_stock(&self, lines: &[StockLine]) -> Result<()> {
        let mut products = self.products.write().await;
        for (product_id, quantity) in totals(lines) {
            if let Some(product) = products.get_mut(product_id) {
                let restored = u64::from(product.stock) + quantity;
                product.stock = u32::try_from(restored).unwrap_or(u32::MAX);
            }
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryAddressBook {
    addresses: Arc<RwLock<HashMap<String, DeliveryAddress>>>,
}

impl InMemoryAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, address: DeliveryAddress) {
        let mut addresses = self.addresses.write().await;
        addresses.insert(address.id.clone(), address);
    }

    pub async fn remove(&self, address_id: &str) {
        let mut addresses = self.addresses.write().await;
        addresses.remove(address_id);
    }
}

#[async_trait]
impl AddressBook for InMemoryAddressBook {
    async fn resolve(&self, user_id: &str, address_id: &str) -> Result<Option<DeliveryAddress>> {
        let addresses = self.addresses.read().await;
        Ok(addresses
            .get(address_id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }
}

/// Keeps created orders, keyed by order number, which must be unique.
/// At most one order is kept per scheduled order.
#[derive(Default, Clone)]
pub struct InMemoryOrderBook {
    orders: Arc<RwLock<HashMap<String, NewOrder>>>,
}

impl InMemoryOrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn orders(&self) -> Vec<NewOrder> {
        let orders = self.orders.read().await;
        orders.values().cloned().collect()
    }

    pub async fn find(&self, order_id: Uuid) -> Option<NewOrder> {
        let orders = self.orders.read().await;
        orders.values().find(|o| o.order_id == order_id).cloned()
    }
}

fn receipt(order: &NewOrder) -> OrderReceipt {
    OrderReceipt {
        order_id: order.order_id,
        order_number: order.order_number.clone(),
    }
}

#[async_trait]
impl OrderService for InMemoryOrderBook {
    async fn create(&self, order: NewOrder) -> Result<OrderReceipt> {
        let mut orders = self.orders.write().await;
        if let Some(existing) = orders
            .values()
            .find(|o| o.source_scheduled_order_id == order.source_scheduled_order_id)
        {
            return Ok(receipt(existing));
        }
        if orders.contains_key(&order.order_number) {
            return Err(SchedulerError::OrderNumberConflict(order.order_number));
        }
        let placed = receipt(&order);
        orders.insert(order.order_number.clone(), order);
        Ok(placed)
    }

    async fn find_by_source(&self, scheduled_order_id: Uuid) -> Result<Option<OrderReceipt>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .find(|o| o.source_scheduled_order_id == scheduled_order_id)
            .map(receipt))
    }
}

/// Live shopping carts, keyed by user.
#[derive(Default, Clone)]
pub struct InMemoryCarts {
    carts: Arc<RwLock<HashMap<String, Vec<CartLine>>>>,
}

impl InMemoryCarts {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, user_id: &str, lines: Vec<CartLine>) {
        let mut carts = self.carts.write().await;
        carts.insert(user_id.to_string(), lines);
    }

    pub async fn lines(&self, user_id: &str) -> Vec<CartLine> {
        let carts = self.carts.read().await;
        carts.get(user_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CartService for InMemoryCarts {
    async fn clear(&self, user_id: &str) -> Result<()> {
        let mut carts = self.carts.write().await;
        carts.remove(user_id);
        Ok(())
    }
}

/// Records every notification instead of delivering it.
#[derive(Default, Clone)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<(String, Notification)>>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(String, Notification)> {
        let sent = self.sent.read().await;
        sent.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, user_id: &str, notification: Notification) -> Result<()> {
        tracing::debug!(%user_id, kind = ?notification.kind, "notification recorded");
        let mut sent = self.sent.write().await;
        sent.push((user_id.to_string(), notification));
        Ok(())
    }
}
