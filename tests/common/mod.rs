#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use scheduled_orders::application::Collaborators;
use scheduled_orders::config::EngineConfig;
use scheduled_orders::domain::bill::compute_bill;
use scheduled_orders::domain::cart::{CartLine, CartSnapshot};
use scheduled_orders::domain::catalog::{ProductRecord, StockLine};
use scheduled_orders::domain::money::Money;
use scheduled_orders::domain::order::{DeliveryAddress, NewOrder, OrderReceipt};
use scheduled_orders::domain::ports::{
    Catalog, CatalogRef, OrderService, OrderServiceRef, ScheduledOrderStore,
    ScheduledOrderStoreRef,
};
use scheduled_orders::domain::scheduled_order::{
    NewScheduledOrder, PaymentType, ScheduledOrder, ScheduledOrderStatus,
};
use scheduled_orders::engine::SchedulingEngine;
use scheduled_orders::error::{Result, SchedulerError};
use scheduled_orders::infrastructure::clock::ManualClock;
use scheduled_orders::infrastructure::in_memory::{
    InMemoryAddressBook, InMemoryCarts, InMemoryCatalog, InMemoryNotifier, InMemoryOrderBook,
    InMemoryScheduledOrderStore,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

pub const USER: &str = "user-1";
pub const OTHER_USER: &str = "user-2";
pub const HOME: &str = "home";

pub fn line(product_id: &str, price: Decimal, quantity: u32) -> CartLine {
    CartLine {
        product_id: product_id.to_string(),
        name: format!("Product {}", product_id),
        unit: "1 pc".to_string(),
        price: Money::new(price),
        quantity,
    }
}

pub fn product(product_id: &str, price: Decimal, stock: u32) -> ProductRecord {
    ProductRecord {
        product_id: product_id.to_string(),
        name: format!("Product {}", product_id),
        price: Money::new(price),
        stock,
        is_available: true,
    }
}

pub fn address(id: &str, user_id: &str) -> DeliveryAddress {
    DeliveryAddress {
        id: id.to_string(),
        user_id: user_id.to_string(),
        name: "Asha Rao".to_string(),
        phone: "9876543210".to_string(),
        address_line1: "12 MG Road".to_string(),
        address_line2: Some("Flat 4B".to_string()),
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        pincode: "560001".to_string(),
    }
}

/// Everything a test needs: the engine plus handles on each in-memory collaborator.
pub struct World {
    pub clock: ManualClock,
    pub store: InMemoryScheduledOrderStore,
    pub catalog: InMemoryCatalog,
    pub addresses: InMemoryAddressBook,
    pub orders: InMemoryOrderBook,
    pub carts: InMemoryCarts,
    pub notifier: InMemoryNotifier,
    pub config: EngineConfig,
    pub engine: SchedulingEngine,
}

impl World {
    pub async fn new() -> Self {
        Self::build(
            EngineConfig::default(),
            |c| Arc::new(c) as CatalogRef,
            |o| Arc::new(o) as OrderServiceRef,
        )
        .await
    }

    pub async fn with_orders<F>(wrap_orders: F) -> Self
    where
        F: FnOnce(InMemoryOrderBook) -> OrderServiceRef,
    {
        Self::build(EngineConfig::default(), |c| Arc::new(c) as CatalogRef, wrap_orders).await
    }

    pub async fn build<C, O>(config: EngineConfig, wrap_catalog: C, wrap_orders: O) -> Self
    where
        C: FnOnce(InMemoryCatalog) -> CatalogRef,
        O: FnOnce(InMemoryOrderBook) -> OrderServiceRef,
    {
        Self::build_with_store(
            config,
            |s| Arc::new(s) as ScheduledOrderStoreRef,
            wrap_catalog,
            wrap_orders,
        )
        .await
    }

    pub async fn with_store<S>(wrap_store: S) -> Self
    where
        S: FnOnce(InMemoryScheduledOrderStore) -> ScheduledOrderStoreRef,
    {
        Self::build_with_store(
            EngineConfig::default(),
            wrap_store,
            |c| Arc::new(c) as CatalogRef,
            |o| Arc::new(o) as OrderServiceRef,
        )
        .await
    }

    pub async fn build_with_store<S, C, O>(
        config: EngineConfig,
        wrap_store: S,
        wrap_catalog: C,
        wrap_orders: O,
    ) -> Self
    where
        S: FnOnce(InMemoryScheduledOrderStore) -> ScheduledOrderStoreRef,
        C: FnOnce(InMemoryCatalog) -> CatalogRef,
        O: FnOnce(InMemoryOrderBook) -> OrderServiceRef,
    {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 17, 0, 0).unwrap());
        let store = InMemoryScheduledOrderStore::new();
        let catalog = InMemoryCatalog::new();
        let addresses = InMemoryAddressBook::new();
        let orders = InMemoryOrderBook::new();
        let carts = InMemoryCarts::new();
        let notifier = InMemoryNotifier::new();

        addresses.add(address(HOME, USER)).await;
        addresses.add(address("office", OTHER_USER)).await;

        let engine = SchedulingEngine::new(
            Collaborators {
                store: wrap_store(store.clone()),
                catalog: wrap_catalog(catalog.clone()),
                addresses: Arc::new(addresses.clone()),
                orders: wrap_orders(orders.clone()),
                carts: Arc::new(carts.clone()),
                notifier: Arc::new(notifier.clone()),
                clock: Arc::new(clock.clone()),
            },
            config.clone(),
        );

        Self {
            clock,
            store,
            catalog,
            addresses,
            orders,
            carts,
            notifier,
            config,
            engine,
        }
    }

    pub fn request(
        &self,
        lines: Vec<CartLine>,
        in_minutes: i64,
        payment_type: PaymentType,
    ) -> NewScheduledOrder {
        let cart_snapshot = CartSnapshot::new(lines).unwrap();
        let bill_snapshot = compute_bill(cart_snapshot.items(), &self.config.bill_policy);
        NewScheduledOrder {
            user_id: USER.to_string(),
            scheduled_time: self.clock_now() + Duration::minutes(in_minutes),
            cart_snapshot,
            bill_snapshot,
            address_id: HOME.to_string(),
            payment_type,
            notes: None,
        }
    }

    pub async fn schedule(&self, lines: Vec<CartLine>, in_minutes: i64) -> ScheduledOrder {
        let request = self.request(lines, in_minutes, PaymentType::Cod);
        self.engine.service.create(request).await.unwrap()
    }

    pub fn clock_now(&self) -> chrono::DateTime<Utc> {
        use scheduled_orders::domain::ports::Clock;
        self.clock.now()
    }

    pub async fn reload(&self, order: &ScheduledOrder) -> ScheduledOrder {
        self.engine.service.get(&order.user_id, order.id).await.unwrap()
    }
}

/// Fails the first `failures` order creations with a collaborator error.
pub struct FlakyOrders {
    inner: InMemoryOrderBook,
    failures_left: AtomicU32,
}

impl FlakyOrders {
    pub fn new(inner: InMemoryOrderBook, failures: u32) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl OrderService for FlakyOrders {
    async fn create(&self, order: NewOrder) -> Result<OrderReceipt> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(SchedulerError::CollaboratorError(
                "order service unreachable".to_string(),
            ));
        }
        self.inner.create(order).await
    }

    async fn find_by_source(&self, scheduled_order_id: Uuid) -> Result<Option<OrderReceipt>> {
        self.inner.find_by_source(scheduled_order_id).await
    }
}

/// Never answers; only a deadline gets the caller out.
pub struct HangingOrders;

#[async_trait]
impl OrderService for HangingOrders {
    async fn create(&self, _order: NewOrder) -> Result<OrderReceipt> {
        std::future::pending().await
    }

    async fn find_by_source(&self, _scheduled_order_id: Uuid) -> Result<Option<OrderReceipt>> {
        Ok(None)
    }
}

/// Commits every order, then answers only after `delay`.
pub struct SlowAck {
    inner: InMemoryOrderBook,
    delay: std::time::Duration,
}

impl SlowAck {
    pub fn new(inner: InMemoryOrderBook, delay: std::time::Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl OrderService for SlowAck {
    async fn create(&self, order: NewOrder) -> Result<OrderReceipt> {
        let receipt = self.inner.create(order).await?;
        tokio::time::sleep(self.delay).await;
        Ok(receipt)
    }

    async fn find_by_source(&self, scheduled_order_id: Uuid) -> Result<Option<OrderReceipt>> {
        self.inner.find_by_source(scheduled_order_id).await
    }
}

/// Reports the first order number as taken, then behaves.
pub struct ConflictOnce {
    inner: InMemoryOrderBook,
    conflicted: AtomicU32,
}

impl ConflictOnce {
    pub fn new(inner: InMemoryOrderBook) -> Self {
        Self {
            inner,
            conflicted: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl OrderService for ConflictOnce {
    async fn create(&self, order: NewOrder) -> Result<OrderReceipt> {
        if self.conflicted.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(SchedulerError::OrderNumberConflict(order.order_number));
        }
        self.inner.create(order).await
    }

    async fn find_by_source(&self, scheduled_order_id: Uuid) -> Result<Option<OrderReceipt>> {
        self.inner.find_by_source(scheduled_order_id).await
    }
}

/// Fails the `fail_on`-th `replace` call (1-based) with a storage error.
pub struct FailingWrites {
    inner: InMemoryScheduledOrderStore,
    calls: AtomicU32,
    fail_on: u32,
}

impl FailingWrites {
    pub fn new(inner: InMemoryScheduledOrderStore, fail_on: u32) -> Self {
        Self {
            inner,
            calls: AtomicU32::new(0),
            fail_on,
        }
    }
}

#[async_trait]
impl ScheduledOrderStore for FailingWrites {
    async fn insert(&self, order: ScheduledOrder) -> Result<()> {
        self.inner.insert(order).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScheduledOrder>> {
        self.inner.get(id).await
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<ScheduledOrderStatus>,
    ) -> Result<Vec<ScheduledOrder>> {
        self.inner.list_for_user(user_id, status).await
    }

    async fn find_due(&self, cutoff: DateTime<Utc>) -> Result<Vec<ScheduledOrder>> {
        self.inner.find_due(cutoff).await
    }

    async fn find_reminder_candidates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduledOrder>> {
        self.inner.find_reminder_candidates(from, to).await
    }

    async fn find_stale_processing(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<ScheduledOrder>> {
        self.inner.find_stale_processing(older_than).await
    }

    async fn replace(
        &self,
        current: &ScheduledOrder,
        next: ScheduledOrder,
    ) -> Result<Option<ScheduledOrder>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
            return Err(SchedulerError::IoError(std::io::Error::other("disk full")));
        }
        self.inner.replace(current, next).await
    }
}

/// Holds every product lookup until the test opens the gate, announcing
/// each lookup on `entered`.
pub struct GatedCatalog {
    inner: InMemoryCatalog,
    pub entered: Arc<Notify>,
    pub gate: Arc<Semaphore>,
}

impl GatedCatalog {
    pub fn new(inner: InMemoryCatalog, entered: Arc<Notify>, gate: Arc<Semaphore>) -> Self {
        Self {
            inner,
            entered,
            gate,
        }
    }
}

#[async_trait]
impl Catalog for GatedCatalog {
    async fn get_product(&self, product_id: &str) -> Result<Option<ProductRecord>> {
        self.entered.notify_one();
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| SchedulerError::CollaboratorError(e.to_string()))?;
        self.inner.get_product(product_id).await
    }

    async fn reserve_stock(&self, lines: &[StockLine]) -> Result<()> {
        self.inner.reserve_stock(lines).await
    }

    async fn release_stock(&self, lines: &[StockLine]) -> Result<()> {
        self.inner.release_stock(lines).await
    }
}
