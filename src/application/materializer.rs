use super::{Collaborators, bounded};
use crate::config::EngineConfig;
use crate::domain::catalog::StockLine;
use crate::domain::order::{DeliveryAddress, NewOrder, OrderReceipt, PaymentStatus};
use crate::domain::ports::{
    AddressBookRef, CartServiceRef, CatalogRef, ClockRef, OrderServiceRef, ScheduledOrderStoreRef,
};
use crate::domain::scheduled_order::{PriceChangeNote, ScheduledOrder, ScheduledOrderStatus};
use crate::error::{Result, SchedulerError};
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Human-readable order number: `ORD-<yyyymmdd>-<8 hex chars>`.
///
/// Uniqueness is enforced by the order service; callers retry on conflict.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

/// Turns a reconciled, claimed scheduled order into a real order.
///
/// Charges the frozen bill and frozen lines, never live prices. Stock is taken
/// in one atomic reservation before the order is created and released again
/// if creation fails. The order service dedupes on the scheduled order id, so
/// a retry after an ambiguous failure never places a second order.
pub struct Materializer {
    store: ScheduledOrderStoreRef,
    catalog: CatalogRef,
    addresses: AddressBookRef,
    orders: OrderServiceRef,
    carts: CartServiceRef,
    clock: ClockRef,
    call_timeout: Duration,
    order_number_attempts: u32,
}

impl Materializer {
    pub fn new(collaborators: &Collaborators, config: &EngineConfig) -> Self {
        Self {
            store: collaborators.store.clone(),
            catalog: collaborators.catalog.clone(),
            addresses: collaborators.addresses.clone(),
            orders: collaborators.orders.clone(),
            carts: collaborators.carts.clone(),
            clock: collaborators.clock.clone(),
            call_timeout: config.call_timeout,
            order_number_attempts: config.order_number_attempts.max(1),
        }
    }

    /// Places the order and records the scheduled order as `completed`.
    ///
    /// Returns the stored, completed record. Errors raised before the order
    /// exists leave stock untouched; `CompletionNotRecorded` means the order
    /// exists but the scheduled order is still `processing`.
    pub async fn materialize(
        &self,
        claimed: &ScheduledOrder,
        price_changes: Vec<PriceChangeNote>,
    ) -> Result<ScheduledOrder> {
        if claimed.status != ScheduledOrderStatus::Processing {
            return Err(SchedulerError::StateConflict {
                id: claimed.id,
                status: claimed.status,
                expected: ScheduledOrderStatus::Processing,
            });
        }

        let address = bounded(
            "address lookup",
            self.call_timeout,
            self.addresses.resolve(&claimed.user_id, &claimed.address_id),
        )
        .await?
        .ok_or_else(|| SchedulerError::AddressUnavailable(claimed.address_id.clone()))?;

        let lines: Vec<StockLine> = claimed
            .cart_snapshot
            .items()
            .iter()
            .map(|line| StockLine {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
            })
            .collect();

        bounded(
            "stock reservation",
            self.call_timeout,
            self.catalog.reserve_stock(&lines),
        )
        .await?;

        let receipt = match self.place_order(claimed, address).await {
            Ok(receipt) => receipt,
            Err(e) => match self.placed_despite(claimed.id, &e).await {
                Some(receipt) => receipt,
                None => {
                    self.release(claimed.id, &lines).await;
                    return Err(e);
                }
            },
        };

        tracing::info!(
            scheduled_order_id = %claimed.id,
            order_number = %receipt.order_number,
            total = %claimed.bill_snapshot.total_amount,
            "order placed"
        );

        let mut completed = claimed.clone();
        completed.complete(
            self.clock.now(),
            receipt.order_id,
            receipt.order_number.clone(),
            price_changes,
        )?;

        let stored = match self.store.replace(claimed, completed).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                return Err(SchedulerError::CompletionNotRecorded {
                    id: claimed.id,
                    order_number: receipt.order_number,
                    reason: "record changed concurrently".to_string(),
                });
            }
            Err(e) => {
                return Err(SchedulerError::CompletionNotRecorded {
                    id: claimed.id,
                    order_number: receipt.order_number,
                    reason: e.to_string(),
                });
            }
        };

        // The whole live cart goes, including items added after scheduling.
        if let Err(e) = bounded(
            "cart clear",
            self.call_timeout,
            self.carts.clear(&claimed.user_id),
        )
        .await
        {
            tracing::error!(
                user_id = %claimed.user_id,
                scheduled_order_id = %claimed.id,
                "failed to clear cart after placing order: {}",
                e
            );
        }

        Ok(stored)
    }

    async fn place_order(
        &self,
        claimed: &ScheduledOrder,
        address: DeliveryAddress,
    ) -> Result<OrderReceipt> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let order = NewOrder {
                order_id: Uuid::new_v4(),
                order_number: generate_order_number(self.clock.now()),
                user_id: claimed.user_id.clone(),
                items: claimed.cart_snapshot.items().to_vec(),
                address: address.clone(),
                bill: claimed.bill_snapshot,
                payment_type: claimed.payment_type,
                payment_status: PaymentStatus::from(claimed.payment_type),
                source_scheduled_order_id: claimed.id,
            };

            match bounded("order creation", self.call_timeout, self.orders.create(order)).await {
                Err(SchedulerError::OrderNumberConflict(number))
                    if attempt < self.order_number_attempts =>
                {
                    tracing::warn!(%number, attempt, "order number taken, generating another");
                }
                other => return other,
            }
        }
    }

    /// A failed `create` may still have placed the order: a deadline can
    /// expire after the order service committed. Asks the service before the
    /// stock reservation is given back.
    async fn placed_despite(&self, id: Uuid, error: &SchedulerError) -> Option<OrderReceipt> {
        if matches!(error, SchedulerError::OrderNumberConflict(_)) {
            return None;
        }
        match bounded(
            "order lookup",
            self.call_timeout,
            self.orders.find_by_source(id),
        )
        .await
        {
            Ok(Some(receipt)) => {
                tracing::warn!(
                    scheduled_order_id = %id,
                    order_number = %receipt.order_number,
                    "order creation reported an error but the order was placed: {}",
                    error
                );
                Some(receipt)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::error!(
                    scheduled_order_id = %id,
                    "could not check whether the order was placed: {}",
                    e
                );
                None
            }
        }
    }

    async fn release(&self, id: Uuid, lines: &[StockLine]) {
        match bounded(
            "stock release",
            self.call_timeout,
            self.catalog.release_stock(lines),
        )
        .await
        {
            Ok(()) => tracing::info!(scheduled_order_id = %id, "released reserved stock"),
            Err(e) => tracing::error!(
                scheduled_order_id = %id,
                "failed to release reserved stock, catalog needs correction: {}",
                e
            ),
        }
    }
}
