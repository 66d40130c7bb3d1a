use super::money::Money;
use crate::error::SchedulerError;
use serde::{Deserialize, Serialize};

/// One line of a cart as the user approved it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub unit: String,
    pub price: Money,
    pub quantity: u32,
}

/// The frozen cart captured when an order is scheduled.
///
/// Fields are private so a snapshot can only be built through [`CartSnapshot::new`],
/// which validates the lines and derives `total_items`. Deserialization goes
/// through the same constructor; a stored `total_items` is recomputed, not trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredCartSnapshot")]
pub struct CartSnapshot {
    items: Vec<CartLine>,
    total_items: u32,
}

#[derive(Deserialize)]
struct StoredCartSnapshot {
    items: Vec<CartLine>,
}

impl TryFrom<StoredCartSnapshot> for CartSnapshot {
    type Error = SchedulerError;

    fn try_from(stored: StoredCartSnapshot) -> Result<Self, Self::Error> {
        CartSnapshot::new(stored.items)
    }
}

impl CartSnapshot {
    pub fn new(items: Vec<CartLine>) -> Result<Self, SchedulerError> {
        if items.is_empty() {
            return Err(SchedulerError::ValidationError(
                "Cart snapshot must contain at least one item".to_string(),
            ));
        }
        for line in &items {
            if line.quantity == 0 {
                return Err(SchedulerError::ValidationError(format!(
                    "Quantity for product {} must be at least 1",
                    line.product_id
                )));
            }
            Money::price(line.price.value()).map_err(|_| {
                SchedulerError::ValidationError(format!(
                    "Price for product {} must not be negative",
                    line.product_id
                ))
            })?;
        }
        let total_items = items
            .iter()
            .try_fold(0u32, |total, line| total.checked_add(line.quantity))
            .ok_or_else(|| {
                SchedulerError::ValidationError(format!(
                    "Cart holds more than {} items",
                    u32::MAX
                ))
            })?;
        Ok(Self { items, total_items })
    }

    pub fn items(&self) -> &[CartLine] {
        &self.items
    }

    pub fn total_items(&self) -> u32 {
        self.total_items
    }
}
