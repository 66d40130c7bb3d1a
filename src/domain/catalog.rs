use super::money::Money;
use serde::{Deserialize, Serialize};

/// Live catalog state for a product at the moment it is looked up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: String,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub is_available: bool,
}

/// A quantity of one product to take out of (or put back into) stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: String,
    pub quantity: u32,
}
