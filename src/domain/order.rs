use super::bill::Bill;
use super::cart::CartLine;
use super::scheduled_order::PaymentType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

impl From<PaymentType> for PaymentStatus {
    /// Digital payments are authorized when the order is scheduled; cash is
    /// collected on delivery.
    fn from(payment_type: PaymentType) -> Self {
        match payment_type {
            PaymentType::Cod => PaymentStatus::Pending,
            PaymentType::Digital => PaymentStatus::Completed,
        }
    }
}

/// The real order handed to the order service, built from the frozen snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: Uuid,
    pub order_number: String,
    pub user_id: String,
    pub items: Vec<CartLine>,
    pub address: DeliveryAddress,
    pub bill: Bill,
    pub payment_type: PaymentType,
    pub payment_status: PaymentStatus,
    pub source_scheduled_order_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: Uuid,
    pub order_number: String,
}
