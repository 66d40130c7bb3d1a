use super::bill::Bill;
use super::cart::CartSnapshot;
use super::money::Money;
use crate::error::SchedulerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const MAX_NOTES_LEN: usize = 500;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScheduledOrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Failed,
}

impl ScheduledOrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScheduledOrderStatus::Completed
                | ScheduledOrderStatus::Cancelled
                | ScheduledOrderStatus::Failed
        )
    }

    /// The legal edges of the lifecycle. Everything else is rejected.
    pub fn can_transition_to(self, next: ScheduledOrderStatus) -> bool {
        use ScheduledOrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Pending)
        )
    }
}

impl fmt::Display for ScheduledOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScheduledOrderStatus::Pending => "pending",
            ScheduledOrderStatus::Processing => "processing",
            ScheduledOrderStatus::Completed => "completed",
            ScheduledOrderStatus::Cancelled => "cancelled",
            ScheduledOrderStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for ScheduledOrderStatus {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            other => Err(SchedulerError::ValidationError(format!(
                "Unknown status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentType {
    Cod,
    Digital,
}

impl FromStr for PaymentType {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COD" => Ok(Self::Cod),
            "DIGITAL" => Ok(Self::Digital),
            other => Err(SchedulerError::ValidationError(format!(
                "Unknown payment type '{}'",
                other
            ))),
        }
    }
}

/// A live price that drifted more than the tolerated ratio from the snapshot.
///
/// Kept for the user's information; the frozen bill is still what gets charged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeNote {
    pub product_id: String,
    pub name: String,
    pub snapshot_price: Money,
    pub current_price: Money,
}

/// A cart and delivery choice committed now for execution at `scheduled_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledOrder {
    pub id: Uuid,
    pub user_id: String,
    pub scheduled_time: DateTime<Utc>,
    pub status: ScheduledOrderStatus,
    pub cart_snapshot: CartSnapshot,
    pub bill_snapshot: Bill,
    pub address_id: String,
    pub payment_type: PaymentType,
    pub notes: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    pub result_order_id: Option<Uuid>,
    pub result_order_number: Option<String>,
    pub failure_reason: Option<String>,
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub reminder_sent: bool,
    #[serde(default)]
    pub price_change_notes: Vec<PriceChangeNote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Bumped by every store write; the store only accepts a write whose
    /// base version matches what it holds.
    pub version: u64,
}

/// Everything a caller supplies to schedule an order.
#[derive(Debug, Clone)]
pub struct NewScheduledOrder {
    pub user_id: String,
    pub scheduled_time: DateTime<Utc>,
    pub cart_snapshot: CartSnapshot,
    pub bill_snapshot: Bill,
    pub address_id: String,
    pub payment_type: PaymentType,
    pub notes: Option<String>,
}

impl ScheduledOrder {
    pub fn new(request: NewScheduledOrder, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            scheduled_time: request.scheduled_time,
            status: ScheduledOrderStatus::Pending,
            cart_snapshot: request.cart_snapshot,
            bill_snapshot: request.bill_snapshot,
            address_id: request.address_id,
            payment_type: request.payment_type,
            notes: request.notes,
            executed_at: None,
            result_order_id: None,
            result_order_number: None,
            failure_reason: None,
            retry_count: 0,
            last_retry_at: None,
            reminder_sent: false,
            price_change_notes: Vec::new(),
            created_at: now,
            updated_at: now,
            cancelled_at: None,
            version: 0,
        }
    }

    fn transition(
        &mut self,
        next: ScheduledOrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        if !self.status.can_transition_to(next) {
            let expected = match next {
                ScheduledOrderStatus::Processing | ScheduledOrderStatus::Cancelled => {
                    ScheduledOrderStatus::Pending
                }
                _ => ScheduledOrderStatus::Processing,
            };
            return Err(SchedulerError::StateConflict {
                id: self.id,
                status: self.status,
                expected,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Picks the order up for execution (`pending -> processing`).
    pub fn claim(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.transition(ScheduledOrderStatus::Processing, now)
    }

    /// Records a successful materialization (`processing -> completed`).
    pub fn complete(
        &mut self,
        now: DateTime<Utc>,
        order_id: Uuid,
        order_number: String,
        price_change_notes: Vec<PriceChangeNote>,
    ) -> Result<(), SchedulerError> {
        self.transition(ScheduledOrderStatus::Completed, now)?;
        self.executed_at = Some(now);
        self.result_order_id = Some(order_id);
        self.result_order_number = Some(order_number);
        self.price_change_notes = price_change_notes;
        Ok(())
    }

    /// Ends the order without producing a real order (`processing -> failed`).
    pub fn fail(&mut self, now: DateTime<Utc>, reason: String) -> Result<(), SchedulerError> {
        self.transition(ScheduledOrderStatus::Failed, now)?;
        self.executed_at = Some(now);
        self.failure_reason = Some(reason);
        Ok(())
    }

    /// Books a transient failure. Returns the order to `pending` while retries
    /// remain, otherwise fails it with `reason`.
    pub fn record_transient_failure(
        &mut self,
        now: DateTime<Utc>,
        reason: String,
        max_retries: u32,
    ) -> Result<(), SchedulerError> {
        if self.status != ScheduledOrderStatus::Processing {
            return Err(SchedulerError::StateConflict {
                id: self.id,
                status: self.status,
                expected: ScheduledOrderStatus::Processing,
            });
        }
        self.retry_count += 1;
        self.last_retry_at = Some(now);
        if self.retry_count < max_retries {
            self.transition(ScheduledOrderStatus::Pending, now)
        } else {
            self.fail(
                now,
                format!("Gave up after {} attempts: {}", self.retry_count, reason),
            )
        }
    }

    /// User cancellation, legal only while `pending`.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.transition(ScheduledOrderStatus::Cancelled, now)?;
        self.cancelled_at = Some(now);
        Ok(())
    }

    /// Flags the pre-delivery reminder. Returns `false` if it was already sent.
    pub fn mark_reminded(&mut self, now: DateTime<Utc>) -> bool {
        if self.reminder_sent {
            return false;
        }
        self.reminder_sent = true;
        self.updated_at = now;
        true
    }
}
