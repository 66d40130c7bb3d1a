use crate::domain::scheduled_order::ScheduledOrderStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Scheduled order {0} not found")]
    NotFound(Uuid),
    #[error("Scheduled order {id} is {status}, expected {expected}")]
    StateConflict {
        id: Uuid,
        status: ScheduledOrderStatus,
        expected: ScheduledOrderStatus,
    },
    #[error("Scheduled order {0} was modified concurrently")]
    ConcurrentModification(Uuid),
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    StockConflict {
        product_id: String,
        requested: u64,
        available: u32,
    },
    #[error("Order number {0} already exists")]
    OrderNumberConflict(String),
    #[error("Order {order_number} was created but scheduled order {id} could not be marked completed: {reason}")]
    CompletionNotRecorded {
        id: Uuid,
        order_number: String,
        reason: String,
    },
    #[error("Execution of scheduled order {0} ended without recording an outcome")]
    ExecutionInterrupted(Uuid),
    #[error("Delivery address {0} no longer exists")]
    AddressUnavailable(String),
    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: std::time::Duration,
    },
    #[error("Collaborator error: {0}")]
    CollaboratorError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for SchedulerError {
    fn from(err: rocksdb::Error) -> Self {
        SchedulerError::InternalError(Box::new(err))
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::InternalError(Box::new(err))
    }
}

impl SchedulerError {
    /// Whether an execution attempt that hit this error may be retried on a later tick.
    ///
    /// Stock conflicts and vanished addresses describe the real world, not the
    /// infrastructure, so they end the scheduled order.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            SchedulerError::ValidationError(_)
                | SchedulerError::NotFound(_)
                | SchedulerError::StateConflict { .. }
                | SchedulerError::StockConflict { .. }
                | SchedulerError::AddressUnavailable(_)
                | SchedulerError::CompletionNotRecorded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SchedulerError::CollaboratorError("down".into()).is_transient());
        assert!(
            SchedulerError::Timeout {
                operation: "create order",
                limit: std::time::Duration::from_secs(30)
            }
            .is_transient()
        );
        assert!(SchedulerError::ConcurrentModification(Uuid::nil()).is_transient());
        assert!(
            !SchedulerError::StockConflict {
                product_id: "p1".into(),
                requested: 2,
                available: 1
            }
            .is_transient()
        );
        assert!(!SchedulerError::AddressUnavailable("a1".into()).is_transient());
    }

    #[test]
    fn test_timeout_message_keeps_sub_second_limits() {
        let err = SchedulerError::Timeout {
            operation: "order creation",
            limit: std::time::Duration::from_millis(50),
        };
        assert_eq!(err.to_string(), "order creation timed out after 50ms");
    }
}
