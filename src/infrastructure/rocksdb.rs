use crate::domain::ports::ScheduledOrderStore;
use crate::domain::scheduled_order::{ScheduledOrder, ScheduledOrderStatus};
use crate::error::{Result, SchedulerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family holding one JSON record per scheduled order, keyed by id.
pub const CF_SCHEDULED_ORDERS: &str = "scheduled_orders";

/// A persistent scheduled-order store backed by RocksDB.
///
/// Writes are serialized through `write_lock` so the version check in
/// `replace` and the put that follows cannot interleave with another writer
/// in this process.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

fn internal(message: String) -> SchedulerError {
    SchedulerError::InternalError(Box::new(std::io::Error::other(message)))
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_SCHEDULED_ORDERS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf])?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn read(&self, id: Uuid) -> Result<Option<ScheduledOrder>> {
        let cf = self
            .db
            .cf_handle(CF_SCHEDULED_ORDERS)
            .ok_or_else(|| internal("Scheduled orders column family not found".to_string()))?;

        match self.db.get_cf(&cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, order: &ScheduledOrder) -> Result<()> {
        let cf = self
            .db
            .cf_handle(CF_SCHEDULED_ORDERS)
            .ok_or_else(|| internal("Scheduled orders column family not found".to_string()))?;

        let value = serde_json::to_vec(order)?;
        self.db.put_cf(&cf, order.id.as_bytes(), value)?;
        Ok(())
    }

    fn scan<F>(&self, keep: F) -> Result<Vec<ScheduledOrder>>
    where
        F: Fn(&ScheduledOrder) -> bool,
    {
        let cf = self
            .db
            .cf_handle(CF_SCHEDULED_ORDERS)
            .ok_or_else(|| internal("Scheduled orders column family not found".to_string()))?;

        let mut orders = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_key, value) =
                item.map_err(|e| internal(format!("RocksDB iteration error: {}", e)))?;
            let order: ScheduledOrder = serde_json::from_slice(&value)?;
            if keep(&order) {
                orders.push(order);
            }
        }
        orders.sort_by(|a, b| {
            a.scheduled_time
                .cmp(&b.scheduled_time)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(orders)
    }
}

#[async_trait]
impl ScheduledOrderStore for RocksDBStore {
    async fn insert(&self, order: ScheduledOrder) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.read(order.id)?.is_some() {
            return Err(SchedulerError::ValidationError(format!(
                "Scheduled order {} already exists",
                order.id
            )));
        }
        self.write(&order)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScheduledOrder>> {
        self.read(id)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<ScheduledOrderStatus>,
    ) -> Result<Vec<ScheduledOrder>> {
        self.scan(|o| o.user_id == user_id && status.is_none_or(|s| o.status == s))
    }

    async fn find_due(&self, cutoff: DateTime<Utc>) -> Result<Vec<ScheduledOrder>> {
        self.scan(|o| o.status == ScheduledOrderStatus::Pending && o.scheduled_time <= cutoff)
    }

    async fn find_reminder_candidates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduledOrder>> {
        self.scan(|o| {
            o.status == ScheduledOrderStatus::Pending
                && !o.reminder_sent
                && o.scheduled_time >= from
                && o.scheduled_time <= to
        })
    }

    async fn find_stale_processing(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<ScheduledOrder>> {
        self.scan(|o| o.status == ScheduledOrderStatus::Processing && o.updated_at <= older_than)
    }

    async fn replace(
        &self,
        current: &ScheduledOrder,
        mut next: ScheduledOrder,
    ) -> Result<Option<ScheduledOrder>> {
        let _guard = self.write_lock.lock().await;
        match self.read(current.id)? {
            Some(stored) if stored.version == current.version => {
                next.version = current.version + 1;
                self.write(&next)?;
                Ok(Some(next))
            }
            Some(_) => Ok(None),
            None => Err(SchedulerError::NotFound(current.id)),
        }
    }
}
