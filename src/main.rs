use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use scheduled_orders::application::Collaborators;
use scheduled_orders::config::EngineConfig;
use scheduled_orders::domain::bill::compute_bill;
use scheduled_orders::domain::catalog::ProductRecord;
use scheduled_orders::domain::order::DeliveryAddress;
use scheduled_orders::domain::ports::ScheduledOrderStoreRef;
use scheduled_orders::domain::scheduled_order::{
    NewScheduledOrder, PaymentType, ScheduledOrderStatus,
};
use scheduled_orders::engine::SchedulingEngine;
use scheduled_orders::infrastructure::clock::SystemClock;
use scheduled_orders::infrastructure::in_memory::{
    InMemoryAddressBook, InMemoryCarts, InMemoryCatalog, InMemoryNotifier, InMemoryOrderBook,
    InMemoryScheduledOrderStore,
};
use scheduled_orders::interfaces::csv::record_reader::RecordReader;
use scheduled_orders::logging::init_logger;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true, env = "SCHEDULED_ORDERS_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Catalog CSV (product_id, name, price, stock, is_available)
    #[arg(long, global = true, env = "SCHEDULED_ORDERS_CATALOG")]
    catalog: Option<PathBuf>,

    /// Address CSV (id, user_id, name, phone, address_line1, address_line2, city, state, pincode)
    #[arg(long, global = true, env = "SCHEDULED_ORDERS_ADDRESSES")]
    addresses: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, env = "SCHEDULED_ORDERS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(flatten)]
    tuning: Tuning,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Tuning {
    /// Seconds between scheduler ticks and reminder passes
    #[arg(long, global = true, env = "SCHEDULED_ORDERS_TICK_SECS", default_value_t = 60)]
    tick_secs: u64,

    /// Execution attempts before a scheduled order fails
    #[arg(long, global = true, env = "SCHEDULED_ORDERS_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Minutes ahead of schedule an order may be executed
    #[arg(long, global = true, env = "SCHEDULED_ORDERS_LOOKAHEAD_MINUTES", default_value_t = 5)]
    lookahead_minutes: i64,

    /// Deadline in seconds for each collaborator call during execution
    #[arg(long, global = true, env = "SCHEDULED_ORDERS_CALL_TIMEOUT_SECS", default_value_t = 30)]
    call_timeout_secs: u64,
}

impl Tuning {
    fn into_config(self) -> EngineConfig {
        let interval = std::time::Duration::from_secs(self.tick_secs.max(1));
        EngineConfig {
            tick_interval: interval,
            reminder_interval: interval,
            max_retries: self.max_retries.max(1),
            lookahead: Duration::minutes(self.lookahead_minutes.max(0)),
            call_timeout: std::time::Duration::from_secs(self.call_timeout_secs.max(1)),
            ..EngineConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the bill for a cart CSV (product_id, name, unit, price, quantity)
    Bill { cart: PathBuf },
    /// Schedule a cart CSV for later execution
    Schedule {
        #[arg(long)]
        user: String,
        #[arg(long)]
        address: String,
        /// COD or DIGITAL
        #[arg(long, default_value = "COD")]
        payment: PaymentType,
        /// RFC 3339 delivery instant
        #[arg(long, conflicts_with = "in_minutes", required_unless_present = "in_minutes")]
        at: Option<DateTime<Utc>>,
        /// Schedule relative to now instead of at a fixed instant
        #[arg(long)]
        in_minutes: Option<i64>,
        #[arg(long)]
        notes: Option<String>,
        cart: PathBuf,
    },
    /// List a user's scheduled orders
    List {
        #[arg(long)]
        user: String,
        #[arg(long)]
        status: Option<ScheduledOrderStatus>,
    },
    /// Cancel a pending scheduled order
    Cancel {
        #[arg(long)]
        user: String,
        id: Uuid,
    },
    /// Execute a pending scheduled order immediately
    Execute {
        #[arg(long)]
        user: String,
        id: Uuid,
    },
    /// Run one scheduler tick and one reminder pass
    Tick,
    /// Run the scheduler and reminder drivers until Ctrl-C
    Run,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<ScheduledOrderStoreRef> {
    use scheduled_orders::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(Arc::new(RocksDBStore::open(path).into_diagnostic()?)),
        None => Ok(Arc::new(InMemoryScheduledOrderStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<ScheduledOrderStoreRef> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryScheduledOrderStore::new()))
}

async fn load_catalog(path: Option<&Path>) -> Result<InMemoryCatalog> {
    let catalog = InMemoryCatalog::new();
    if let Some(path) = path {
        let reader = RecordReader::new(File::open(path).into_diagnostic()?);
        for row in reader.records::<ProductRecord>() {
            match row {
                Ok(product) => catalog.upsert(product).await,
                Err(e) => tracing::warn!("Skipping catalog row: {}", e),
            }
        }
    }
    Ok(catalog)
}

async fn load_addresses(path: Option<&Path>) -> Result<InMemoryAddressBook> {
    let book = InMemoryAddressBook::new();
    if let Some(path) = path {
        let reader = RecordReader::new(File::open(path).into_diagnostic()?);
        for row in reader.records::<DeliveryAddress>() {
            match row {
                Ok(address) => book.add(address).await,
                Err(e) => tracing::warn!("Skipping address row: {}", e),
            }
        }
    }
    Ok(book)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(&cli.log_level);
    let config = cli.tuning.into_config();

    if let Command::Bill { cart } = &cli.command {
        let snapshot = RecordReader::new(File::open(cart).into_diagnostic()?)
            .into_cart_snapshot()
            .into_diagnostic()?;
        return print_json(&compute_bill(snapshot.items(), &config.bill_policy));
    }

    let store = open_store(cli.db_path)?;
    let catalog = load_catalog(cli.catalog.as_deref()).await?;
    let addresses = load_addresses(cli.addresses.as_deref()).await?;
    let orders = InMemoryOrderBook::new();
    let notifier = InMemoryNotifier::new();

    let engine = SchedulingEngine::new(
        Collaborators {
            store,
            catalog: Arc::new(catalog),
            addresses: Arc::new(addresses),
            orders: Arc::new(orders.clone()),
            carts: Arc::new(InMemoryCarts::new()),
            notifier: Arc::new(notifier.clone()),
            clock: Arc::new(SystemClock),
        },
        config.clone(),
    );

    match cli.command {
        Command::Bill { .. } => Ok(()),
        Command::Schedule {
            user,
            address,
            payment,
            at,
            in_minutes,
            notes,
            cart,
        } => {
            let cart_snapshot = RecordReader::new(File::open(cart).into_diagnostic()?)
                .into_cart_snapshot()
                .into_diagnostic()?;
            let scheduled_time = match (at, in_minutes) {
                (Some(at), _) => at,
                (None, Some(minutes)) => Utc::now() + Duration::minutes(minutes),
                (None, None) => miette::bail!("either --at or --in-minutes is required"),
            };
            let bill_snapshot = compute_bill(cart_snapshot.items(), &config.bill_policy);
            let order = engine
                .service
                .create(NewScheduledOrder {
                    user_id: user,
                    scheduled_time,
                    cart_snapshot,
                    bill_snapshot,
                    address_id: address,
                    payment_type: payment,
                    notes,
                })
                .await
                .into_diagnostic()?;
            print_json(&order)
        }
        Command::List { user, status } => {
            let listed = engine.service.list(&user, status).await.into_diagnostic()?;
            print_json(&listed)
        }
        Command::Cancel { user, id } => {
            let order = engine.service.cancel(&user, id).await.into_diagnostic()?;
            print_json(&order)
        }
        Command::Execute { user, id } => {
            let order = engine.service.execute_now(&user, id).await.into_diagnostic()?;
            print_json(&order)
        }
        Command::Tick => {
            let scheduler = engine.scheduler.tick().await.into_diagnostic()?;
            let reminders = engine.reminders.remind().await.into_diagnostic()?;
            print_json(&serde_json::json!({
                "scheduler": scheduler,
                "reminders": reminders,
                "orders_placed": orders.orders().await,
                "notifications": notifier
                    .sent()
                    .await
                    .into_iter()
                    .map(|(user_id, notification)| serde_json::json!({
                        "user_id": user_id,
                        "notification": notification,
                    }))
                    .collect::<Vec<_>>(),
            }))
        }
        Command::Run => {
            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Ctrl-C received, shutting down");
                }
                signal.cancel();
            });
            engine.run(shutdown).await;
            Ok(())
        }
    }
}
