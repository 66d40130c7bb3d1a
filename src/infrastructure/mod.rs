//! Adapters behind the domain ports: in-memory implementations of every
//! collaborator, clocks, and the optional RocksDB scheduled-order store.

pub mod clock;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
