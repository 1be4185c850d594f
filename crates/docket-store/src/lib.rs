//! Storage layer: subscriptions, snapshots, and notifications.
//!
//! The in-memory backend is always available; DuckDB sits behind the `duckdb` feature.

mod error;
mod memory;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{CaseStore, MonitoringStore, NotificationStore, SnapshotUpdate, StoreStats};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;
