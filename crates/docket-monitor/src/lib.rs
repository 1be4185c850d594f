//! Refresh orchestration: registry lookup, change detection, notification.
//!
//! [`RefreshOrchestrator`] owns no state beyond its injected store, registry
//! client and [`MonitorConfig`](docket_core::MonitorConfig). Refreshes of
//! different rows are independent; refreshes of the same row are serialised
//! by the store's optimistic version check.

mod error;
mod notifier;
mod refresh;
mod sweep;

#[cfg(test)]
mod testing;

pub use error::RefreshError;
pub use notifier::{Notifier, message_for};
pub use refresh::{RefreshOrchestrator, RefreshOutcome};
pub use sweep::SweepReport;
