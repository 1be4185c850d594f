use docket_core::MonitoredCaseId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("monitored case not found: {0}")]
    NotFound(MonitoredCaseId),

    #[error("monitored case {0} was modified concurrently")]
    Conflict(MonitoredCaseId),

    #[error("case {case_number} is already monitored by this user")]
    AlreadyMonitored { case_number: String },

    #[error("snapshot encoding error: {0}")]
    Serde(#[from] serde_json::Error),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("{0}")]
    Other(String),
}
