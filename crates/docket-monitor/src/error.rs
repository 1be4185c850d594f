use docket_core::MonitoredCaseId;
use docket_registry::RegistryError;
use docket_store::StoreError;
use thiserror::Error;

/// Why a refresh did not complete.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The row is missing, inactive, or owned by someone else.
    #[error("monitored case not found: {0}")]
    NotFound(MonitoredCaseId),

    #[error("case {case_number} no longer resolves in the registry")]
    CaseNotFound { case_number: String },

    #[error("registry unavailable: {0}")]
    RegistryUnavailable(#[source] RegistryError),

    /// Another writer touched the row between load and commit. Retry the whole refresh.
    #[error("monitored case {0} was modified concurrently")]
    Conflict(MonitoredCaseId),

    #[error("storage error: {0}")]
    Storage(#[source] StoreError),

    #[error("refresh cancelled")]
    Cancelled,
}

impl From<StoreError> for RefreshError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict(id) => Self::Conflict(id),
            other => Self::Storage(other),
        }
    }
}
