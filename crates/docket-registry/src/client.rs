//! The registry lookup contract shared by every client.

use std::time::Duration;

use async_trait::async_trait;
use docket_core::RawCaseRecord;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("case not found in registry")]
    NotFound,
    #[error("registry did not answer within {0:?}")]
    Timeout(Duration),
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("malformed registry response: {0}")]
    Malformed(String),
    #[error("fixture read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Source of raw case records, keyed by case number and optional court.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn lookup(
        &self,
        case_number: &str,
        institution: Option<&str>,
    ) -> Result<RawCaseRecord, RegistryError>;
}

/// Flatten a response body into candidate records.
///
/// The registry sends a list of cases, a bare case object when there is a
/// single match, or `null` for none. The list may also come wrapped in its
/// element key (`{"Dosar": [...]}`).
pub(crate) fn records_from_body(body: Value) -> Result<Vec<RawCaseRecord>, RegistryError> {
    let items = match body {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("Dosar") {
            Some(inner) => return records_from_body(inner),
            None => vec![Value::Object(map)],
        },
        other => {
            return Err(RegistryError::Malformed(format!(
                "expected case list, got {other}"
            )));
        }
    };
    Ok(items
        .into_iter()
        .filter_map(|item| RawCaseRecord::try_from(item).ok())
        .collect())
}

/// Pick the first record for `institution`, or the first record at all when
/// no court was requested. A requested court with no matching record is
/// `NotFound`: the same number at another court is a different proceeding.
pub(crate) fn select_match(
    records: Vec<RawCaseRecord>,
    institution: Option<&str>,
) -> Result<RawCaseRecord, RegistryError> {
    let mut records = records.into_iter();
    let found = match institution {
        Some(wanted) => records.find(|r| r.institution() == Some(wanted)),
        None => records.next(),
    };
    found.ok_or(RegistryError::NotFound)
}
