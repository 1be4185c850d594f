//! Registry backed by JSON files on disk.
//!
//! One file per case, named after the case number with every character
//! outside `[A-Za-z0-9-]` replaced by `_` (`1234/3/2023` → `1234_3_2023.json`).
//! A file holds whatever the portal would return: a case object, a list of
//! them, or `null`.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use docket_core::RawCaseRecord;
use tracing::debug;

use crate::client::{RegistryClient, RegistryError, records_from_body, select_match};

pub struct FixtureRegistry {
    dir: PathBuf,
}

impl FixtureRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the fixture file for `case_number`.
    pub fn path_for(&self, case_number: &str) -> PathBuf {
        let stem: String = case_number
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{stem}.json"))
    }
}

#[async_trait]
impl RegistryClient for FixtureRegistry {
    async fn lookup(
        &self,
        case_number: &str,
        institution: Option<&str>,
    ) -> Result<RawCaseRecord, RegistryError> {
        let path = self.path_for(case_number);
        debug!(path = %path.display(), "reading registry fixture");
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(RegistryError::NotFound),
            Err(e) => return Err(e.into()),
        };
        let body = serde_json::from_str(&text)
            .map_err(|e| RegistryError::Malformed(format!("{}: {e}", path.display())))?;
        select_match(records_from_body(body)?, institution)
    }
}
