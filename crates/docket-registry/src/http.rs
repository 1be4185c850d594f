//! HTTP client for the JSON bridge in front of the court portal's SOAP service.

use std::time::Duration;

use async_trait::async_trait;
use docket_core::RawCaseRecord;
use docket_core::config::DEFAULT_REGISTRY_TIMEOUT;
use serde_json::Value;
use tracing::info;

use crate::client::{RegistryClient, RegistryError, records_from_body, select_match};

/// Looks cases up through the portal bridge's `/dosare` endpoint.
pub struct HttpRegistryClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRegistryClient {
    /// Create a client for the given bridge base URL with the default 30 s timeout.
    ///
    /// `base_url` should be like `http://localhost:8080` (no trailing slash).
    pub fn new(base_url: String) -> Result<Self, RegistryError> {
        Self::with_timeout(base_url, DEFAULT_REGISTRY_TIMEOUT)
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: String, timeout: Duration) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> RegistryError {
        if e.is_timeout() {
            RegistryError::Timeout(self.timeout)
        } else {
            RegistryError::Http(e)
        }
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn lookup(
        &self,
        case_number: &str,
        institution: Option<&str>,
    ) -> Result<RawCaseRecord, RegistryError> {
        let url = format!("{}/dosare", self.base_url);
        let mut query = vec![("numarDosar", case_number)];
        if let Some(inst) = institution {
            query.push(("institutie", inst));
        }

        info!(url = %url, case_number, "querying registry");
        let resp = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RegistryError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| RegistryError::Malformed(e.to_string()))?;
        let records = records_from_body(body)?;
        info!(count = records.len(), "registry answered");
        select_match(records, institution)
    }
}
