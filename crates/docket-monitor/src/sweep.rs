//! Scheduled refresh of every active subscription.

use std::pin::pin;

use docket_core::{MonitoredCase, MonitoredCaseId};
use docket_store::{CaseStore, MonitoringStore, StoreError};
use futures::{StreamExt, future, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RefreshError;
use crate::refresh::{RefreshOrchestrator, RefreshOutcome};

/// Tally of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Rows whose refresh reached an outcome, failures included.
    pub checked: usize,
    pub changed: usize,
    pub failed: usize,
    /// Rows still conflicting after the retry.
    pub conflicts: usize,
}

impl SweepReport {
    fn record(&mut self, id: MonitoredCaseId, result: Result<RefreshOutcome, RefreshError>) {
        match result {
            Ok(outcome) => {
                self.checked += 1;
                if outcome.changed {
                    self.changed += 1;
                }
            }
            Err(RefreshError::Cancelled) => {}
            // Unsubscribed while the sweep was running.
            Err(RefreshError::NotFound(_)) => debug!(case_id = %id, "skipped inactive case"),
            Err(e @ RefreshError::Conflict(_)) => {
                warn!(case_id = %id, error = %e, "sweep refresh conflicted twice");
                self.checked += 1;
                self.conflicts += 1;
            }
            Err(e) => {
                warn!(case_id = %id, error = %e, "sweep refresh failed");
                self.checked += 1;
                self.failed += 1;
            }
        }
    }
}

impl<S: CaseStore + ?Sized> RefreshOrchestrator<S> {
    /// Refresh all active rows, at most `max_concurrent_lookups` at a time.
    ///
    /// Per-case failures are logged and counted. Once `cancel` fires no new
    /// refresh starts and in-flight lookups are abandoned.
    pub async fn sweep(&self, cancel: &CancellationToken) -> Result<SweepReport, StoreError> {
        let cases = self.store().list_active().await?;
        let limit = self.config().max_concurrent_lookups.max(1);
        info!(cases = cases.len(), limit, "sweep started");

        let mut outcomes = pin!(
            stream::iter(cases)
                .take_while(|_| future::ready(!cancel.is_cancelled()))
                .map(|case| self.sweep_one(case, cancel))
                .buffer_unordered(limit)
        );

        let mut report = SweepReport::default();
        while let Some((id, result)) = outcomes.next().await {
            report.record(id, result);
        }

        info!(
            checked = report.checked,
            changed = report.changed,
            failed = report.failed,
            conflicts = report.conflicts,
            "sweep finished"
        );
        Ok(report)
    }

    async fn sweep_one(
        &self,
        case: MonitoredCase,
        cancel: &CancellationToken,
    ) -> (MonitoredCaseId, Result<RefreshOutcome, RefreshError>) {
        let id = case.id;
        let owner = case.user_id.clone();
        let result = match self.refresh_case(case, cancel).await {
            Err(RefreshError::Conflict(_)) => {
                debug!(case_id = %id, "conflict, retrying once");
                self.refresh_with_cancel(id, &owner, cancel).await
            }
            other => other,
        };
        (id, result)
    }
}
