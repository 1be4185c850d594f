//! Refresh orchestration for a single monitored case.
//!
//! A refresh is linear: load and authorise the row, look the case up in the
//! registry under a bounded timeout, normalise, compare with the stored
//! snapshot, then commit. Every write is conditional on the row version read
//! at the start, so two refreshes of the same row cannot both land.

use std::sync::Arc;

use chrono::Utc;
use docket_core::{
    MonitorConfig, MonitoredCase, MonitoredCaseId, NotificationId, UserId, detect, normalize,
};
use docket_registry::{RegistryClient, RegistryError};
use docket_store::{CaseStore, MonitoringStore, SnapshotUpdate, StoreError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::RefreshError;
use crate::notifier::Notifier;

/// What a completed refresh did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Whether a notification was emitted.
    pub changed: bool,
    /// Human-readable delta, present only when `changed`.
    pub summary: Option<String>,
    pub notification: Option<NotificationId>,
}

pub struct RefreshOrchestrator<S: ?Sized = dyn CaseStore> {
    store: Arc<S>,
    registry: Arc<dyn RegistryClient>,
    notifier: Notifier<S>,
    config: MonitorConfig,
}

impl<S: CaseStore + ?Sized> RefreshOrchestrator<S> {
    pub fn new(store: Arc<S>, registry: Arc<dyn RegistryClient>, config: MonitorConfig) -> Self {
        let notifier = Notifier::new(Arc::clone(&store));
        Self {
            store,
            registry,
            notifier,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Refresh one case on behalf of `user_id`.
    pub async fn refresh(
        &self,
        id: MonitoredCaseId,
        user_id: &UserId,
    ) -> Result<RefreshOutcome, RefreshError> {
        self.refresh_with_cancel(id, user_id, &CancellationToken::new())
            .await
    }

    /// Like [`refresh`](Self::refresh), abandoning the registry lookup when
    /// `cancel` fires. A cancelled refresh leaves the row untouched.
    pub async fn refresh_with_cancel(
        &self,
        id: MonitoredCaseId,
        user_id: &UserId,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome, RefreshError> {
        let case = self.store.load(id).await?;
        if &case.user_id != user_id || !case.is_active() {
            return Err(RefreshError::NotFound(id));
        }
        self.refresh_case(case, cancel).await
    }

    /// Create a subscription and seed its first snapshot.
    ///
    /// The seeding refresh is silent. If it fails the subscription is kept
    /// and the next refresh retries.
    pub async fn subscribe(
        &self,
        user_id: &UserId,
        case_number: &str,
        institution: &str,
        alias: Option<String>,
    ) -> Result<MonitoredCase, StoreError> {
        let case = self
            .store
            .create(user_id, case_number, institution, alias)
            .await?;
        let id = case.id;
        info!(case_id = %id, user_id = %user_id, case_number, "subscribed");

        if let Err(e) = self.refresh_case(case, &CancellationToken::new()).await {
            warn!(case_id = %id, error = %e, "initial snapshot not fetched");
        }
        self.store.load(id).await
    }

    pub(crate) async fn refresh_case(
        &self,
        case: MonitoredCase,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome, RefreshError> {
        let timeout = self.config.registry_timeout;
        let institution = Some(case.institution.as_str()).filter(|i| !i.is_empty());
        let lookup = tokio::time::timeout(
            timeout,
            self.registry.lookup(&case.case_number, institution),
        );

        let looked_up = tokio::select! {
            _ = cancel.cancelled() => {
                info!(case_id = %case.id, "refresh cancelled");
                return Err(RefreshError::Cancelled);
            }
            res = lookup => res.unwrap_or(Err(RegistryError::Timeout(timeout))),
        };

        let raw = match looked_up {
            Ok(raw) => raw,
            Err(e) => return Err(self.record_failure(&case, e).await),
        };

        let snapshot = normalize(&raw);
        let report = detect(case.last_snapshot.as_ref(), &snapshot);
        let now = Utc::now();
        let update = SnapshotUpdate {
            expected_version: case.version,
            last_snapshot: snapshot,
            last_checked_at: case.next_check_time(now),
        };

        if report.changed {
            let notification = self.notifier.compose(
                &case.user_id,
                &case.case_number,
                &update.last_snapshot,
                now,
            );
            let notification_id = self
                .store
                .commit_change(case.id, update, &notification)
                .await
                .map_err(|e| storage_failure(&case, e))?;
            info!(
                case_id = %case.id,
                case_number = %case.case_number,
                changed = true,
                summary = report.summary.as_deref().unwrap_or_default(),
                "refreshed"
            );
            Ok(RefreshOutcome {
                changed: true,
                summary: report.summary,
                notification: Some(notification_id),
            })
        } else {
            self.store
                .save(case.id, update)
                .await
                .map_err(|e| storage_failure(&case, e))?;
            info!(case_id = %case.id, case_number = %case.case_number, changed = false, "refreshed");
            Ok(RefreshOutcome {
                changed: false,
                summary: None,
                notification: None,
            })
        }
    }

    /// Advance the check time after a failed lookup and classify the failure.
    async fn record_failure(&self, case: &MonitoredCase, err: RegistryError) -> RefreshError {
        let checked_at = case.next_check_time(Utc::now());
        if let Err(e) = self
            .store
            .mark_checked(case.id, case.version, checked_at)
            .await
        {
            return storage_failure(case, e);
        }

        if err.is_not_found() {
            warn!(case_id = %case.id, case_number = %case.case_number, "case not found in registry");
            RefreshError::CaseNotFound {
                case_number: case.case_number.clone(),
            }
        } else {
            warn!(case_id = %case.id, case_number = %case.case_number, error = %err, "registry unavailable");
            RefreshError::RegistryUnavailable(err)
        }
    }
}

fn storage_failure(case: &MonitoredCase, e: StoreError) -> RefreshError {
    let err = RefreshError::from(e);
    match &err {
        RefreshError::Conflict(_) | RefreshError::NotFound(_) => {
            warn!(case_id = %case.id, error = %err, "refresh lost a concurrent write")
        }
        _ => error!(case_id = %case.id, error = %err, "refresh could not be stored"),
    }
    err
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use docket_core::{CaseSnapshot, RawCaseRecord};
    use docket_store::{MemoryStore, MonitoringStore, NotificationStore};
    use serde_json::json;

    use super::*;
    use docket_registry::FixtureRegistry;

    use crate::testing::{
        FailingStore, HangingRegistry, InterferingRegistry, StaticRegistry, UnavailableRegistry,
        UnsubscribingRegistry,
    };

    const CASE: &str = "1234/3/2023";

    fn record(hearing_dates: &[&str]) -> serde_json::Value {
        let hearings: Vec<_> = hearing_dates
            .iter()
            .map(|d| json!({"data": format!("{d}T00:00:00"), "complet": "C1"}))
            .collect();
        json!({
            "numar": CASE,
            "institutie": "TribunalulCLUJ",
            "obiect": "pretentii",
            "sedinte": {"DosarSedinta": hearings},
        })
    }

    fn orchestrator<S: CaseStore + ?Sized>(
        store: Arc<S>,
        registry: Arc<dyn RegistryClient>,
    ) -> RefreshOrchestrator<S> {
        RefreshOrchestrator::new(store, registry, MonitorConfig::default())
    }

    /// A monitored case whose stored snapshot already holds `hearing_dates`.
    async fn seeded(store: &MemoryStore, user: &UserId, hearing_dates: &[&str]) -> MonitoredCase {
        let case = store
            .create(user, CASE, "TribunalulCLUJ", None)
            .await
            .unwrap();
        let raw = RawCaseRecord::try_from(record(hearing_dates)).unwrap();
        store
            .save(
                case.id,
                SnapshotUpdate {
                    expected_version: case.version,
                    last_snapshot: normalize(&raw),
                    last_checked_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        store.load(case.id).await.unwrap()
    }

    #[tokio::test]
    async fn new_hearing_notifies_once_and_stores_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let before = seeded(&store, &user, &["2024-01-10"]).await;
        let registry = Arc::new(StaticRegistry::new(record(&["2024-01-10", "2024-02-20"])));
        let orch = orchestrator(store.clone(), registry);

        let outcome = orch.refresh(before.id, &user).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.summary.as_deref(), Some("1 new hearing"));

        let notes = store.list_for_user(&user, 50).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].case_number, CASE);
        assert_eq!(Some(notes[0].id), outcome.notification);

        let after = store.load(before.id).await.unwrap();
        let snap = after.last_snapshot.unwrap();
        assert_eq!(snap.hearing_count(), 2);
        assert_eq!(snap.hearings[0].date, "2024-02-20");
        assert!(after.last_checked_at > before.last_checked_at);
    }

    #[tokio::test]
    async fn first_check_is_silent_and_seeds_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let case = store.create(&user, CASE, "", None).await.unwrap();
        let registry = Arc::new(StaticRegistry::new(record(&["2024-01-10"])));
        let orch = orchestrator(store.clone(), registry);

        let outcome = orch.refresh(case.id, &user).await.unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.summary, None);
        assert!(store.list_for_user(&user, 50).await.unwrap().is_empty());

        let after = store.load(case.id).await.unwrap();
        assert_eq!(after.last_snapshot.unwrap().hearing_count(), 1);
        assert!(after.last_checked_at.is_some());
    }

    #[tokio::test]
    async fn unchanged_counts_still_store_latest_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let before = seeded(&store, &user, &["2024-01-10"]).await;
        let mut edited = record(&["2024-01-10"]);
        edited["obiect"] = json!("revendicare");
        let orch = orchestrator(store.clone(), Arc::new(StaticRegistry::new(edited)));

        let outcome = orch.refresh(before.id, &user).await.unwrap();
        assert!(!outcome.changed);
        assert!(store.list_for_user(&user, 50).await.unwrap().is_empty());
        let after = store.load(before.id).await.unwrap();
        assert_eq!(after.last_snapshot.unwrap().subject_matter, "revendicare");
    }

    #[tokio::test]
    async fn timeout_is_registry_unavailable_and_advances_check_time() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let before = seeded(&store, &user, &["2024-01-10"]).await;
        let config = MonitorConfig {
            registry_timeout: Duration::from_millis(50),
            ..MonitorConfig::default()
        };
        let orch = RefreshOrchestrator::new(store.clone(), Arc::new(HangingRegistry), config);

        let err = orch.refresh(before.id, &user).await.unwrap_err();
        assert!(matches!(
            err,
            RefreshError::RegistryUnavailable(RegistryError::Timeout(_))
        ));

        let after = store.load(before.id).await.unwrap();
        assert!(after.last_checked_at > before.last_checked_at);
        assert_eq!(after.last_snapshot, before.last_snapshot);
    }

    #[tokio::test]
    async fn missing_case_is_case_not_found_and_stays_active() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let before = seeded(&store, &user, &["2024-01-10"]).await;
        let orch = orchestrator(store.clone(), Arc::new(StaticRegistry::empty()));

        let err = orch.refresh(before.id, &user).await.unwrap_err();
        assert!(matches!(err, RefreshError::CaseNotFound { ref case_number } if case_number == CASE));

        let after = store.load(before.id).await.unwrap();
        assert!(after.is_active());
        assert!(after.last_checked_at > before.last_checked_at);
        assert_eq!(after.last_snapshot, before.last_snapshot);
    }

    #[tokio::test]
    async fn wrong_owner_or_inactive_row_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let case = seeded(&store, &user, &[]).await;
        let orch = orchestrator(store.clone(), Arc::new(StaticRegistry::new(record(&[]))));

        let err = orch.refresh(case.id, &UserId::from("bob")).await.unwrap_err();
        assert!(matches!(err, RefreshError::NotFound(_)));

        assert!(store.deactivate(case.id, &user).await.unwrap());
        let err = orch.refresh(case.id, &user).await.unwrap_err();
        assert!(matches!(err, RefreshError::NotFound(_)));

        let err = orch
            .refresh(MonitoredCaseId::new(), &user)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_write_is_conflict_without_notification() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let before = seeded(&store, &user, &["2024-01-10"]).await;
        let registry = Arc::new(InterferingRegistry::new(
            store.clone(),
            before.id,
            record(&["2024-01-10", "2024-02-20"]),
        ));
        let orch = orchestrator(store.clone(), registry);

        let err = orch.refresh(before.id, &user).await.unwrap_err();
        assert!(matches!(err, RefreshError::Conflict(id) if id == before.id));
        assert!(store.list_for_user(&user, 50).await.unwrap().is_empty());
        let after = store.load(before.id).await.unwrap();
        assert_eq!(after.last_snapshot.unwrap().hearing_count(), 1);

        // A retry reads the new version and goes through.
        let outcome = orch.refresh(before.id, &user).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(store.list_for_user(&user, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_propagates_without_partial_state() {
        let inner = MemoryStore::new();
        let user = UserId::from("ana");
        let before = seeded(&inner, &user, &["2024-01-10"]).await;
        let store = Arc::new(FailingStore::new(inner));
        let registry = Arc::new(StaticRegistry::new(record(&["2024-01-10", "2024-02-20"])));
        let orch = orchestrator(store.clone(), registry);

        let err = orch.refresh(before.id, &user).await.unwrap_err();
        assert!(matches!(err, RefreshError::Storage(_)));
        assert!(store.list_for_user(&user, 50).await.unwrap().is_empty());
        assert_eq!(store.load(before.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn cancelled_refresh_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let before = seeded(&store, &user, &["2024-01-10"]).await;
        let orch = orchestrator(store.clone(), Arc::new(HangingRegistry));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = orch
            .refresh_with_cancel(before.id, &user, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::Cancelled));
        assert_eq!(store.load(before.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn subscribe_seeds_snapshot_silently() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let orch = orchestrator(
            store.clone(),
            Arc::new(StaticRegistry::new(record(&["2024-01-10"]))),
        );

        let case = orch
            .subscribe(&user, CASE, "TribunalulCLUJ", Some("rent dispute".into()))
            .await
            .unwrap();
        assert_eq!(case.label(), "rent dispute");
        assert_eq!(
            case.last_snapshot.as_ref().map(CaseSnapshot::hearing_count),
            Some(1)
        );
        assert!(store.list_for_user(&user, 50).await.unwrap().is_empty());

        let dup = orch.subscribe(&user, CASE, "TribunalulCLUJ", None).await;
        assert!(matches!(dup, Err(StoreError::AlreadyMonitored { .. })));
    }

    #[tokio::test]
    async fn subscribe_keeps_row_when_lookup_fails() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let orch = orchestrator(store.clone(), Arc::new(StaticRegistry::empty()));

        let case = orch.subscribe(&user, CASE, "", None).await.unwrap();
        assert!(case.is_active());
        assert!(case.last_snapshot.is_none());
        assert!(case.last_checked_at.is_some());
    }

    #[tokio::test]
    async fn server_error_is_registry_unavailable_and_advances_check_time() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let before = seeded(&store, &user, &["2024-01-10"]).await;
        let orch = orchestrator(store.clone(), Arc::new(UnavailableRegistry));

        let err = orch.refresh(before.id, &user).await.unwrap_err();
        assert!(matches!(
            err,
            RefreshError::RegistryUnavailable(RegistryError::Server { status: 503, .. })
        ));

        let after = store.load(before.id).await.unwrap();
        assert!(after.last_checked_at > before.last_checked_at);
        assert_eq!(after.last_snapshot, before.last_snapshot);
        assert!(store.list_for_user(&user, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_number_at_another_court_is_case_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let registry = Arc::new(FixtureRegistry::new(tmp.path()));
        let fixture = registry.path_for(CASE);
        std::fs::write(&fixture, record(&["2024-01-10"]).to_string()).unwrap();

        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let orch = orchestrator(store.clone(), registry);
        let case = orch
            .subscribe(&user, CASE, "TribunalulCLUJ", None)
            .await
            .unwrap();
        assert!(case.last_snapshot.is_some());

        let mut elsewhere = record(&["2024-01-10", "2024-02-20", "2024-03-05"]);
        elsewhere["institutie"] = json!("JudecatoriaARAD");
        std::fs::write(&fixture, elsewhere.to_string()).unwrap();

        let err = orch.refresh(case.id, &user).await.unwrap_err();
        assert!(matches!(err, RefreshError::CaseNotFound { .. }));
        assert!(store.list_for_user(&user, 50).await.unwrap().is_empty());

        let after = store.load(case.id).await.unwrap();
        let snap = after.last_snapshot.unwrap();
        assert_eq!(snap.institution, "TribunalulCLUJ");
        assert_eq!(snap.hearing_count(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_during_lookup_is_conflict_without_notification() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::from("ana");
        let before = seeded(&store, &user, &["2024-01-10"]).await;
        let registry = Arc::new(UnsubscribingRegistry::new(
            store.clone(),
            before.id,
            user.clone(),
            record(&["2024-01-10", "2024-02-20"]),
        ));
        let orch = orchestrator(store.clone(), registry);

        let err = orch.refresh(before.id, &user).await.unwrap_err();
        assert!(matches!(err, RefreshError::Conflict(id) if id == before.id));
        assert!(store.list_for_user(&user, 50).await.unwrap().is_empty());

        let after = store.load(before.id).await.unwrap();
        assert!(!after.is_active());
        assert_eq!(after.last_snapshot, before.last_snapshot);

        let report = orch.sweep(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.checked, 0);
        assert!(store.list_for_user(&user, 50).await.unwrap().is_empty());
    }
}
