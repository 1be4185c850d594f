//! Fakes shared by the orchestrator tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docket_core::{
    MonitoredCase, MonitoredCaseId, Notification, NotificationId, RawCaseRecord, UserId,
};
use docket_registry::{RegistryClient, RegistryError};
use docket_store::{
    CaseStore, MemoryStore, MonitoringStore, NotificationStore, SnapshotUpdate, StoreError,
    StoreStats,
};
use serde_json::Value;

/// Answers every lookup with the same body, or `NotFound` when empty.
pub(crate) struct StaticRegistry {
    body: Option<Value>,
}

impl StaticRegistry {
    pub(crate) fn new(body: Value) -> Self {
        Self { body: Some(body) }
    }

    pub(crate) fn empty() -> Self {
        Self { body: None }
    }
}

#[async_trait]
impl RegistryClient for StaticRegistry {
    async fn lookup(
        &self,
        _case_number: &str,
        _institution: Option<&str>,
    ) -> Result<RawCaseRecord, RegistryError> {
        match &self.body {
            Some(body) => RawCaseRecord::try_from(body.clone()).map_err(RegistryError::Malformed),
            None => Err(RegistryError::NotFound),
        }
    }
}

/// Never answers.
pub(crate) struct HangingRegistry;

#[async_trait]
impl RegistryClient for HangingRegistry {
    async fn lookup(
        &self,
        _case_number: &str,
        _institution: Option<&str>,
    ) -> Result<RawCaseRecord, RegistryError> {
        std::future::pending().await
    }
}

/// On its first lookup, writes to `target` behind the caller's back, as a
/// concurrent refresh would.
pub(crate) struct InterferingRegistry {
    store: Arc<MemoryStore>,
    target: MonitoredCaseId,
    body: Value,
    fired: AtomicBool,
}

impl InterferingRegistry {
    pub(crate) fn new(store: Arc<MemoryStore>, target: MonitoredCaseId, body: Value) -> Self {
        Self {
            store,
            target,
            body,
            fired: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl RegistryClient for InterferingRegistry {
    async fn lookup(
        &self,
        _case_number: &str,
        _institution: Option<&str>,
    ) -> Result<RawCaseRecord, RegistryError> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            let case = self.store.load(self.target).await.unwrap();
            self.store
                .mark_checked(case.id, case.version, case.next_check_time(Utc::now()))
                .await
                .unwrap();
        }
        RawCaseRecord::try_from(self.body.clone()).map_err(RegistryError::Malformed)
    }
}

/// Always fails with an upstream server error.
pub(crate) struct UnavailableRegistry;

#[async_trait]
impl RegistryClient for UnavailableRegistry {
    async fn lookup(
        &self,
        _case_number: &str,
        _institution: Option<&str>,
    ) -> Result<RawCaseRecord, RegistryError> {
        Err(RegistryError::Server {
            status: 503,
            body: "service unavailable".into(),
        })
    }
}

/// Unsubscribes `target` while the lookup is in flight, then answers with `body`.
pub(crate) struct UnsubscribingRegistry {
    store: Arc<MemoryStore>,
    target: MonitoredCaseId,
    owner: UserId,
    body: Value,
}

impl UnsubscribingRegistry {
    pub(crate) fn new(
        store: Arc<MemoryStore>,
        target: MonitoredCaseId,
        owner: UserId,
        body: Value,
    ) -> Self {
        Self {
            store,
            target,
            owner,
            body,
        }
    }
}

#[async_trait]
impl RegistryClient for UnsubscribingRegistry {
    async fn lookup(
        &self,
        _case_number: &str,
        _institution: Option<&str>,
    ) -> Result<RawCaseRecord, RegistryError> {
        self.store.deactivate(self.target, &self.owner).await.unwrap();
        RawCaseRecord::try_from(self.body.clone()).map_err(RegistryError::Malformed)
    }
}

/// Reads pass through; every write fails.
pub(crate) struct FailingStore {
    inner: MemoryStore,
}

impl FailingStore {
    pub(crate) fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

fn offline() -> StoreError {
    StoreError::Other("storage offline".into())
}

#[async_trait]
impl MonitoringStore for FailingStore {
    async fn create(
        &self,
        _user_id: &UserId,
        _case_number: &str,
        _institution: &str,
        _alias: Option<String>,
    ) -> Result<MonitoredCase, StoreError> {
        Err(offline())
    }

    async fn load(&self, id: MonitoredCaseId) -> Result<MonitoredCase, StoreError> {
        self.inner.load(id).await
    }

    async fn list_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<MonitoredCase>, StoreError> {
        self.inner.list_active_for_user(user_id).await
    }

    async fn list_active(&self) -> Result<Vec<MonitoredCase>, StoreError> {
        self.inner.list_active().await
    }

    async fn deactivate(&self, _id: MonitoredCaseId, _user_id: &UserId) -> Result<bool, StoreError> {
        Err(offline())
    }

    async fn save(&self, _id: MonitoredCaseId, _update: SnapshotUpdate) -> Result<(), StoreError> {
        Err(offline())
    }

    async fn mark_checked(
        &self,
        _id: MonitoredCaseId,
        _expected_version: u64,
        _checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Err(offline())
    }
}

#[async_trait]
impl NotificationStore for FailingStore {
    async fn insert(&self, _notification: &Notification) -> Result<NotificationId, StoreError> {
        Err(offline())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        self.inner.list_for_user(user_id, limit).await
    }

    async fn unread_count(&self, user_id: &UserId) -> Result<usize, StoreError> {
        self.inner.unread_count(user_id).await
    }

    async fn mark_read(&self, _id: NotificationId, _user_id: &UserId) -> Result<bool, StoreError> {
        Err(offline())
    }

    async fn mark_all_read(&self, _user_id: &UserId) -> Result<usize, StoreError> {
        Err(offline())
    }
}

#[async_trait]
impl CaseStore for FailingStore {
    async fn commit_change(
        &self,
        _id: MonitoredCaseId,
        _update: SnapshotUpdate,
        _notification: &Notification,
    ) -> Result<NotificationId, StoreError> {
        Err(offline())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.inner.stats().await
    }
}

