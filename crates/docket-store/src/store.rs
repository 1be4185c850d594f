//! Storage contracts for subscriptions and notifications.
//!
//! Every write to a [`MonitoredCase`] row is conditional on the row's
//! `version` (optimistic concurrency). A mismatch yields
//! [`StoreError::Conflict`] and leaves the row untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docket_core::{
    CaseSnapshot, MonitoredCase, MonitoredCaseId, Notification, NotificationId, UserId,
};

use crate::StoreError;

/// The refresh result to persist on one monitored case.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotUpdate {
    /// Version read before the registry call.
    pub expected_version: u64,
    pub last_snapshot: CaseSnapshot,
    pub last_checked_at: DateTime<Utc>,
}

/// Headline counts for the admin view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub active_monitored_cases: usize,
    pub total_notifications: usize,
    pub unread_notifications: usize,
}

#[async_trait]
pub trait MonitoringStore: Send + Sync {
    /// Subscribe `user_id` to a case. Fails with `AlreadyMonitored` while an
    /// active subscription for the same case number exists.
    async fn create(
        &self,
        user_id: &UserId,
        case_number: &str,
        institution: &str,
        alias: Option<String>,
    ) -> Result<MonitoredCase, StoreError>;

    /// Load a row regardless of status.
    async fn load(&self, id: MonitoredCaseId) -> Result<MonitoredCase, StoreError>;

    /// Active subscriptions of one user, newest first.
    async fn list_active_for_user(&self, user_id: &UserId)
    -> Result<Vec<MonitoredCase>, StoreError>;

    /// Every active subscription, for scheduled sweeps.
    async fn list_active(&self) -> Result<Vec<MonitoredCase>, StoreError>;

    /// Soft delete. Returns `false` if no active row with this id belongs to `user_id`.
    async fn deactivate(&self, id: MonitoredCaseId, user_id: &UserId) -> Result<bool, StoreError>;

    /// Store a new snapshot and check time.
    async fn save(&self, id: MonitoredCaseId, update: SnapshotUpdate) -> Result<(), StoreError>;

    /// Advance the check time only, leaving the snapshot as is.
    async fn mark_checked(
        &self,
        id: MonitoredCaseId,
        expected_version: u64,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<NotificationId, StoreError>;

    /// Newest first, at most `limit` rows.
    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError>;

    async fn unread_count(&self, user_id: &UserId) -> Result<usize, StoreError>;

    /// Returns `false` if the notification doesn't exist or isn't owned by `user_id`.
    async fn mark_read(&self, id: NotificationId, user_id: &UserId) -> Result<bool, StoreError>;

    /// Returns how many notifications flipped to read.
    async fn mark_all_read(&self, user_id: &UserId) -> Result<usize, StoreError>;
}

/// A backend holding both tables, able to write across them atomically.
#[async_trait]
pub trait CaseStore: MonitoringStore + NotificationStore {
    /// Apply `update` and insert `notification` as one unit. The version
    /// check runs first; on `Conflict` neither write happens.
    async fn commit_change(
        &self,
        id: MonitoredCaseId,
        update: SnapshotUpdate,
        notification: &Notification,
    ) -> Result<NotificationId, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}
