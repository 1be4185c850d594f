//! In-memory store for tests, demos, and single-process deployments.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docket_core::{
    CaseStatus, MonitoredCase, MonitoredCaseId, Notification, NotificationId, UserId,
};
use tracing::debug;

use crate::store::{CaseStore, MonitoringStore, NotificationStore, SnapshotUpdate, StoreStats};
use crate::StoreError;

#[derive(Default)]
struct Tables {
    /// Insertion order.
    cases: Vec<MonitoredCase>,
    /// Insertion order.
    notifications: Vec<Notification>,
}

impl Tables {
    fn case_mut(&mut self, id: MonitoredCaseId) -> Result<&mut MonitoredCase, StoreError> {
        self.cases
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Version-checked mutable access to a case row.
    fn checked_case_mut(
        &mut self,
        id: MonitoredCaseId,
        expected_version: u64,
    ) -> Result<&mut MonitoredCase, StoreError> {
        let case = self.case_mut(id)?;
        if case.version != expected_version {
            return Err(StoreError::Conflict(id));
        }
        Ok(case)
    }
}

/// Both tables behind a single mutex, so cross-table writes are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }
}

fn apply_update(case: &mut MonitoredCase, update: SnapshotUpdate) {
    case.last_snapshot = Some(update.last_snapshot);
    case.last_checked_at = Some(update.last_checked_at);
    case.version += 1;
}

#[async_trait]
impl MonitoringStore for MemoryStore {
    async fn create(
        &self,
        user_id: &UserId,
        case_number: &str,
        institution: &str,
        alias: Option<String>,
    ) -> Result<MonitoredCase, StoreError> {
        let mut tables = self.tables()?;
        let duplicate = tables
            .cases
            .iter()
            .any(|c| c.is_active() && &c.user_id == user_id && c.case_number == case_number);
        if duplicate {
            return Err(StoreError::AlreadyMonitored {
                case_number: case_number.to_string(),
            });
        }

        let case = MonitoredCase::new(user_id.clone(), case_number, institution, alias, Utc::now());
        tables.cases.push(case.clone());
        debug!(case_id = %case.id, case_number, "monitored case created");
        Ok(case)
    }

    async fn load(&self, id: MonitoredCaseId) -> Result<MonitoredCase, StoreError> {
        let mut tables = self.tables()?;
        tables.case_mut(id).map(|c| c.clone())
    }

    async fn list_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<MonitoredCase>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .cases
            .iter()
            .rev()
            .filter(|c| c.is_active() && &c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_active(&self) -> Result<Vec<MonitoredCase>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.cases.iter().filter(|c| c.is_active()).cloned().collect())
    }

    async fn deactivate(&self, id: MonitoredCaseId, user_id: &UserId) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        let Some(case) = tables
            .cases
            .iter_mut()
            .find(|c| c.id == id && &c.user_id == user_id && c.is_active())
        else {
            return Ok(false);
        };
        case.status = CaseStatus::Inactive;
        case.version += 1;
        Ok(true)
    }

    async fn save(&self, id: MonitoredCaseId, update: SnapshotUpdate) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let case = tables.checked_case_mut(id, update.expected_version)?;
        apply_update(case, update);
        Ok(())
    }

    async fn mark_checked(
        &self,
        id: MonitoredCaseId,
        expected_version: u64,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let case = tables.checked_case_mut(id, expected_version)?;
        case.last_checked_at = Some(checked_at);
        case.version += 1;
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert(&self, notification: &Notification) -> Result<NotificationId, StoreError> {
        let mut tables = self.tables()?;
        tables.notifications.push(notification.clone());
        Ok(notification.id)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| &n.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn unread_count(&self, user_id: &UserId) -> Result<usize, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .notifications
            .iter()
            .filter(|n| &n.user_id == user_id && !n.read)
            .count())
    }

    async fn mark_read(&self, id: NotificationId, user_id: &UserId) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        match tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && &n.user_id == user_id)
        {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: &UserId) -> Result<usize, StoreError> {
        let mut tables = self.tables()?;
        let mut flipped = 0;
        for n in tables
            .notifications
            .iter_mut()
            .filter(|n| &n.user_id == user_id && !n.read)
        {
            n.read = true;
            flipped += 1;
        }
        Ok(flipped)
    }
}

#[async_trait]
impl CaseStore for MemoryStore {
    async fn commit_change(
        &self,
        id: MonitoredCaseId,
        update: SnapshotUpdate,
        notification: &Notification,
    ) -> Result<NotificationId, StoreError> {
        let mut tables = self.tables()?;
        let case = tables.checked_case_mut(id, update.expected_version)?;
        apply_update(case, update);
        tables.notifications.push(notification.clone());
        Ok(notification.id)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let tables = self.tables()?;
        Ok(StoreStats {
            active_monitored_cases: tables.cases.iter().filter(|c| c.is_active()).count(),
            total_notifications: tables.notifications.len(),
            unread_notifications: tables.notifications.iter().filter(|n| !n.read).count(),
        })
    }
}
