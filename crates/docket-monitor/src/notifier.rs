//! Turns a detected change into a user-visible notification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use docket_core::{CaseSnapshot, Notification, NotificationId, NotificationKind, UserId};
use docket_store::{NotificationStore, StoreError};
use tracing::debug;

pub struct Notifier<S: ?Sized> {
    store: Arc<S>,
}

impl<S: NotificationStore + ?Sized> Notifier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Build the notification for `snapshot` without writing it.
    pub fn compose(
        &self,
        user_id: &UserId,
        case_number: &str,
        snapshot: &CaseSnapshot,
        now: DateTime<Utc>,
    ) -> Notification {
        Notification {
            id: NotificationId::new(),
            user_id: user_id.clone(),
            case_number: case_number.to_string(),
            message: message_for(case_number, snapshot),
            kind: NotificationKind::CaseUpdate,
            read: false,
            created_at: now,
        }
    }

    /// Insert exactly one notification. Callers decide when a change warrants it.
    pub async fn notify(
        &self,
        user_id: &UserId,
        case_number: &str,
        snapshot: &CaseSnapshot,
    ) -> Result<NotificationId, StoreError> {
        let notification = self.compose(user_id, case_number, snapshot, Utc::now());
        let id = self.store.insert(&notification).await?;
        debug!(notification_id = %id, user_id = %user_id, case_number, "notification stored");
        Ok(id)
    }
}

/// Message text. Depends only on the case number and snapshot contents.
pub fn message_for(case_number: &str, snapshot: &CaseSnapshot) -> String {
    let mut msg = format!(
        "Case {case_number} was updated: {}, {}",
        counted(snapshot.hearing_count(), "hearing"),
        counted(snapshot.appeal_count(), "appeal"),
    );
    if let Some(date) = snapshot.latest_hearing_date() {
        msg.push_str(&format!(", latest hearing {date}"));
    }
    msg.push('.');
    msg
}

fn counted(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else {
        format!("{n} {noun}s")
    }
}
