//! Subscription and notification records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::case::CaseSnapshot;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

id_newtype!(MonitoredCaseId);
id_newtype!(NotificationId);

/// Owner reference. Issued by the (external) account system.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Subscription state. Removal is a transition to `Inactive`, never a delete.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Active,
    Inactive,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn from_active(active: bool) -> Self {
        if active { Self::Active } else { Self::Inactive }
    }
}

/// A user's subscription to one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredCase {
    pub id: MonitoredCaseId,
    pub user_id: UserId,
    pub case_number: String,
    pub institution: String,
    pub alias: Option<String>,
    /// `None` until the first successful refresh.
    pub last_snapshot: Option<CaseSnapshot>,
    /// `None` until the first refresh attempt.
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub status: CaseStatus,
    /// Optimistic concurrency token, bumped on every write.
    pub version: u64,
}

impl MonitoredCase {
    /// A fresh, active subscription with no snapshot yet.
    pub fn new(
        user_id: UserId,
        case_number: impl Into<String>,
        institution: impl Into<String>,
        alias: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MonitoredCaseId::new(),
            user_id,
            case_number: case_number.into(),
            institution: institution.into(),
            alias,
            last_snapshot: None,
            last_checked_at: None,
            created_at: now,
            status: CaseStatus::Active,
            version: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CaseStatus::Active
    }

    /// Alias when set, otherwise the case number.
    pub fn label(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.case_number)
    }

    /// Next `last_checked_at` value: `now`, but always strictly after the
    /// previous check.
    pub fn next_check_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_checked_at {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        }
    }
}

/// Notification kinds. Only case updates exist today.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CaseUpdate,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseUpdate => "case_update",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "case_update" => Some(Self::CaseUpdate),
            _ => None,
        }
    }
}

/// A durable, user-visible event. Only `read` is ever mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub case_number: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
