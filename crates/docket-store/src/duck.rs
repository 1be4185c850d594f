//! DuckDB storage for monitored cases and notifications.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docket_core::{
    CaseSnapshot, CaseStatus, MonitoredCase, MonitoredCaseId, Notification, NotificationId,
    NotificationKind, UserId,
};
use duckdb::{Connection, Row, params};
use tracing::info;

use crate::store::{CaseStore, MonitoringStore, NotificationStore, SnapshotUpdate, StoreStats};
use crate::StoreError;

const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS notification_seq;

CREATE TABLE IF NOT EXISTS monitored_cases (
    id VARCHAR NOT NULL,
    user_id VARCHAR NOT NULL,
    case_number VARCHAR NOT NULL,
    institution VARCHAR NOT NULL,
    alias VARCHAR,
    last_snapshot VARCHAR,
    last_checked_at BIGINT,
    created_at BIGINT NOT NULL,
    is_active BOOLEAN NOT NULL,
    version BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    seq BIGINT NOT NULL DEFAULT nextval('notification_seq'),
    id VARCHAR NOT NULL,
    user_id VARCHAR NOT NULL,
    case_number VARCHAR NOT NULL,
    message VARCHAR NOT NULL,
    type VARCHAR NOT NULL,
    is_read BOOLEAN NOT NULL,
    created_at BIGINT NOT NULL
);
";

const CASE_COLUMNS: &str = "id, user_id, case_number, institution, alias, last_snapshot, \
                            last_checked_at, created_at, is_active, version";

const NOTIFICATION_COLUMNS: &str = "id, user_id, case_number, message, type, is_read, created_at";

/// DuckDB-backed [`CaseStore`].
///
/// Timestamps are stored as microseconds since the epoch and snapshots as
/// JSON text. Cross-table writes run inside a DuckDB transaction.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

/// Raw column values of a `monitored_cases` row.
struct CaseRow {
    id: String,
    user_id: String,
    case_number: String,
    institution: String,
    alias: Option<String>,
    last_snapshot: Option<String>,
    last_checked_at: Option<i64>,
    created_at: i64,
    is_active: bool,
    version: i64,
}

impl CaseRow {
    fn read(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            case_number: row.get(2)?,
            institution: row.get(3)?,
            alias: row.get(4)?,
            last_snapshot: row.get(5)?,
            last_checked_at: row.get(6)?,
            created_at: row.get(7)?,
            is_active: row.get(8)?,
            version: row.get(9)?,
        })
    }

    fn into_case(self) -> Result<MonitoredCase, StoreError> {
        let last_snapshot: Option<CaseSnapshot> = self
            .last_snapshot
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(MonitoredCase {
            id: self
                .id
                .parse()
                .map_err(|e| StoreError::Other(format!("bad case id {}: {e}", self.id)))?,
            user_id: UserId(self.user_id),
            case_number: self.case_number,
            institution: self.institution,
            alias: self.alias,
            last_snapshot,
            last_checked_at: self.last_checked_at.map(from_micros).transpose()?,
            created_at: from_micros(self.created_at)?,
            status: CaseStatus::from_active(self.is_active),
            version: self.version as u64,
        })
    }
}

/// Raw column values of a `notifications` row.
struct NotificationRow {
    id: String,
    user_id: String,
    case_number: String,
    message: String,
    kind: String,
    read: bool,
    created_at: i64,
}

impl NotificationRow {
    fn read(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            case_number: row.get(2)?,
            message: row.get(3)?,
            kind: row.get(4)?,
            read: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_notification(self) -> Result<Notification, StoreError> {
        Ok(Notification {
            id: self
                .id
                .parse()
                .map_err(|e| StoreError::Other(format!("bad notification id {}: {e}", self.id)))?,
            user_id: UserId(self.user_id),
            case_number: self.case_number,
            message: self.message,
            kind: NotificationKind::parse(&self.kind)
                .ok_or_else(|| StoreError::Other(format!("unknown notification type {}", self.kind)))?,
            read: self.read,
            created_at: from_micros(self.created_at)?,
        })
    }
}

fn from_micros(us: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(us)
        .ok_or_else(|| StoreError::Other(format!("timestamp out of range: {us}")))
}

fn version_param(version: u64) -> i64 {
    version as i64
}

/// Version-checked snapshot write. Returns `Conflict` or `NotFound` when no row matched.
fn write_update(
    conn: &Connection,
    id: MonitoredCaseId,
    update: &SnapshotUpdate,
) -> Result<(), StoreError> {
    let snapshot = serde_json::to_string(&update.last_snapshot)?;
    let changed = conn.execute(
        "UPDATE monitored_cases
         SET last_snapshot = ?, last_checked_at = ?, version = version + 1
         WHERE id = ? AND version = ?",
        params![
            snapshot,
            update.last_checked_at.timestamp_micros(),
            id.to_string(),
            version_param(update.expected_version)
        ],
    )?;
    if changed == 0 {
        return Err(missing_or_conflict(conn, id));
    }
    Ok(())
}

/// Classify a zero-row conditional update.
fn missing_or_conflict(conn: &Connection, id: MonitoredCaseId) -> StoreError {
    let exists = conn.query_row(
        "SELECT count(*)::BIGINT FROM monitored_cases WHERE id = ?",
        params![id.to_string()],
        |row| row.get::<_, i64>(0),
    );
    match exists {
        Ok(0) => StoreError::NotFound(id),
        Ok(_) => StoreError::Conflict(id),
        Err(e) => e.into(),
    }
}

fn insert_notification(conn: &Connection, n: &Notification) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO notifications (id, user_id, case_number, message, type, is_read, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            n.id.to_string(),
            n.user_id.as_str(),
            n.case_number,
            n.message,
            n.kind.as_str(),
            n.read,
            n.created_at.timestamp_micros()
        ],
    )?;
    Ok(())
}

impl DuckStore {
    /// Open an in-memory DuckDB database with the schema applied.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    ///
    /// Existing tables are reused; the schema is only created when missing.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened monitoring database");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }

    fn query_cases(
        &self,
        where_clause: &str,
        param: Option<&str>,
    ) -> Result<Vec<MonitoredCase>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {CASE_COLUMNS} FROM monitored_cases WHERE {where_clause} ORDER BY created_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<CaseRow> = match param {
            Some(p) => stmt.query_map(params![p], CaseRow::read)?.collect::<Result<_, _>>()?,
            None => stmt.query_map([], CaseRow::read)?.collect::<Result<_, _>>()?,
        };
        rows.into_iter().map(CaseRow::into_case).collect()
    }

    fn count(&self, sql: &str) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[async_trait]
impl MonitoringStore for DuckStore {
    async fn create(
        &self,
        user_id: &UserId,
        case_number: &str,
        institution: &str,
        alias: Option<String>,
    ) -> Result<MonitoredCase, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: i64 = tx.query_row(
            "SELECT count(*)::BIGINT FROM monitored_cases
             WHERE user_id = ? AND case_number = ? AND is_active",
            params![user_id.as_str(), case_number],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(StoreError::AlreadyMonitored {
                case_number: case_number.to_string(),
            });
        }

        let case = MonitoredCase::new(user_id.clone(), case_number, institution, alias, Utc::now());
        tx.execute(
            "INSERT INTO monitored_cases (id, user_id, case_number, institution, alias,
                 last_snapshot, last_checked_at, created_at, is_active, version)
             VALUES (?, ?, ?, ?, ?, NULL, NULL, ?, true, 0)",
            params![
                case.id.to_string(),
                case.user_id.as_str(),
                case.case_number,
                case.institution,
                case.alias,
                case.created_at.timestamp_micros()
            ],
        )?;
        tx.commit()?;
        Ok(case)
    }

    async fn load(&self, id: MonitoredCaseId) -> Result<MonitoredCase, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {CASE_COLUMNS} FROM monitored_cases WHERE id = ?");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id.to_string()], CaseRow::read)?;
        match rows.next() {
            Some(row) => row?.into_case(),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn list_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<MonitoredCase>, StoreError> {
        self.query_cases("is_active AND user_id = ?", Some(user_id.as_str()))
    }

    async fn list_active(&self) -> Result<Vec<MonitoredCase>, StoreError> {
        self.query_cases("is_active", None)
    }

    async fn deactivate(&self, id: MonitoredCaseId, user_id: &UserId) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE monitored_cases SET is_active = false, version = version + 1
             WHERE id = ? AND user_id = ? AND is_active",
            params![id.to_string(), user_id.as_str()],
        )?;
        Ok(changed > 0)
    }

    async fn save(&self, id: MonitoredCaseId, update: SnapshotUpdate) -> Result<(), StoreError> {
        let conn = self.conn()?;
        write_update(&conn, id, &update)
    }

    async fn mark_checked(
        &self,
        id: MonitoredCaseId,
        expected_version: u64,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE monitored_cases SET last_checked_at = ?, version = version + 1
             WHERE id = ? AND version = ?",
            params![
                checked_at.timestamp_micros(),
                id.to_string(),
                version_param(expected_version)
            ],
        )?;
        if changed == 0 {
            return Err(missing_or_conflict(&conn, id));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for DuckStore {
    async fn insert(&self, notification: &Notification) -> Result<NotificationId, StoreError> {
        let conn = self.conn()?;
        insert_notification(&conn, notification)?;
        Ok(notification.id)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ? ORDER BY created_at DESC, seq DESC LIMIT {limit}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<NotificationRow> = stmt
            .query_map(params![user_id.as_str()], NotificationRow::read)?
            .collect::<Result<_, _>>()?;
        rows.into_iter().map(NotificationRow::into_notification).collect()
    }

    async fn unread_count(&self, user_id: &UserId) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(
            "SELECT count(*)::BIGINT FROM notifications WHERE user_id = ? AND NOT is_read",
            params![user_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    async fn mark_read(&self, id: NotificationId, user_id: &UserId) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE notifications SET is_read = true WHERE id = ? AND user_id = ?",
            params![id.to_string(), user_id.as_str()],
        )?;
        Ok(changed > 0)
    }

    async fn mark_all_read(&self, user_id: &UserId) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE notifications SET is_read = true WHERE user_id = ? AND NOT is_read",
            params![user_id.as_str()],
        )?;
        Ok(changed)
    }
}

#[async_trait]
impl CaseStore for DuckStore {
    async fn commit_change(
        &self,
        id: MonitoredCaseId,
        update: SnapshotUpdate,
        notification: &Notification,
    ) -> Result<NotificationId, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        // Dropping `tx` on an early return rolls back.
        write_update(&tx, id, &update)?;
        insert_notification(&tx, notification)?;
        tx.commit()?;
        Ok(notification.id)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            active_monitored_cases: self
                .count("SELECT count(*)::BIGINT FROM monitored_cases WHERE is_active")?,
            total_notifications: self.count("SELECT count(*)::BIGINT FROM notifications")?,
            unread_notifications: self
                .count("SELECT count(*)::BIGINT FROM notifications WHERE NOT is_read")?,
        })
    }
}
