//! SQLite-based store implementation

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::{AuditEvent, Store, StoreError, StoreResult, ValueRecord};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- One row per synced value
            CREATE TABLE IF NOT EXISTS synced_values (
                key TEXT PRIMARY KEY,
                value REAL NOT NULL,
                last_updated TEXT NOT NULL
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .ok()
}

impl Store for SqliteStore {
    fn load_value(&self, key: &str) -> StoreResult<Option<ValueRecord>> {
        let conn = self.lock()?;

        let row: Option<(f64, String)> = conn
            .query_row(
                "SELECT value, last_updated FROM synced_values WHERE key = ?",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((value, last_updated)) = row else {
            return Ok(None);
        };

        let last_updated =
            parse_timestamp(&last_updated).ok_or_else(|| StoreError::CorruptRecord {
                key: key.to_string(),
                reason: format!("bad timestamp '{}'", last_updated),
            })?;

        if !value.is_finite() || value < 0.0 {
            return Err(StoreError::CorruptRecord {
                key: key.to_string(),
                reason: format!("value {} out of range", value),
            });
        }

        Ok(Some(ValueRecord {
            value,
            last_updated,
        }))
    }

    fn save_value(&self, key: &str, record: &ValueRecord) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO synced_values (key, value, last_updated)
            VALUES (?, ?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value = excluded.value, last_updated = excluded.last_updated
            "#,
            params![key, record.value, record.last_updated.to_rfc3339()],
        )?;

        debug!(key, value = record.value, "Value saved");
        Ok(())
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.lock()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp =
                parse_timestamp(&timestamp_str).unwrap_or_else(minertimer_util::now);
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditEventType;
    use chrono::TimeZone;

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.recent_audits(10).unwrap().is_empty());
    }

    #[test]
    fn test_missing_value() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load_value("played_time").unwrap().is_none());
    }

    #[test]
    fn test_value_upsert() {
        let store = SqliteStore::in_memory().unwrap();
        let t1 = Local.with_ymd_and_hms(2025, 12, 25, 10, 0, 0).unwrap();
        let t2 = Local.with_ymd_and_hms(2025, 12, 25, 10, 5, 0).unwrap();

        store
            .save_value("played_time", &ValueRecord { value: 12.5, last_updated: t1 })
            .unwrap();
        store
            .save_value("played_time", &ValueRecord { value: 17.25, last_updated: t2 })
            .unwrap();

        let loaded = store.load_value("played_time").unwrap().unwrap();
        assert_eq!(loaded.value, 17.25);
        assert_eq!(loaded.last_updated, t2);
        assert!(store.load_value("current_limit").unwrap().is_none());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("minertimer.db");
        let t = Local.with_ymd_and_hms(2025, 12, 26, 9, 30, 0).unwrap();

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .save_value("weekend_limit", &ValueRecord { value: 150.0, last_updated: t })
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load_value("weekend_limit").unwrap().unwrap();
        assert_eq!(loaded.value, 150.0);
        assert_eq!(loaded.last_updated, t);
    }

    #[test]
    fn test_corrupt_timestamp_reported() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO synced_values (key, value, last_updated) VALUES ('played_time', 3.0, 'yesterday')",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.load_value("played_time"),
            Err(StoreError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_audit_log() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
            .unwrap();
        store
            .append_audit(AuditEvent::new(AuditEventType::DayRolledOver {
                weekend: true,
                current_limit: 120.0,
            }))
            .unwrap();

        let events = store.recent_audits(10).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0].event,
            AuditEventType::DayRolledOver { weekend: true, .. }
        ));
        assert!(matches!(events[1].event, AuditEventType::ServiceStarted));

        let limited = store.recent_audits(1).unwrap();
        assert_eq!(limited.len(), 1);
    }
}
