//! Store trait definitions

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{AuditEvent, StoreResult};

/// Persisted state of one synced value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    /// Minutes
    pub value: f64,
    pub last_updated: DateTime<Local>,
}

/// Main store trait.
///
/// Only the daemon's single event loop writes, so implementations need
/// interior mutability but no cross-writer coordination.
pub trait Store: Send + Sync {
    // Synced values

    /// Load the record stored under `key`, if any
    fn load_value(&self, key: &str) -> StoreResult<Option<ValueRecord>>;

    /// Insert or replace the record stored under `key`
    fn save_value(&self, key: &str, record: &ValueRecord) -> StoreResult<()>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;
}
