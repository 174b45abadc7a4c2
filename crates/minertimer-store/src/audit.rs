//! Audit event types

use chrono::{DateTime, Local};
use minertimer_api::{Origin, ValueKind};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    ServiceStarted,

    ServiceStopped,

    /// Played time reset and current limit recomputed for a new day
    DayRolledOver { weekend: bool, current_limit: f64 },

    ProcessSuspended {
        pid: u32,
        played_minutes: f64,
        limit_minutes: f64,
    },

    ProcessResumed {
        pid: u32,
        played_minutes: f64,
        limit_minutes: f64,
    },

    /// Current limit raised by a privileged command
    LimitExtended {
        origin: Origin,
        added_minutes: f64,
        current_limit: f64,
    },

    /// Played time zeroed by a privileged command
    PlayedTimeReset { previous_minutes: f64 },

    /// A remote command changed a value
    RemoteUpdateApplied {
        kind: ValueKind,
        previous: f64,
        value: f64,
    },

    /// A privileged control command was refused
    PermissionDenied { command: String, uid: Option<u32> },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: minertimer_util::now(),
            event,
        }
    }
}
