//! Event types for daemon -> client streaming

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{BudgetSnapshot, ConnectionState, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: minertimer_util::now(),
            payload,
        }
    }
}

/// All possible events from the daemon to clients.
///
/// These are the notification hooks: a speech or desktop-notification shim
/// subscribes and reacts to `WarningIssued` and `ProcessSuspended`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Full state snapshot (sent on subscribe and after value changes)
    StateChanged(BudgetSnapshot),

    /// Remaining time dropped to or below a warning threshold
    WarningIssued {
        threshold_minutes: u32,
        remaining_minutes: f64,
    },

    /// The monitored process was paused because the budget ran out
    ProcessSuspended {
        pid: u32,
        played_minutes: f64,
        limit_minutes: f64,
    },

    /// The monitored process was continued because budget is available again
    ProcessResumed {
        pid: u32,
        played_minutes: f64,
        limit_minutes: f64,
    },

    /// A new day started; played time was reset
    DayRolledOver {
        weekend: bool,
        current_limit: f64,
    },

    /// Remote link connection state changed
    RemoteLinkChanged { state: ConnectionState },

    /// Daemon is shutting down
    Shutdown,
}
