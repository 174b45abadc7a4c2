//! Core events emitted by the budget clock

use minertimer_api::{Origin, ValueKind};

/// Events emitted by the budget clock
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// A synced value was updated
    ValueChanged {
        kind: ValueKind,
        value: f64,
        origin: Origin,
    },

    /// A matching process appeared (or replaced the tracked one)
    ProcessDiscovered { pid: u32, name: String },

    /// The tracked process is gone
    ProcessLost { pid: u32 },

    /// The tracked process was paused
    ProcessSuspended {
        pid: u32,
        played_minutes: f64,
        limit_minutes: f64,
    },

    /// The tracked process was continued
    ProcessResumed {
        pid: u32,
        played_minutes: f64,
        limit_minutes: f64,
    },

    /// Played time reset for a new day
    DayRolledOver { weekend: bool, current_limit: f64 },

    /// Remaining time crossed a warning threshold
    Warning {
        threshold_minutes: u32,
        remaining_minutes: f64,
    },
}
