//! Shared types for the minertimer API

use chrono::{DateTime, Local};
use minertimer_util::DayType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four synchronized quantities, all measured in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    CurrentLimit,
    WeekdayLimit,
    WeekendLimit,
    PlayedTime,
}

impl ValueKind {
    pub const ALL: [ValueKind; 4] = [
        ValueKind::CurrentLimit,
        ValueKind::WeekdayLimit,
        ValueKind::WeekendLimit,
        ValueKind::PlayedTime,
    ];

    /// Stable key used for persistence and topic names
    pub fn key(self) -> &'static str {
        match self {
            ValueKind::CurrentLimit => "current_limit",
            ValueKind::WeekdayLimit => "weekday_limit",
            ValueKind::WeekendLimit => "weekend_limit",
            ValueKind::PlayedTime => "played_time",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ValueKind::CurrentLimit => "Current Limit",
            ValueKind::WeekdayLimit => "Weekday Limit",
            ValueKind::WeekendLimit => "Weekend Limit",
            ValueKind::PlayedTime => "Time Played",
        }
    }

    /// Whether remote commands may set this value.
    /// Played time is only ever accrued locally.
    pub fn is_mutable(self) -> bool {
        !matches!(self, ValueKind::PlayedTime)
    }

    /// Base limit kind that applies on days of the given type
    pub fn base_limit_for(day: DayType) -> Self {
        match day {
            DayType::Weekday => ValueKind::WeekdayLimit,
            DayType::Weekend => ValueKind::WeekendLimit,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Where a value change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Accrual, rollover or a local control command
    Local,
    /// A command received over the message bus
    Remote,
}

/// Lifecycle state of the monitored process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Running,
    Suspended,
}

/// The process currently being monitored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredProcess {
    pub pid: u32,
    pub name: String,
    /// Process start time in seconds since the epoch, as reported by the OS
    pub start_time: u64,
    pub state: ProcessState,
}

impl MonitoredProcess {
    /// Copy of this process record with a different state
    pub fn with_state(&self, state: ProcessState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == ProcessState::Running
    }
}

/// Connection state of the remote message-bus link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Remote sync is turned off in configuration
    Disabled,
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disabled => "disabled",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// A value as it should appear on its remote state topic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatePublication {
    pub kind: ValueKind,
    pub value: f64,
    pub timestamp: DateTime<Local>,
}

/// Full budget state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub api_version: u32,
    pub current_limit: f64,
    pub weekday_limit: f64,
    pub weekend_limit: f64,
    pub played_time: f64,
    pub day_type: DayType,
    pub process: Option<MonitoredProcess>,
    pub remote_link: ConnectionState,
    pub taken_at: DateTime<Local>,
}

impl BudgetSnapshot {
    /// Minutes left today, never negative
    pub fn remaining_minutes(&self) -> f64 {
        (self.current_limit - self.played_time).max(0.0)
    }

    pub fn is_exhausted(&self) -> bool {
        self.played_time >= self.current_limit
    }
}
