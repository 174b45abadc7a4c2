//! Host traits

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from host operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("No such process: {0}")]
    ProcessNotFound(u32),

    #[error("Permission denied signalling pid {0}")]
    PermissionDenied(u32),

    #[error("Process scan failed: {0}")]
    ScanFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// A process as seen by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    /// Seconds since the epoch
    pub start_time: u64,
}

/// Job-control signal used to pause or continue a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    /// SIGSTOP
    Stop,
    /// SIGCONT
    Continue,
}

/// Whether a process name matches the configured pattern
/// (case-insensitive substring).
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    !pattern.is_empty() && name.to_lowercase().contains(&pattern.to_lowercase())
}

/// Platform process access, implemented by `UnixHost` and `MockHost`
pub trait ProcessHost: Send + Sync {
    /// List running processes whose name matches `pattern`, lowest pid first
    fn find_processes(&self, pattern: &str) -> HostResult<Vec<ProcessEntry>>;

    /// Send a job-control signal to `pid`
    fn signal(&self, pid: u32, signal: ControlSignal) -> HostResult<()>;
}
