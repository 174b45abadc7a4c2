//! Monitored process discovery and control

use minertimer_api::{MonitoredProcess, ProcessState};
use minertimer_host_api::{ControlSignal, ProcessHost};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What changed during a `refresh`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// Same process as before (or still none)
    Unchanged,
    /// A process appeared; any previously tracked one is gone
    Found {
        process: MonitoredProcess,
        replaced: Option<MonitoredProcess>,
    },
    /// The tracked process disappeared
    Lost(MonitoredProcess),
}

/// Tracks the monitored process and pauses/continues it.
///
/// Signal failures are logged and leave the tracked state untouched;
/// the next `refresh` corrects anything that went stale.
pub struct ProcessController {
    host: Arc<dyn ProcessHost>,
    pattern: String,
    tracked: Option<MonitoredProcess>,
}

impl ProcessController {
    pub fn new(host: Arc<dyn ProcessHost>, pattern: impl Into<String>) -> Self {
        Self {
            host,
            pattern: pattern.into(),
            tracked: None,
        }
    }

    pub fn process(&self) -> Option<&MonitoredProcess> {
        self.tracked.as_ref()
    }

    pub fn state(&self) -> Option<ProcessState> {
        self.tracked.as_ref().map(|p| p.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == Some(ProcessState::Running)
    }

    pub fn is_suspended(&self) -> bool {
        self.state() == Some(ProcessState::Suspended)
    }

    /// Rescan the process table.
    ///
    /// The tracked process keeps its state while its pid is still listed.
    /// Otherwise the lowest matching pid becomes the new tracked process,
    /// starting as Running.
    pub fn refresh(&mut self) -> Discovery {
        let found = match self.host.find_processes(&self.pattern) {
            Ok(found) => found,
            Err(e) => {
                warn!(pattern = %self.pattern, error = %e, "Process scan failed");
                return Discovery::Unchanged;
            }
        };

        if let Some(tracked) = &self.tracked
            && found.iter().any(|p| p.pid == tracked.pid)
        {
            return Discovery::Unchanged;
        }

        match found.into_iter().next() {
            Some(entry) => {
                let process = MonitoredProcess {
                    pid: entry.pid,
                    name: entry.name,
                    start_time: entry.start_time,
                    state: ProcessState::Running,
                };
                info!(pid = process.pid, name = %process.name, "Monitored process found");
                let replaced = self.tracked.replace(process.clone());
                Discovery::Found { process, replaced }
            }
            None => match self.tracked.take() {
                Some(lost) => {
                    info!(pid = lost.pid, "Monitored process gone");
                    Discovery::Lost(lost)
                }
                None => Discovery::Unchanged,
            },
        }
    }

    /// Pause the tracked process. Returns whether a transition happened.
    pub fn suspend(&mut self) -> bool {
        self.transition(ProcessState::Running, ProcessState::Suspended, ControlSignal::Stop)
    }

    /// Continue the tracked process. Returns whether a transition happened.
    pub fn resume(&mut self) -> bool {
        self.transition(ProcessState::Suspended, ProcessState::Running, ControlSignal::Continue)
    }

    fn transition(&mut self, from: ProcessState, to: ProcessState, signal: ControlSignal) -> bool {
        let Some(process) = &self.tracked else {
            debug!(signal = ?signal, "No monitored process");
            return false;
        };
        if process.state != from {
            return false;
        }

        match self.host.signal(process.pid, signal) {
            Ok(()) => {
                self.tracked = Some(process.with_state(to));
                true
            }
            Err(e) => {
                warn!(pid = process.pid, signal = ?signal, error = %e, "Failed to signal process");
                false
            }
        }
    }
}
