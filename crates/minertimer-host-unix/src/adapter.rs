//! Unix process host implementation

use std::sync::Mutex;
use sysinfo::{ProcessesToUpdate, System};
use tracing::debug;

use minertimer_host_api::{
    matches_pattern, ControlSignal, HostError, HostResult, ProcessEntry, ProcessHost,
};

use crate::send_signal;

/// Process host backed by the OS process table
pub struct UnixHost {
    system: Mutex<System>,
}

impl UnixHost {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for UnixHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHost for UnixHost {
    fn find_processes(&self, pattern: &str) -> HostResult<Vec<ProcessEntry>> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| HostError::Internal("process table lock poisoned".into()))?;

        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut found: Vec<ProcessEntry> = system
            .processes()
            .values()
            // Skip threads, which sysinfo lists alongside processes on Linux
            .filter(|p| p.thread_kind().is_none())
            .filter_map(|p| {
                let name = p.name().to_string_lossy();
                matches_pattern(&name, pattern).then(|| ProcessEntry {
                    pid: p.pid().as_u32(),
                    name: name.into_owned(),
                    start_time: p.start_time(),
                })
            })
            .collect();

        found.sort_by_key(|p| p.pid);
        debug!(pattern, count = found.len(), "Process scan complete");
        Ok(found)
    }

    fn signal(&self, pid: u32, signal: ControlSignal) -> HostResult<()> {
        send_signal(pid, signal)
    }
}
