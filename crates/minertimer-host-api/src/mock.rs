//! Mock process host for testing

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{matches_pattern, ControlSignal, HostError, HostResult, ProcessEntry, ProcessHost};

/// Failure to inject into the next signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSignalFailure {
    NotFound,
    PermissionDenied,
}

/// Mock host for unit/integration testing.
///
/// Holds a fake process table and records every signal it is asked to
/// send, so tests can assert exact suspend/resume counts.
#[derive(Default)]
pub struct MockHost {
    processes: Mutex<BTreeMap<u32, ProcessEntry>>,
    signals: Mutex<Vec<(u32, ControlSignal)>>,
    fail_signal: Mutex<Option<MockSignalFailure>>,
    fail_scan: Mutex<bool>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a process to the fake process table
    pub fn spawn_process(&self, pid: u32, name: &str) {
        self.processes.lock().unwrap().insert(
            pid,
            ProcessEntry {
                pid,
                name: name.to_string(),
                start_time: 1_700_000_000 + pid as u64,
            },
        );
    }

    /// Simulate a process exiting
    pub fn kill_process(&self, pid: u32) {
        self.processes.lock().unwrap().remove(&pid);
    }

    /// All signals sent so far, in order
    pub fn signals(&self) -> Vec<(u32, ControlSignal)> {
        self.signals.lock().unwrap().clone()
    }

    pub fn signal_count(&self, signal: ControlSignal) -> usize {
        self.signals
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| *s == signal)
            .count()
    }

    pub fn clear_signals(&self) {
        self.signals.lock().unwrap().clear();
    }

    /// Make subsequent signals fail (or succeed again with `None`)
    pub fn set_signal_failure(&self, failure: Option<MockSignalFailure>) {
        *self.fail_signal.lock().unwrap() = failure;
    }

    pub fn set_scan_failure(&self, fail: bool) {
        *self.fail_scan.lock().unwrap() = fail;
    }
}

impl ProcessHost for MockHost {
    fn find_processes(&self, pattern: &str) -> HostResult<Vec<ProcessEntry>> {
        if *self.fail_scan.lock().unwrap() {
            return Err(HostError::ScanFailed("Mock scan failure".into()));
        }

        // BTreeMap iteration is already ordered by pid
        Ok(self
            .processes
            .lock()
            .unwrap()
            .values()
            .filter(|p| matches_pattern(&p.name, pattern))
            .cloned()
            .collect())
    }

    fn signal(&self, pid: u32, signal: ControlSignal) -> HostResult<()> {
        match *self.fail_signal.lock().unwrap() {
            Some(MockSignalFailure::NotFound) => return Err(HostError::ProcessNotFound(pid)),
            Some(MockSignalFailure::PermissionDenied) => {
                return Err(HostError::PermissionDenied(pid));
            }
            None => {}
        }

        if !self.processes.lock().unwrap().contains_key(&pid) {
            return Err(HostError::ProcessNotFound(pid));
        }

        self.signals.lock().unwrap().push((pid, signal));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_scan_filters_and_orders() {
        let host = MockHost::new();
        host.spawn_process(300, "java");
        host.spawn_process(100, "Java");
        host.spawn_process(200, "bash");

        let found = host.find_processes("java").unwrap();
        let pids: Vec<u32> = found.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![100, 300]);

        host.kill_process(100);
        assert_eq!(host.find_processes("java").unwrap().len(), 1);
    }

    #[test]
    fn mock_records_signals() {
        let host = MockHost::new();
        host.spawn_process(42, "java");

        host.signal(42, ControlSignal::Stop).unwrap();
        host.signal(42, ControlSignal::Continue).unwrap();

        assert_eq!(
            host.signals(),
            vec![(42, ControlSignal::Stop), (42, ControlSignal::Continue)]
        );
        assert_eq!(host.signal_count(ControlSignal::Stop), 1);
    }

    #[test]
    fn mock_signal_failures() {
        let host = MockHost::new();
        host.spawn_process(42, "java");

        assert!(matches!(
            host.signal(7, ControlSignal::Stop),
            Err(HostError::ProcessNotFound(7))
        ));

        host.set_signal_failure(Some(MockSignalFailure::PermissionDenied));
        assert!(matches!(
            host.signal(42, ControlSignal::Stop),
            Err(HostError::PermissionDenied(42))
        ));
        assert!(host.signals().is_empty());
    }
}
