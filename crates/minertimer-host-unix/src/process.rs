//! Signal delivery

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::debug;

use minertimer_host_api::{ControlSignal, HostError, HostResult};

fn to_nix(signal: ControlSignal) -> Signal {
    match signal {
        ControlSignal::Stop => Signal::SIGSTOP,
        ControlSignal::Continue => Signal::SIGCONT,
    }
}

/// Send a job-control signal to a single process
pub fn send_signal(pid: u32, signal: ControlSignal) -> HostResult<()> {
    let raw = i32::try_from(pid)
        .ok()
        .filter(|p| *p > 0)
        .ok_or(HostError::ProcessNotFound(pid))?;

    match signal::kill(Pid::from_raw(raw), to_nix(signal)) {
        Ok(()) => {
            debug!(pid, signal = ?signal, "Signal sent");
            Ok(())
        }
        Err(Errno::ESRCH) => Err(HostError::ProcessNotFound(pid)),
        Err(Errno::EPERM) => Err(HostError::PermissionDenied(pid)),
        Err(e) => Err(HostError::Internal(format!(
            "Failed to send {:?} to {}: {}",
            signal, pid, e
        ))),
    }
}
