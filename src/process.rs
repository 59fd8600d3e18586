/// Control over the previous instance: liveness check, interrupt delivery,
/// and a bounded wait for it to go away.
use crate::error::HandoffError;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::{Duration, Instant};

/// Seam over OS process operations so the resolver can be exercised without
/// signalling real processes.
pub trait ProcessControl {
    /// Whether a process with this PID currently exists. Advisory only.
    fn is_alive(&self, pid: i32) -> bool;

    /// Ask the process to shut down cleanly (SIGINT). Does not wait.
    fn interrupt(&self, pid: i32) -> Result<(), HandoffError>;

    /// PID of this process. A cookie naming it is never acted on.
    fn current_pid(&self) -> i32 {
        std::process::id() as i32
    }
}

/// The real thing, backed by `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl ProcessControl for SystemProcesses {
    fn is_alive(&self, pid: i32) -> bool {
        // Signal 0 tests existence. EPERM means it exists but belongs to someone else.
        match kill(Pid::from_raw(pid), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn interrupt(&self, pid: i32) -> Result<(), HandoffError> {
        kill(Pid::from_raw(pid), Signal::SIGINT)
            .map_err(|source| HandoffError::SignalDelivery { pid, source })
    }
}

/// Poll until `pid` is gone or `timeout` elapses.
///
/// Returns how long the wait took, or `ExitTimeout` if the process outlived it.
pub fn wait_for_exit(
    processes: &impl ProcessControl,
    pid: i32,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Duration, HandoffError> {
    let poll_interval = poll_interval.max(Duration::from_millis(1));
    let start = Instant::now();
    loop {
        if !processes.is_alive(pid) {
            return Ok(start.elapsed());
        }
        let waited = start.elapsed();
        if waited >= timeout {
            return Err(HandoffError::ExitTimeout { pid, waited });
        }
        std::thread::sleep(poll_interval.min(timeout - waited));
    }
}
