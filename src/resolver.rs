/// First-launch handling for a self-update.
///
/// Runs once at startup, before any other subsystem. If the old instance left a
/// handoff cookie behind, interrupt it, wait a bounded time for it to exit,
/// then delete its obsolete executable. Every failure is logged and folded into
/// the returned outcome; nothing here can stop the application from starting.
use crate::app_dirs::AppDirs;
use crate::artifact::{self, CurrentExe, ExecutableLocator, Removal};
use crate::config::HandoffSettings;
use crate::cookie::{parse_pid, HandoffCookie};
use crate::error::HandoffError;
use crate::process::{self, ProcessControl, SystemProcesses};
use std::path::PathBuf;
use std::time::Duration;

/// Result of one resolver run.
#[derive(Debug)]
pub enum HandoffOutcome {
    /// No cookie: the steady state.
    NotPending,
    /// A cookie was found but could not be acted on.
    Aborted { error: HandoffError },
    /// The handoff ran. Individual steps may still have failed.
    Completed(HandoffReport),
}

#[derive(Debug)]
pub struct HandoffReport {
    pub old_pid: i32,
    pub signal: SignalOutcome,
    pub artifact: ArtifactOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Interrupted, and the old process exited within the bounded wait.
    Exited { waited: Duration },
    /// Interrupted, but still running when the wait ran out.
    StillRunning,
    /// The interrupt could not be delivered.
    Failed,
    /// The cookie was too old to trust its PID; nothing was signalled.
    SkippedStale { age: Duration },
    /// The cookie named this process; nothing was signalled.
    SkippedSelf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    Deleted { path: PathBuf, attempts: u32 },
    AlreadyGone { path: PathBuf },
    Failed { path: PathBuf },
    /// The running executable could not be located; nothing was deleted.
    Unlocated,
}

pub struct HandoffResolver<P = SystemProcesses, E = CurrentExe> {
    cookie: HandoffCookie,
    settings: HandoffSettings,
    processes: P,
    executable: E,
}

impl HandoffResolver {
    /// Resolver acting on real processes and the real executable.
    pub fn new(dirs: &AppDirs, settings: HandoffSettings) -> Self {
        Self::with_host(dirs, settings, SystemProcesses, CurrentExe)
    }
}

impl<P: ProcessControl, E: ExecutableLocator> HandoffResolver<P, E> {
    pub fn with_host(
        dirs: &AppDirs,
        settings: HandoffSettings,
        processes: P,
        executable: E,
    ) -> Self {
        Self {
            cookie: HandoffCookie::new(dirs),
            settings,
            processes,
            executable,
        }
    }

    pub fn resolve(&self) -> HandoffOutcome {
        let Some(taken) = self.cookie.take() else {
            tracing::debug!(
                path = %self.cookie.path().display(),
                "no self-update handoff pending"
            );
            return HandoffOutcome::NotPending;
        };
        tracing::info!(path = %taken.path().display(), "self-update cookie found");

        // The cookie goes away as soon as it has been read, whatever comes next.
        let contents = taken.read();
        let age = taken.age();
        if let Err(e) = taken.remove() {
            tracing::error!(error = %e, "failed to remove self-update cookie");
        }

        let old_pid = match contents.and_then(|c| parse_pid(&c)) {
            Ok(pid) => pid,
            Err(e) => {
                tracing::error!(error = %e, "self-update handoff aborted");
                return HandoffOutcome::Aborted { error: e };
            }
        };

        let signal = if old_pid == self.processes.current_pid() {
            // PID reuse or an in-place exec: never interrupt ourselves, still clean up.
            let e = HandoffError::SelfReference { pid: old_pid };
            tracing::warn!(error = %e, "not signalling");
            SignalOutcome::SkippedSelf
        } else if let Some(age) = self.stale(age) {
            tracing::warn!(
                pid = old_pid,
                age_secs = age.as_secs(),
                "self-update cookie is stale, not signalling"
            );
            SignalOutcome::SkippedStale { age }
        } else {
            self.stop_old_process(old_pid)
        };
        let artifact = self.delete_old_executable();

        tracing::info!(pid = old_pid, ?signal, ?artifact, "self-update handoff finished");
        HandoffOutcome::Completed(HandoffReport {
            old_pid,
            signal,
            artifact,
        })
    }

    /// The cookie's age, if it is older than the configured limit.
    fn stale(&self, age: Option<Duration>) -> Option<Duration> {
        let limit = self.settings.stale_after()?;
        age.filter(|age| *age > limit)
    }

    fn stop_old_process(&self, pid: i32) -> SignalOutcome {
        // Lookup is advisory: a missing process is reported, the interrupt is still sent.
        if !self.processes.is_alive(pid) {
            let e = HandoffError::ProcessLookup { pid };
            tracing::warn!(error = %e, "old process lookup failed");
        }

        if let Err(e) = self.processes.interrupt(pid) {
            tracing::error!(error = %e, "failed to interrupt old process");
            return SignalOutcome::Failed;
        }
        tracing::info!(pid, "interrupt sent to old process");

        match process::wait_for_exit(
            &self.processes,
            pid,
            self.settings.exit_timeout(),
            self.settings.poll_interval(),
        ) {
            Ok(waited) => {
                tracing::info!(pid, waited_ms = waited.as_millis() as u64, "old process exited");
                SignalOutcome::Exited { waited }
            }
            Err(e) => {
                tracing::warn!(error = %e, "old process did not exit in time");
                SignalOutcome::StillRunning
            }
        }
    }

    fn delete_old_executable(&self) -> ArtifactOutcome {
        let path = match artifact::locate(&self.executable) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(error = %e, "old executable not located, skipping delete");
                return ArtifactOutcome::Unlocated;
            }
        };

        match artifact::remove(
            &path,
            self.settings.delete_attempts,
            self.settings.poll_interval(),
        ) {
            Ok(Removal::Deleted { attempts }) => ArtifactOutcome::Deleted { path, attempts },
            Ok(Removal::AlreadyGone) => {
                tracing::warn!(
                    path = %path.display(),
                    "old executable not found, nothing to delete"
                );
                ArtifactOutcome::AlreadyGone { path }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to delete old executable");
                ArtifactOutcome::Failed { path }
            }
        }
    }
}

impl std::fmt::Display for HandoffOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandoffOutcome::NotPending => write!(f, "no handoff pending"),
            HandoffOutcome::Aborted { error } => write!(f, "handoff aborted: {error}"),
            HandoffOutcome::Completed(report) => {
                write!(f, "handoff from pid {}: ", report.old_pid)?;
                match &report.signal {
                    SignalOutcome::Exited { waited } => {
                        write!(f, "old process exited after {}ms", waited.as_millis())?
                    }
                    SignalOutcome::StillRunning => write!(f, "old process still running")?,
                    SignalOutcome::Failed => write!(f, "interrupt not delivered")?,
                    SignalOutcome::SkippedSelf => {
                        write!(f, "cookie named this process, not signalled")?
                    }
                    SignalOutcome::SkippedStale { age } => {
                        write!(f, "stale cookie ({}s old), not signalled", age.as_secs())?
                    }
                }
                match &report.artifact {
                    ArtifactOutcome::Deleted { path, attempts } => {
                        write!(f, "; deleted {} (attempt {attempts})", path.display())
                    }
                    ArtifactOutcome::AlreadyGone { path } => {
                        write!(f, "; {} already gone", path.display())
                    }
                    ArtifactOutcome::Failed { path } => {
                        write!(f, "; could not delete {}", path.display())
                    }
                    ArtifactOutcome::Unlocated => write!(f, "; executable not located"),
                }
            }
        }
    }
}
