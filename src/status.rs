/// Read-only view of a pending handoff, for the `status` command.
///
/// Unlike the resolver this never removes the cookie or signals anything.
use crate::app_dirs::AppDirs;
use crate::artifact::{self, ExecutableLocator};
use crate::cookie::{parse_pid, HandoffCookie};
use crate::error::HandoffError;
use crate::process::ProcessControl;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct PendingHandoff {
    pub cookie: PathBuf,
    pub contents: String,
    /// `None` when the contents do not parse.
    pub old_pid: Option<i32>,
    pub written_at: Option<DateTime<Utc>>,
    pub old_process_alive: Option<bool>,
    /// `None` when the running executable could not be located.
    pub obsolete_executable: Option<PathBuf>,
    pub obsolete_executable_exists: bool,
}

/// Describe the pending handoff, or `None` in the steady state.
pub fn inspect(
    dirs: &AppDirs,
    processes: &impl ProcessControl,
    locator: &impl ExecutableLocator,
) -> Result<Option<PendingHandoff>, HandoffError> {
    let cookie = HandoffCookie::new(dirs);
    if !cookie.is_present() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(cookie.path()).map_err(|e| HandoffError::CookieRead {
        path: cookie.path().to_path_buf(),
        source: e,
    })?;
    let old_pid = parse_pid(&contents).ok();
    let written_at = std::fs::metadata(cookie.path())
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);
    let obsolete_executable = artifact::locate(locator).ok();
    let obsolete_executable_exists = obsolete_executable
        .as_ref()
        .is_some_and(|p| p.symlink_metadata().is_ok());

    Ok(Some(PendingHandoff {
        cookie: cookie.path().to_path_buf(),
        contents,
        old_pid,
        written_at,
        old_process_alive: old_pid.map(|pid| processes.is_alive(pid)),
        obsolete_executable,
        obsolete_executable_exists,
    }))
}

impl PendingHandoff {
    /// Human-readable multi-line summary.
    pub fn render(&self) -> String {
        let mut out = format!("handoff pending: {}\n", self.cookie.display());
        match self.old_pid {
            Some(pid) => {
                let state = match self.old_process_alive {
                    Some(true) => "running",
                    _ => "not running",
                };
                out.push_str(&format!("  old pid:    {pid} ({state})\n"));
            }
            None => out.push_str(&format!(
                "  old pid:    invalid cookie contents {:?}\n",
                self.contents
            )),
        }
        if let Some(at) = self.written_at {
            out.push_str(&format!("  written at: {}\n", at.to_rfc3339()));
        }
        match &self.obsolete_executable {
            Some(path) => {
                let state = if self.obsolete_executable_exists {
                    "present"
                } else {
                    "missing"
                };
                out.push_str(&format!("  old binary: {} ({state})\n", path.display()));
            }
            None => out.push_str("  old binary: executable not located\n"),
        }
        out
    }
}
