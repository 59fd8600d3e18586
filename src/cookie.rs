/// Handoff cookie: the marker file that carries the old process's PID to its successor.
///
/// Written by the old process right before it gives up control, taken by the
/// new process at launch. Taking the cookie hands back a guard that removes the
/// file on every exit path so a stale PID can never re-trigger a handoff.
use crate::app_dirs::{AppDirs, COOKIE_FILE_NAME};
use crate::error::HandoffError;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub struct HandoffCookie {
    path: PathBuf,
}

impl HandoffCookie {
    pub fn new(dirs: &AppDirs) -> Self {
        Self {
            path: dirs.cookie(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a handoff is pending.
    ///
    /// Only NotFound counts as absent; any other stat failure is treated as
    /// present so the subsequent read surfaces the real error.
    pub fn is_present(&self) -> bool {
        match std::fs::symlink_metadata(&self.path) {
            Ok(_) => true,
            Err(e) => e.kind() != std::io::ErrorKind::NotFound,
        }
    }

    /// Write `pid` as the cookie, replacing any existing one.
    ///
    /// Writes to a temporary file (mode 0600) in the same directory, then
    /// renames it over the cookie so a reader never sees a partial write.
    /// A PID the resolver would refuse (0, or above `i32::MAX`) is never written.
    pub fn write(&self, pid: u32) -> Result<(), HandoffError> {
        let contents = pid.to_string();
        parse_pid(&contents)?;

        let write_err = |source| HandoffError::CookieWrite {
            path: self.path.clone(),
            source,
        };

        let dir = self.path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(write_err)?;

        let tmp_path = temp_path(dir);
        let result = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp_path)
            .and_then(|mut file| file.write_all(contents.as_bytes()))
            .and_then(|()| std::fs::rename(&tmp_path, &self.path));

        if let Err(e) = result {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(write_err(e));
        }

        tracing::info!(pid, path = %self.path.display(), "self-update cookie written");
        Ok(())
    }

    /// Claim the cookie for processing, if one is present.
    pub fn take(&self) -> Option<TakenCookie> {
        self.is_present().then(|| TakenCookie {
            path: self.path.clone(),
            removed: false,
        })
    }
}

/// Hidden sibling of the cookie, unique per writing process.
fn temp_path(dir: &Path) -> PathBuf {
    dir.join(format!(".{COOKIE_FILE_NAME}.tmp.{}", std::process::id()))
}

/// Leave a cookie naming the current process. Best-effort: failures are logged.
pub fn leave_cookie(dirs: &AppDirs) {
    let cookie = HandoffCookie::new(dirs);
    if let Err(e) = cookie.write(std::process::id()) {
        tracing::error!(error = %e, "failed to leave self-update cookie");
    }
}

/// A cookie claimed by the resolver. Removed from disk when dropped.
#[derive(Debug)]
pub struct TakenCookie {
    path: PathBuf,
    removed: bool,
}

impl TakenCookie {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw cookie contents.
    pub fn read(&self) -> Result<String, HandoffError> {
        std::fs::read_to_string(&self.path).map_err(|e| HandoffError::CookieRead {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Time since the cookie was last written, if the filesystem reports it.
    pub fn age(&self) -> Option<Duration> {
        let modified = std::fs::metadata(&self.path).ok()?.modified().ok()?;
        SystemTime::now().duration_since(modified).ok()
    }

    /// Remove the cookie now, reporting failure to the caller.
    pub fn remove(mut self) -> Result<(), HandoffError> {
        self.removed = true;
        remove_cookie_file(&self.path)
    }
}

impl Drop for TakenCookie {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = remove_cookie_file(&self.path) {
            tracing::error!(error = %e, "failed to remove self-update cookie");
        }
    }
}

fn remove_cookie_file(path: &Path) -> Result<(), HandoffError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "self-update cookie removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HandoffError::CookieRemove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Parse cookie contents as a positive PID. Surrounding whitespace is ignored.
pub fn parse_pid(contents: &str) -> Result<i32, HandoffError> {
    let format_err = |reason: String| HandoffError::CookieFormat {
        contents: contents.to_string(),
        reason,
    };

    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Err(format_err("empty".to_string()));
    }
    let pid: i32 = trimmed.parse().map_err(|e| format_err(format!("{e}")))?;
    // 0 and negative values address process groups, never a single process.
    if pid <= 0 {
        return Err(format_err("not a positive process id".to_string()));
    }
    Ok(pid)
}
