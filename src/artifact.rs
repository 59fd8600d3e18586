/// The obsolete executable left behind by a self-update.
///
/// The old binary is renamed to `<resolved-exe>.old` before the new one takes
/// its place; the successor locates it from its own canonical path.
use crate::error::HandoffError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Suffix appended to the running executable's path for the replaced binary.
pub const OBSOLETE_SUFFIX: &str = ".old";

/// Seam over "where am I running from".
pub trait ExecutableLocator {
    /// Path of the running executable, possibly a symlink.
    fn current_exe(&self) -> std::io::Result<PathBuf>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CurrentExe;

impl ExecutableLocator for CurrentExe {
    fn current_exe(&self) -> std::io::Result<PathBuf> {
        std::env::current_exe()
    }
}

/// `<path>.old`. Appends to the full file name; never replaces an extension.
pub fn obsolete_path(executable: &Path) -> PathBuf {
    let mut name: OsString = executable.as_os_str().to_owned();
    name.push(OBSOLETE_SUFFIX);
    PathBuf::from(name)
}

/// Locate the obsolete executable for the running binary.
///
/// The executable path is resolved through symlinks first: launchers may
/// start us via a link, but the old binary was renamed next to the real file.
pub fn locate(locator: &impl ExecutableLocator) -> Result<PathBuf, HandoffError> {
    let exe = locator
        .current_exe()
        .map_err(|source| HandoffError::ExecutablePath { source })?;
    let resolved =
        std::fs::canonicalize(&exe).map_err(|source| HandoffError::ExecutablePath { source })?;
    Ok(obsolete_path(&resolved))
}

/// What happened to the obsolete executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Deleted, after this many attempts.
    Deleted { attempts: u32 },
    /// Nothing to delete.
    AlreadyGone,
}

/// Delete `path`, retrying up to `attempts` times on errors other than NotFound.
///
/// Retries cover the window where the old process is still shutting down and
/// keeps its binary busy.
pub fn remove(path: &Path, attempts: u32, retry_delay: Duration) -> Result<Removal, HandoffError> {
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), attempt, "old executable deleted");
                return Ok(Removal::Deleted { attempts: attempt });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Removal::AlreadyGone);
            }
            Err(e) if attempt >= attempts => {
                return Err(HandoffError::ArtifactDelete {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "old executable not deleted, retrying"
                );
                std::thread::sleep(retry_delay);
            }
        }
    }
}
