use std::path::PathBuf;
use std::time::Duration;

/// Failures of the self-update handoff.
///
/// None of these abort application startup. The resolver logs them and
/// folds them into its outcome.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    /// Cookie exists but could not be read.
    #[error("could not read self-update cookie {}: {source}", .path.display())]
    CookieRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Cookie contents are not a usable process identifier.
    #[error("self-update cookie contents invalid: {contents:?}: {reason}")]
    CookieFormat { contents: String, reason: String },

    /// Cookie names the process that is reading it.
    #[error("self-update cookie names the current process ({pid})")]
    SelfReference { pid: i32 },

    /// Cookie could not be written.
    #[error("could not write self-update cookie {}: {source}", .path.display())]
    CookieWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Cookie could not be removed after processing.
    #[error("could not remove self-update cookie {}: {source}", .path.display())]
    CookieRemove {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The old process does not appear to exist.
    #[error("old process {pid} not found")]
    ProcessLookup { pid: i32 },

    /// The interrupt could not be delivered.
    #[error("could not signal old process {pid}: {source}")]
    SignalDelivery { pid: i32, source: nix::Error },

    /// The old process was still alive when the bounded wait ran out.
    #[error("old process {pid} still running after {waited:?}")]
    ExitTimeout { pid: i32, waited: Duration },

    /// The current executable path could not be determined or resolved.
    #[error("could not find executable: {source}")]
    ExecutablePath { source: std::io::Error },

    /// The obsolete executable could not be deleted.
    #[error("error deleting old executable {}: {source}", .path.display())]
    ArtifactDelete {
        path: PathBuf,
        source: std::io::Error,
    },
}
