use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level settings loaded from `<config-dir>/config.toml`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct HandoffConfig {
    pub handoff: HandoffSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HandoffSettings {
    /// How long to wait for the old process to exit after interrupting it.
    pub exit_timeout_ms: u64,
    /// Liveness poll and delete retry interval.
    pub poll_interval_ms: u64,
    /// Attempts at removing the obsolete executable. NotFound is never retried.
    pub delete_attempts: u32,
    /// Cookies older than this are not acted on by signal. 0 disables the check.
    pub stale_cookie_secs: u64,
}

impl Default for HandoffSettings {
    fn default() -> Self {
        Self {
            exit_timeout_ms: 5000,
            poll_interval_ms: 100,
            delete_attempts: 3,
            stale_cookie_secs: 86_400,
        }
    }
}

impl HandoffSettings {
    pub fn exit_timeout(&self) -> Duration {
        Duration::from_millis(self.exit_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `None` when the staleness check is disabled.
    pub fn stale_after(&self) -> Option<Duration> {
        (self.stale_cookie_secs > 0).then(|| Duration::from_secs(self.stale_cookie_secs))
    }
}

/// Load settings from the given file, or defaults.
///
/// A missing file is the normal case. A file that fails to parse is logged
/// and ignored; configuration problems must never block startup.
pub fn load_config(path: &Path) -> HandoffConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse settings, using defaults"
                );
                HandoffConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HandoffConfig::default(),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read settings, using defaults"
            );
            HandoffConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = HandoffConfig::default();
        assert_eq!(cfg.handoff.exit_timeout_ms, 5000);
        assert_eq!(cfg.handoff.poll_interval_ms, 100);
        assert_eq!(cfg.handoff.delete_attempts, 3);
        assert_eq!(cfg.handoff.stale_after(), Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let cfg: HandoffConfig = toml::from_str("[handoff]\nexit_timeout_ms = 250\n").unwrap();
        assert_eq!(cfg.handoff.exit_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.handoff.poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.handoff.delete_attempts, 3);
    }

    #[test]
    fn test_zero_disables_stale_check() {
        let cfg: HandoffConfig = toml::from_str("[handoff]\nstale_cookie_secs = 0\n").unwrap();
        assert_eq!(cfg.handoff.stale_after(), None);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = load_config(&tmp.path().join("config.toml"));
        assert_eq!(cfg.handoff.delete_attempts, 3);
    }

    #[test]
    fn test_load_invalid_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[handoff\nnot toml").unwrap();
        let cfg = load_config(&path);
        assert_eq!(cfg.handoff.exit_timeout_ms, 5000);
    }

    #[test]
    fn test_load_valid_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[handoff]\ndelete_attempts = 7\npoll_interval_ms = 20\n").unwrap();
        let cfg = load_config(&path);
        assert_eq!(cfg.handoff.delete_attempts, 7);
        assert_eq!(cfg.handoff.poll_interval_ms, 20);
    }
}
