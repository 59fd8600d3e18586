use std::path::{Path, PathBuf};

/// Reserved name of the handoff cookie inside the configuration directory.
pub const COOKIE_FILE_NAME: &str = "stash_update.pid";

/// Name of the settings file inside the configuration directory.
pub const SETTINGS_FILE_NAME: &str = "config.toml";

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "HANDOFF_CONFIG_DIR";

/// Manages the configuration directory layout.
///
/// Everything the handoff touches lives under a single configuration directory.
/// This struct provides accessors for each well-known path and is passed
/// explicitly to the cookie writer, the resolver and the status reader.
#[derive(Debug, Clone)]
pub struct AppDirs {
    root: PathBuf,
}

impl AppDirs {
    /// Create an AppDirs referencing the given configuration directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the configuration directory for this run.
    ///
    /// Precedence: explicit override (CLI flag), `HANDOFF_CONFIG_DIR`,
    /// the platform config directory, then a `/tmp` fallback.
    pub fn discover(cli_override: Option<&Path>) -> Self {
        let env_override = std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from);
        Self::new(resolve_root(
            cli_override,
            env_override.as_deref(),
            dirs::config_dir(),
        ))
    }

    /// The configuration directory itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the handoff cookie (`<root>/stash_update.pid`).
    pub fn cookie(&self) -> PathBuf {
        self.root.join(COOKIE_FILE_NAME)
    }

    /// Path to the settings file (`<root>/config.toml`).
    pub fn settings(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE_NAME)
    }
}

fn resolve_root(
    cli_override: Option<&Path>,
    env_override: Option<&Path>,
    platform_config: Option<PathBuf>,
) -> PathBuf {
    if let Some(dir) = cli_override {
        return dir.to_path_buf();
    }
    if let Some(dir) = env_override.filter(|d| !d.as_os_str().is_empty()) {
        return dir.to_path_buf();
    }
    platform_config
        .map(|d| d.join("handoff"))
        .unwrap_or_else(|| PathBuf::from("/tmp/handoff-config"))
}
