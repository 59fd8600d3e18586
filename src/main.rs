mod app_dirs;
mod artifact;
mod config;
mod cookie;
mod error;
mod process;
mod resolver;
mod shutdown;
mod status;

use app_dirs::AppDirs;
use artifact::CurrentExe;
use clap::{Parser, Subcommand};
use error::HandoffError;
use process::SystemProcesses;
use resolver::HandoffResolver;
use std::path::PathBuf;
use std::process::ExitCode;

/// Self-update handoff: at startup, detect that this executable replaced an
/// older instance, stop that instance and remove its obsolete binary.
#[derive(Parser, Debug)]
#[command(name = "handoff", version, about)]
pub struct Cli {
    /// Configuration directory (default: $HANDOFF_CONFIG_DIR, then the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Extra logging (cookie and process checks)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Complete any pending handoff, then run until SIGINT/SIGTERM (default)
    Run,
    /// Complete any pending handoff and exit
    Resolve,
    /// Leave a handoff cookie naming a process
    Mark {
        /// PID to record (default: this process)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i32::MAX as i64))]
        pid: Option<u32>,
    },
    /// Show the pending handoff, if any
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "handoff=debug"
    } else {
        "handoff=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let dirs = AppDirs::discover(cli.config_dir.as_deref());
    tracing::debug!(?cli, config_dir = %dirs.root().display(), "parsed CLI arguments");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&dirs).await,
        Command::Resolve => match resolve_off_runtime(&dirs).await {
            Some(outcome) => {
                println!("{outcome}");
                ExitCode::SUCCESS
            }
            None => ExitCode::FAILURE,
        },
        Command::Mark { pid } => exit_code(mark(&dirs, pid)),
        Command::Status { json } => exit_code(show_status(&dirs, json)),
    }
}

fn exit_code<E: std::fmt::Display>(result: Result<(), E>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn resolve(dirs: &AppDirs) -> resolver::HandoffOutcome {
    let cfg = config::load_config(&dirs.settings());
    HandoffResolver::new(dirs, cfg.handoff).resolve()
}

/// Run the resolver on the blocking pool: it sleeps while waiting for the old
/// process to exit. `None` if the resolver task panicked.
async fn resolve_off_runtime(dirs: &AppDirs) -> Option<resolver::HandoffOutcome> {
    let dirs = dirs.clone();
    match tokio::task::spawn_blocking(move || resolve(&dirs)).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!(error = %e, "self-update handoff task failed");
            None
        }
    }
}

async fn run(dirs: &AppDirs) -> ExitCode {
    // Before anything else starts: the previous instance may still hold resources.
    resolve_off_runtime(dirs).await;

    tracing::info!(pid = std::process::id(), "handoff running");
    match shutdown::wait_for_shutdown().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "failed to install signal handlers");
            ExitCode::FAILURE
        }
    }
}

fn mark(dirs: &AppDirs, pid: Option<u32>) -> Result<(), HandoffError> {
    match pid {
        Some(pid) => cookie::HandoffCookie::new(dirs).write(pid),
        None => {
            cookie::leave_cookie(dirs);
            Ok(())
        }
    }
}

fn show_status(dirs: &AppDirs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let pending = status::inspect(dirs, &SystemProcesses, &CurrentExe)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }
    match pending {
        Some(pending) => print!("{}", pending.render()),
        None => println!("no handoff pending"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::parse_from(["handoff"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "handoff",
            "status",
            "--json",
            "--config-dir",
            "/etc/app",
            "-v",
        ]);
        assert_eq!(cli.config_dir, Some(PathBuf::from("/etc/app")));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Command::Status { json: true })));
    }

    #[test]
    fn test_mark_with_pid() {
        let cli = Cli::parse_from(["handoff", "mark", "--pid", "4242"]);
        assert!(matches!(cli.command, Some(Command::Mark { pid: Some(4242) })));
    }

    #[test]
    fn test_mark_rejects_non_numeric_pid() {
        assert!(Cli::try_parse_from(["handoff", "mark", "--pid", "abc"]).is_err());
    }

    #[test]
    fn test_mark_rejects_pids_outside_cookie_range() {
        assert!(Cli::try_parse_from(["handoff", "mark", "--pid", "0"]).is_err());
        assert!(Cli::try_parse_from(["handoff", "mark", "--pid", "2147483648"]).is_err());
        assert!(Cli::try_parse_from(["handoff", "mark", "--pid", "2147483647"]).is_ok());
    }

    #[test]
    fn test_mark_fn_refuses_zero_pid() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = AppDirs::new(tmp.path());
        assert!(mark(&dirs, Some(0)).is_err());
        assert!(!dirs.cookie().exists());
    }

    #[test]
    fn test_mark_then_resolve_clears_cookie() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = AppDirs::new(tmp.path());
        // i32::MAX is above pid_max, so nothing real gets signalled.
        mark(&dirs, Some(i32::MAX as u32)).unwrap();
        assert!(dirs.cookie().exists());

        let outcome = resolve(&dirs);

        assert!(matches!(outcome, resolver::HandoffOutcome::Completed(_)));
        assert!(!dirs.cookie().exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_resolve_off_runtime_keeps_runtime_responsive() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = AppDirs::new(tmp.path());
        // Live child, so the resolver waits out its exit timeout.
        let mut child = std::process::Command::new("sh")
            .args(["-c", "trap '' INT; sleep 30"])
            .spawn()
            .unwrap();
        std::fs::write(
            dirs.settings(),
            "[handoff]\nexit_timeout_ms = 400\npoll_interval_ms = 20\nstale_cookie_secs = 0\n",
        )
        .unwrap();
        mark(&dirs, Some(child.id())).unwrap();

        let resolving = tokio::spawn({
            let dirs = dirs.clone();
            async move { resolve_off_runtime(&dirs).await }
        });
        // On a current-thread runtime this only runs if the resolver is off-thread.
        let ticked = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            tokio::time::sleep(std::time::Duration::from_millis(10)),
        )
        .await;
        let ticked_while_resolving = ticked.is_ok() && !resolving.is_finished();
        let outcome = resolving.await.unwrap();

        child.kill().unwrap();
        child.wait().unwrap();
        assert!(ticked_while_resolving);
        assert!(matches!(outcome, Some(resolver::HandoffOutcome::Completed(_))));
        assert!(!dirs.cookie().exists());
    }

    #[test]
    fn test_status_without_cookie() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = AppDirs::new(tmp.path());
        show_status(&dirs, false).unwrap();
        show_status(&dirs, true).unwrap();
    }
}
