/// Main-loop blocking until the application is asked to stop.
///
/// SIGINT is what a successor sends after a self-update; SIGTERM is the usual
/// service-manager stop. Either one ends the wait.
use tokio::signal::unix::{signal, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Block until SIGINT or SIGTERM arrives.
pub async fn wait_for_shutdown() -> std::io::Result<ShutdownSignal> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let received = tokio::select! {
        _ = interrupt.recv() => ShutdownSignal::Interrupt,
        _ = terminate.recv() => ShutdownSignal::Terminate,
    };
    tracing::info!(signal = %received, "shutdown requested");
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use std::time::Duration;

    #[test]
    fn test_display() {
        assert_eq!(ShutdownSignal::Interrupt.to_string(), "SIGINT");
        assert_eq!(ShutdownSignal::Terminate.to_string(), "SIGTERM");
    }

    #[tokio::test]
    async fn test_terminate_ends_wait() {
        let waiter = tokio::spawn(wait_for_shutdown());
        // Give the handlers time to install before raising.
        tokio::time::sleep(Duration::from_millis(100)).await;
        kill(Pid::this(), Signal::SIGTERM).unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(received, ShutdownSignal::Terminate);
    }
}
