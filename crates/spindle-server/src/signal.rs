//! Exit triggers: OS signals and background errors.
//!
//! Background tasks (the engine's run loop, the deferred registry
//! registration) report through an [`ErrorReporter`]; the signal waiter
//! races those reports against OS signals through [`RunErrors`].
//!
//! | trigger                       | outcome  |
//! |-------------------------------|----------|
//! | `SIGINT`, `SIGHUP`            | graceful |
//! | `SIGTERM`                     | forced   |
//! | run loop finished with `Ok`   | graceful |
//! | any reported error            | forced   |

use std::future::pending;

use spindle_core::ServerError;
use tokio::sync::mpsc;

/// Sending half of the error collector. Never blocks.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    sender: mpsc::UnboundedSender<Result<(), ServerError>>,
}

impl ErrorReporter {
    /// Reports the outcome of a background task.
    ///
    /// Reports sent after the waiter has resolved are dropped.
    pub fn report(&self, outcome: Result<(), ServerError>) {
        let _ = self.sender.send(outcome);
    }
}

/// Receiving half of the error collector, handed to the signal waiter.
#[derive(Debug)]
pub struct RunErrors {
    receiver: mpsc::UnboundedReceiver<Result<(), ServerError>>,
}

impl RunErrors {
    /// Waits for the next reported outcome.
    ///
    /// Never completes once every reporter is gone and nothing is queued.
    pub async fn recv(&mut self) -> Result<(), ServerError> {
        match self.receiver.recv().await {
            Some(outcome) => outcome,
            None => pending().await,
        }
    }
}

/// Creates a connected reporter and collector.
#[must_use]
pub fn error_collector() -> (ErrorReporter, RunErrors) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ErrorReporter { sender }, RunErrors { receiver })
}

/// Default signal waiter.
///
/// Resolves `Ok(())` on interrupt or hangup (graceful) and
/// `Err(ServerError::Signal)` on terminate (forced). A reported outcome is
/// returned as is. Hangup is not listened for when the process ignores it.
/// A handler that cannot be installed is logged and never fires.
pub async fn wait_signal(errors: &mut RunErrors) -> Result<(), ServerError> {
    #[cfg(unix)]
    {
        unix::wait(errors).await
    }

    #[cfg(not(unix))]
    {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                pending::<()>().await;
            }
        };

        tokio::select! {
            () = ctrl_c => {
                tracing::info!(signal = "ctrl-c", "Received signal");
                Ok(())
            }
            outcome = errors.recv() => outcome,
        }
    }
}

/// Extracts the ignored-signal mask from a `/proc/<pid>/status` document.
#[must_use]
pub fn parse_sig_ign(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("SigIgn:"))
        .and_then(|mask| u64::from_str_radix(mask.trim(), 16).ok())
}

#[cfg(unix)]
mod unix {
    use std::future::pending;

    use spindle_core::ServerError;
    use tokio::signal::unix::{signal, Signal, SignalKind};

    use super::RunErrors;

    const SIGHUP: u32 = 1;

    pub(super) async fn wait(errors: &mut RunErrors) -> Result<(), ServerError> {
        let mut interrupt = install(SignalKind::interrupt(), "interrupt");
        let mut terminate = install(SignalKind::terminate(), "terminated");
        let mut hangup = if hangup_ignored() {
            tracing::debug!("SIGHUP is ignored by this process, not listening for it");
            None
        } else {
            install(SignalKind::hangup(), "hangup")
        };

        tokio::select! {
            () = recv(terminate.as_mut()) => Err(ServerError::Signal("terminated".to_string())),
            () = recv(interrupt.as_mut()) => {
                tracing::info!(signal = "interrupt", "Received signal");
                Ok(())
            }
            () = recv(hangup.as_mut()) => {
                tracing::info!(signal = "hangup", "Received signal");
                Ok(())
            }
            outcome = errors.recv() => outcome,
        }
    }

    fn install(kind: SignalKind, name: &'static str) -> Option<Signal> {
        match signal(kind) {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::error!(signal = name, error = %e, "failed to install signal handler");
                None
            }
        }
    }

    async fn recv(stream: Option<&mut Signal>) {
        if let Some(stream) = stream {
            if stream.recv().await.is_some() {
                return;
            }
        }
        pending().await
    }

    #[cfg(target_os = "linux")]
    fn hangup_ignored() -> bool {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|status| super::parse_sig_ign(&status))
            .is_some_and(|mask| mask & (1 << (SIGHUP - 1)) != 0)
    }

    #[cfg(not(target_os = "linux"))]
    fn hangup_ignored() -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_sig_ign() {
        let status = concat!(
            "Name:\tspindle\n",
            "SigBlk:\t0000000000000000\n",
            "SigIgn:\t0000000000001001\n",
            "SigCgt:\t0000000180004a02\n",
        );
        let mask = parse_sig_ign(status).unwrap();
        assert_eq!(mask, 0x1001);
        assert_ne!(mask & 1, 0, "SIGHUP bit");
    }

    #[test]
    fn test_parse_sig_ign_missing_or_malformed() {
        assert_eq!(parse_sig_ign("Name:\tspindle\n"), None);
        assert_eq!(parse_sig_ign("SigIgn:\tzz\n"), None);
    }

    #[tokio::test]
    async fn test_collector_delivers_in_order() {
        let (reporter, mut errors) = error_collector();
        reporter.report(Err(ServerError::AlreadyRunning));
        reporter.report(Ok(()));

        assert!(matches!(errors.recv().await, Err(ServerError::AlreadyRunning)));
        assert!(errors.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_collector_pends_without_reporters() {
        let (reporter, mut errors) = error_collector();
        drop(reporter);

        let waited = tokio::time::timeout(Duration::from_millis(20), errors.recv()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_report_after_collector_dropped() {
        let (reporter, errors) = error_collector();
        drop(errors);
        reporter.report(Err(ServerError::ShutdownTimeout));
    }

    #[tokio::test]
    async fn test_wait_signal_returns_reported_error() {
        let (reporter, mut errors) = error_collector();
        reporter.report(Err(ServerError::Transport("listener died".into())));

        let outcome = tokio::time::timeout(Duration::from_secs(1), wait_signal(&mut errors))
            .await
            .expect("waiter should resolve");
        assert!(matches!(outcome, Err(ServerError::Transport(_))));
    }
}
