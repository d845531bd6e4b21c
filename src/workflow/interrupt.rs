//! Ctrl-C handling and the bounded exit.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Exit code used for interrupted runs (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Why the watchdog ended the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogTrigger {
    DeadlineElapsed,
    SecondInterrupt,
}

/// Wait until `bound` elapses or `second_interrupt` resolves, whichever comes
/// first.
pub async fn exit_watchdog<S>(bound: Duration, second_interrupt: S) -> WatchdogTrigger
where
    S: Future<Output = ()>,
{
    tokio::select! {
        _ = tokio::time::sleep(bound) => WatchdogTrigger::DeadlineElapsed,
        _ = second_interrupt => WatchdogTrigger::SecondInterrupt,
    }
}

/// Cancel `cancel` on the first Ctrl-C, then force `exit` with code 130 once
/// `exit_bound` has passed or on a second Ctrl-C.
///
/// The workflow normally returns well before the watchdog fires; the
/// watchdog only matters when cleanup itself hangs.
pub fn spawn_interrupt_handler<X>(
    cancel: CancellationToken,
    exit_bound: Duration,
    exit: X,
) -> JoinHandle<()>
where
    X: FnOnce(i32) + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            return;
        }

        eprintln!();
        eprintln!("Interrupted, restoring staging area...");
        cancel.cancel();

        let second = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        match exit_watchdog(exit_bound, second).await {
            WatchdogTrigger::DeadlineElapsed => eprintln!(
                "Cleanup did not finish within {}s, exiting. Check `git status`.",
                exit_bound.as_secs()
            ),
            WatchdogTrigger::SecondInterrupt => {
                eprintln!("Interrupted again, exiting immediately. Check `git status`.")
            }
        }
        exit(INTERRUPTED_EXIT_CODE);
    })
}
