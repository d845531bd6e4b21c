//! Restoration on every exit path that did not commit.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RestorationError;
use crate::staging::{StagingSnapshot, StagingStateManager};

/// What happened to the staging area when the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestorationStatus {
    /// The run committed, or never touched the staging area.
    NotNeeded,
    /// Nothing had been staged since the baseline.
    NothingToRestore,
    Restored { paths: Vec<String> },
    /// The deadline passed; the staging area may be inconsistent.
    TimedOut(Duration),
    Failed(String),
    /// The current staging area could not be read, so nothing was touched.
    Impossible(String),
}

impl RestorationStatus {
    /// Whether the user should be warned about the staging area.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            RestorationStatus::TimedOut(_)
                | RestorationStatus::Failed(_)
                | RestorationStatus::Impossible(_)
        )
    }
}

impl fmt::Display for RestorationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestorationStatus::NotNeeded => write!(f, "staging area unchanged"),
            RestorationStatus::NothingToRestore => write!(f, "nothing to restore"),
            RestorationStatus::Restored { paths } => {
                write!(f, "restored staging area ({} path(s) unstaged)", paths.len())
            }
            RestorationStatus::TimedOut(limit) => write!(
                f,
                "restoration timed out after {}s; the staging area may be inconsistent, check `git status`",
                limit.as_secs_f32()
            ),
            RestorationStatus::Failed(reason) => write!(
                f,
                "restoration failed: {reason}; check `git status`"
            ),
            RestorationStatus::Impossible(reason) => write!(f, "{reason}"),
        }
    }
}

/// Cleanup scope for one run.
///
/// Holds the baseline snapshot and a single `committed` flag. `finish` must
/// be called on every exit path once the baseline exists; it restores unless
/// the flag was set.
pub struct CleanupScope<'a> {
    manager: &'a StagingStateManager,
    baseline: StagingSnapshot,
    committed: AtomicBool,
    deadline: Duration,
}

impl<'a> CleanupScope<'a> {
    pub fn new(
        manager: &'a StagingStateManager,
        baseline: StagingSnapshot,
        deadline: Duration,
    ) -> Self {
        Self {
            manager,
            baseline,
            committed: AtomicBool::new(false),
            deadline,
        }
    }

    pub fn baseline(&self) -> &StagingSnapshot {
        &self.baseline
    }

    /// Record that the commit landed. From here on nothing is unstaged.
    pub fn mark_committed(&self) {
        self.committed.store(true, Ordering::SeqCst);
    }

    pub fn is_committed(&self) -> bool {
        self.committed.load(Ordering::SeqCst)
    }

    /// Restore the staging area to the baseline unless the run committed.
    ///
    /// Runs under its own token and deadline, independent of the workflow's
    /// (already cancelled) token. No second attempt is made after a timeout.
    pub async fn finish(self) -> RestorationStatus {
        if self.is_committed() {
            debug!("Run committed, skipping restoration");
            return RestorationStatus::NotNeeded;
        }

        let cleanup_token = CancellationToken::new();
        let restore = self.manager.restore_to(&self.baseline, &cleanup_token);

        match tokio::time::timeout(self.deadline, restore).await {
            Ok(Ok(report)) if report.unstaged.is_empty() => RestorationStatus::NothingToRestore,
            Ok(Ok(report)) => {
                info!("Unstaged {}", report.unstaged.join(", "));
                RestorationStatus::Restored {
                    paths: report.unstaged,
                }
            }
            Ok(Err(err @ RestorationError::Impossible(_))) => {
                warn!("{err}");
                RestorationStatus::Impossible(err.to_string())
            }
            Ok(Err(err)) if err.is_timeout() => {
                warn!("{err}");
                RestorationStatus::TimedOut(self.deadline)
            }
            Ok(Err(err)) => {
                warn!("Restoration failed: {err}");
                RestorationStatus::Failed(err.to_string())
            }
            Err(_) => {
                cleanup_token.cancel();
                let err = RestorationError::Timeout(self.deadline);
                warn!("{err}");
                RestorationStatus::TimedOut(self.deadline)
            }
        }
    }
}
