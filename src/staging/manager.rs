//! Capturing staging snapshots and executing restoration plans.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, RestorationError};
use crate::git::RepositoryGateway;

use super::snapshot::{RestorationPlan, StagingSnapshot};

/// What a restoration actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestorationReport {
    /// Paths reset to their HEAD state.
    pub unstaged: Vec<String>,
    /// Planned paths skipped because they were no longer staged.
    pub dropped: Vec<String>,
}

/// Captures snapshots of the staging area and puts it back afterwards.
pub struct StagingStateManager {
    gateway: Arc<dyn RepositoryGateway>,
}

impl StagingStateManager {
    pub fn new(gateway: Arc<dyn RepositoryGateway>) -> Self {
        Self { gateway }
    }

    /// Snapshot the currently staged paths. Gateway errors propagate as is.
    pub async fn capture(&self) -> Result<StagingSnapshot, GatewayError> {
        let paths = self.gateway.capture_staged_paths().await?;
        Ok(StagingSnapshot::new(paths, self.gateway.repo_root()))
    }

    pub fn plan_restoration(
        &self,
        baseline: &StagingSnapshot,
        observed: &StagingSnapshot,
    ) -> RestorationPlan {
        RestorationPlan::between(baseline.clone(), observed.clone())
    }

    /// Capture the current state and plan the way back to `baseline`.
    ///
    /// If the current state cannot be read there is no plan: guessing which
    /// paths to unstage could unstage the user's own work.
    pub async fn plan_against(
        &self,
        baseline: &StagingSnapshot,
    ) -> Result<RestorationPlan, RestorationError> {
        let observed = self
            .capture()
            .await
            .map_err(RestorationError::Impossible)?;
        Ok(self.plan_restoration(baseline, &observed))
    }

    /// Unstage the plan's paths, stopping early if `cancel` fires.
    ///
    /// Re-reads the staging area first and skips planned paths that are no
    /// longer staged rather than failing the whole restoration.
    pub async fn restore(
        &self,
        plan: &RestorationPlan,
        cancel: &CancellationToken,
    ) -> Result<RestorationReport, RestorationError> {
        if plan.is_empty() {
            debug!("Restoration plan is empty, nothing to unstage");
            return Ok(RestorationReport::default());
        }

        let current = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RestorationError::Cancelled),
            current = self.gateway.capture_staged_paths() => {
                current.map_err(RestorationError::Impossible)?
            }
        };

        let (to_unstage, dropped) = plan.partition_current(&current);
        if !dropped.is_empty() {
            warn!(
                "Skipping {} path(s) no longer staged: {}",
                dropped.len(),
                dropped.join(", ")
            );
        }
        if to_unstage.is_empty() {
            return Ok(RestorationReport {
                unstaged: Vec::new(),
                dropped,
            });
        }

        debug!("Unstaging {} path(s): {}", to_unstage.len(), to_unstage.join(", "));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RestorationError::Cancelled),
            result = self.gateway.unstage(&to_unstage) => {
                result.map_err(RestorationError::Gateway)?
            }
        }

        info!("Restored staging area ({} path(s) unstaged)", to_unstage.len());
        Ok(RestorationReport {
            unstaged: to_unstage,
            dropped,
        })
    }

    /// Plan against `baseline` and execute the plan.
    pub async fn restore_to(
        &self,
        baseline: &StagingSnapshot,
        cancel: &CancellationToken,
    ) -> Result<RestorationReport, RestorationError> {
        let plan = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RestorationError::Cancelled),
            plan = self.plan_against(baseline) => plan?,
        };
        self.restore(&plan, cancel).await
    }
}
