//! Staging state management: snapshots, restoration plans and restoring.

pub mod manager;
pub mod snapshot;

pub use manager::{RestorationReport, StagingStateManager};
pub use snapshot::{RestorationPlan, StagingSnapshot, plan_restoration};
