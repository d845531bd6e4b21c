//! The commit workflow and its cancellation handling.

pub mod acceptance;
pub mod cleanup;
pub mod interrupt;
pub mod orchestrator;

pub use acceptance::{
    AcceptanceMachine, AcceptanceState, Event, MAX_AI_ATTEMPTS, Resolution, ValidationEditMode,
};
pub use cleanup::{CleanupScope, RestorationStatus};
pub use interrupt::{
    INTERRUPTED_EXIT_CODE, WatchdogTrigger, exit_watchdog, spawn_interrupt_handler,
};
pub use orchestrator::{ExitOutcome, Orchestrator, RunOptions, RunReport};
