//! Runtime configuration read from the environment.
//!
//! Flags come from the CLI; the timeouts below can be overridden with
//! environment variables so slow machines or providers can be accommodated
//! without a config file.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Default timeout for Claude subprocess execution (5 minutes).
pub const DEFAULT_CLAUDE_TIMEOUT_SECS: u64 = 300;

/// Default timeout for Codex subprocess execution (5 minutes).
pub const DEFAULT_CODEX_TIMEOUT_SECS: u64 = 300;

/// Time allowed for restoring the staging area once an exit starts.
pub const DEFAULT_RESTORE_TIMEOUT_SECS: u64 = 3;

/// Hard bound between an interrupt and process exit.
pub const DEFAULT_EXIT_TIMEOUT_SECS: u64 = 5;

pub const CLAUDE_TIMEOUT_ENV_VAR: &str = "GITSCRIBE_CLAUDE_TIMEOUT";
pub const CODEX_TIMEOUT_ENV_VAR: &str = "GITSCRIBE_CODEX_TIMEOUT";
pub const RESTORE_TIMEOUT_ENV_VAR: &str = "GITSCRIBE_RESTORE_TIMEOUT";
pub const EXIT_TIMEOUT_ENV_VAR: &str = "GITSCRIBE_EXIT_TIMEOUT";

/// Read a duration in whole seconds from `var`, falling back to `default_secs`.
///
/// Logs a warning if the variable is set but contains an invalid value
/// (non-numeric or negative). An empty value is treated as unset.
pub fn timeout_from_env(var: &str, default_secs: u64) -> Duration {
    match env::var(var) {
        Ok(v) if !v.is_empty() => match v.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!(
                    "Invalid {} value '{}', using default {}s",
                    var, v, default_secs
                );
                Duration::from_secs(default_secs)
            }
        },
        _ => Duration::from_secs(default_secs),
    }
}

/// Deadlines governing the exit path after an interrupt or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    /// Bound on the whole cleanup scope (capture, plan, unstage).
    pub restore: Duration,
    /// Bound from the interrupt instant to process exit.
    pub exit: Duration,
}

impl Deadlines {
    pub fn from_env() -> Self {
        Self {
            restore: timeout_from_env(RESTORE_TIMEOUT_ENV_VAR, DEFAULT_RESTORE_TIMEOUT_SECS),
            exit: timeout_from_env(EXIT_TIMEOUT_ENV_VAR, DEFAULT_EXIT_TIMEOUT_SECS),
        }
    }
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            restore: Duration::from_secs(DEFAULT_RESTORE_TIMEOUT_SECS),
            exit: Duration::from_secs(DEFAULT_EXIT_TIMEOUT_SECS),
        }
    }
}
