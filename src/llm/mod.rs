//! AI providers: CLI subprocesses, retry, fallback routing and the prompt.

pub mod generator;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod subprocess;

pub use generator::{AiGenerator, MessageGenerator};
pub use prompt::{build_commit_prompt, sanitize_diff};
pub use provider::{Completion, LlmProviderError, Provider, ProviderRouter, ProviderSelection};
pub use subprocess::{CliExecutor, CliRunner};
