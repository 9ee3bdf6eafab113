//! Code-execution collaborator and scoring policy.
//!
//! The sandbox that runs learner code lives outside this crate. The launch
//! orchestrator only needs "run this source in this language and tell me
//! what happened", expressed by [`CodeExecutor`].

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub source_code: String,
    /// Language name as sent by the platform (`go`, `python`, ...).
    pub language: String,
}

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub compile_output: String,
    /// Runner-specific status, e.g. "Accepted".
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Wall time in seconds, as reported by the runner.
    #[serde(default)]
    pub time: Option<String>,
    /// Peak memory in kilobytes.
    #[serde(default)]
    pub memory: Option<u64>,
}

impl ExecutionResult {
    /// Produced output and nothing on stderr or from the compiler.
    pub fn is_clean(&self) -> bool {
        !self.stdout.is_empty() && self.stderr.is_empty() && self.compile_output.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("code runner unreachable: {0}")]
    Unreachable(String),

    #[error("code runner returned status {0}")]
    Rejected(u16),

    #[error("code runner response malformed: {0}")]
    Malformed(String),
}

impl ExecutionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "unreachable",
            Self::Rejected(_) => "rejected",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// Runs learner code. Awaited by the caller; implementations bound their own
/// time with the shared HTTP timeout.
pub trait CodeExecutor: Send + Sync {
    fn execute(
        &self,
        request: ExecutionRequest,
    ) -> BoxFuture<'_, Result<ExecutionResult, ExecutionError>>;
}

/// Turns an execution result into a score out of `max_score`.
pub trait ScoringPolicy: Send + Sync {
    fn score(&self, result: &ExecutionResult, max_score: f64) -> f64;
}

/// Full marks for a clean run, nothing otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanRunPolicy;

impl ScoringPolicy for CleanRunPolicy {
    fn score(&self, result: &ExecutionResult, max_score: f64) -> f64 {
        if result.is_clean() {
            max_score
        } else {
            0.0
        }
    }
}
