use thiserror::Error;

/// Unified error type for the subtask engine.
///
/// Every variant maps to one class of run disturbance. Most of them are
/// recorded as tool results and the run continues; only the terminal ones
/// (`PendingBlocked`, `BreakerTripped`, `IterationsExhausted`) end a run, and
/// even those surface through [`crate::types::TaskResult`], never as a panic.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// Tool name is not a member of the run's capability scope.
    #[error("tool '{tool}' is outside the task's tool scope")]
    ScopeViolation { tool: String },

    /// Tool-call arguments did not parse as a JSON object.
    #[error("malformed arguments for tool '{tool}': {message}")]
    MalformedArguments { tool: String, message: String },

    /// Tool body returned an error or raised.
    #[error("tool execution failed: {0}")]
    ToolFailed(String),

    /// A single tool call exceeded the per-call time limit.
    #[error("tool '{tool}' timed out after {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    /// A pending approval record was created; the run must stop.
    #[error("blocked pending approval '{id}'")]
    PendingBlocked { id: String },

    /// The same failure repeated often enough to be unproductive.
    #[error("circuit breaker tripped after {count} identical consecutive failures")]
    BreakerTripped { count: usize },

    /// The iteration budget ran out before the task produced a summary.
    #[error("iteration budget of {max} exhausted without completing the task")]
    IterationsExhausted { max: usize },

    /// The completion client failed to produce an assistant turn.
    #[error("completion request failed: {0}")]
    Completion(String),

    /// Anything else; carried into the result, never propagated raw.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using [`TaskError`].
pub type EngineResult<T> = Result<T, TaskError>;
