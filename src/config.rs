//! Per-run task configuration.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: usize = 3;

/// How risky tool calls are gated for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Confirm-required tools create a pending approval and stop the run.
    #[default]
    Default,
    /// Confirm-required tools execute and are audited instead of blocking.
    AcceptEdits,
    /// Only read-only-safe or explicitly allow-listed tools may execute.
    ReadOnly,
    /// Everything executes without blocking; auditing still applies.
    DontAsk,
}

/// Which meta-tools stay visible to the delegated run.
///
/// `Scoped` hides every meta-tool. `Full` keeps catalog listing but still
/// hides delegation, so a delegated run can never delegate again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityMode {
    #[default]
    Scoped,
    Full,
}

/// Immutable description of one delegated task, supplied once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model: Option<String>,
    /// When non-empty, the scope is restricted to these tool names.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Always removed from the scope, even when allow-listed.
    #[serde(default)]
    pub disallowed_tools: Vec<String>,
    #[serde(default)]
    pub permission_mode: PermissionMode,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: usize,
    #[serde(default)]
    pub capability_mode: CapabilityMode,
    /// Replaces the base system prompt template when set.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_max_consecutive_failures() -> usize {
    DEFAULT_MAX_CONSECUTIVE_FAILURES
}

impl TaskConfig {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            model: None,
            allowed_tools: Vec::new(),
            disallowed_tools: Vec::new(),
            permission_mode: PermissionMode::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            capability_mode: CapabilityMode::default(),
            system_prompt: None,
        }
    }
}
