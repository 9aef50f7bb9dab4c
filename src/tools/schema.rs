//! Typed tool descriptors and the registry trait.
//!
//! Dispatch goes through descriptors, not naming conventions: the engine
//! checks scope membership against the snapshot before every call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TaskError;
use crate::tools::scope::ToolScopeView;

/// Default per-tool result budget, in characters.
pub const DEFAULT_RESULT_BUDGET: usize = 8_000;

/// Classification controlling capability-mode exclusion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Ordinary business tool.
    #[default]
    Standard,
    /// Spawns further delegated tasks. Never exposed to a delegated run.
    Delegation,
    /// Lists the tool catalog. Hidden in scoped capability mode.
    Catalog,
}

/// One registered tool as the registry describes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters: Value,
    pub kind: ToolKind,
    /// Character budget applied to this tool's result text.
    pub result_budget: usize,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            kind: ToolKind::Standard,
            result_budget: DEFAULT_RESULT_BUDGET,
        }
    }

    pub fn with_kind(mut self, kind: ToolKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_result_budget(mut self, budget: usize) -> Self {
        self.result_budget = budget;
        self
    }
}

/// The schema projection handed to the completion client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDescriptor> for ToolSchema {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            parameters: descriptor.parameters.clone(),
        }
    }
}

/// The global tool set, owned outside this crate.
///
/// `call` may wrap a blocking body; implementations must offload it
/// (`tokio::task::spawn_blocking` or equivalent) so the run's event loop is
/// never blocked.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    fn names(&self) -> Vec<String>;

    fn get(&self, name: &str) -> Option<Arc<ToolDescriptor>>;

    /// Schemas for exactly the scope's members, in scope (sorted) order.
    fn schemas(&self, scope: &ToolScopeView) -> Vec<ToolSchema> {
        scope
            .iter()
            .filter_map(|name| self.get(name))
            .map(|descriptor| ToolSchema::from(descriptor.as_ref()))
            .collect()
    }

    async fn call(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        scope: &ToolScopeView,
    ) -> Result<Value, TaskError>;
}
