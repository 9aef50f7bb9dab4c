//! Boundary to the approval/audit collaborator.
//!
//! The engine never persists approval state; it asks this broker how each
//! tool is tiered, creates at most one pending record per run, and routes
//! audited execution through `execute_and_audit`.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::TaskError;
use crate::tools::schema::ToolRegistry;
use crate::tools::scope::ToolScopeView;
use crate::types::ToolInvocation;
use crate::utils::now_rfc3339;

/// Everything the broker needs to persist one pending approval.
#[derive(Debug, Clone)]
pub struct PendingApprovalRequest {
    pub task: String,
    pub tool: String,
    pub arguments: Map<String, Value>,
    pub requested_at: String,
}

impl PendingApprovalRequest {
    pub fn new(task: &str, invocation: &ToolInvocation) -> Self {
        Self {
            task: task.to_string(),
            tool: invocation.tool.clone(),
            arguments: invocation.arguments.clone(),
            requested_at: now_rfc3339(),
        }
    }
}

#[async_trait]
pub trait ApprovalBroker: Send + Sync {
    /// Certified never to mutate workspace state. Gates the parallel fast
    /// path and read-only mode.
    fn is_read_only_safe(&self, tool: &str) -> bool;

    fn is_confirm_required(&self, tool: &str) -> bool;

    /// Executes without blocking but must leave an audit record.
    fn is_audit_only(&self, tool: &str) -> bool;

    /// Delegated out of process; audits itself, so the engine only probes.
    fn is_remote(&self, tool: &str) -> bool;

    /// Standing override that downgrades confirm-required to audited
    /// execution under the default permission mode.
    fn has_full_access(&self) -> bool {
        false
    }

    /// Persist a pending approval and return its id. Creation terminates the
    /// run; the engine enforces the at-most-one invariant.
    async fn create_pending(&self, request: PendingApprovalRequest) -> Result<String, TaskError>;

    /// Execute a call and record the audit entry for it.
    async fn execute_and_audit(
        &self,
        registry: &dyn ToolRegistry,
        scope: &ToolScopeView,
        invocation: &ToolInvocation,
    ) -> Result<Value, TaskError>;

    /// Text recorded as the result of the call that created the pending
    /// approval.
    fn pending_blocked_message(&self) -> String {
        "This operation requires approval. A pending approval record was created; \
         the task stops here until it is reviewed."
            .to_string()
    }
}
