//! Serial permission-gated dispatch.
//!
//! Branch order per call: read-only scope check, pending-approval creation,
//! audited execution, direct execution. Every executing branch funnels
//! through one pipeline: probe before, bind context, execute under timeout,
//! detect structured errors, probe after and diff, truncate, enrich.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Value;

use crate::approval::{ApprovalBroker, PendingApprovalRequest};
use crate::config::{PermissionMode, TaskConfig};
use crate::context::ToolContext;
use crate::engine::parallel::panic_text;
use crate::engine::ResultEnricher;
use crate::error::TaskError;
use crate::redirect::PathRedirector;
use crate::tools::schema::{ToolRegistry, DEFAULT_RESULT_BUDGET};
use crate::tools::scope::ToolScopeView;
use crate::types::{ExecResult, FileChange, ToolInvocation};
use crate::utils::truncate_chars;
use crate::workspace::probe;
use crate::workspace::probe::WorkspaceIndex;

pub(crate) struct PermissionGate<'a> {
    pub registry: &'a dyn ToolRegistry,
    pub broker: &'a dyn ApprovalBroker,
    pub scope: &'a ToolScopeView,
    pub config: &'a TaskConfig,
    pub workspace_root: &'a Path,
    pub context: Arc<ToolContext>,
    pub redirector: Option<&'a PathRedirector>,
    pub enricher: Option<&'a dyn ResultEnricher>,
    pub call_timeout: Duration,
}

pub(crate) enum GateOutcome {
    Executed(ExecResult),
    /// A pending approval was created; the run stops after this call.
    PendingCreated {
        approval_id: String,
        result: ExecResult,
    },
}

enum ExecutionRoute {
    Direct,
    Audited,
}

impl PermissionGate<'_> {
    pub async fn dispatch(&self, task: &str, invocation: &mut ToolInvocation) -> GateOutcome {
        if !self.scope.contains(&invocation.tool) {
            return GateOutcome::Executed(ExecResult::failed(TaskError::ScopeViolation {
                tool: invocation.tool.clone(),
            }));
        }

        // Protected inputs are redirected to their working copies before any
        // branch looks at the arguments.
        let mut warnings = Vec::new();
        if let Some(redirector) = self.redirector {
            warnings = redirector.apply(&mut invocation.arguments);
        }

        let tool = invocation.tool.as_str();
        let read_only_safe = self.broker.is_read_only_safe(tool);
        let confirm_required = self.broker.is_confirm_required(tool);
        let remote = self.broker.is_remote(tool);

        // 1. Read-only mode: execute only certified-safe or allow-listed
        //    tools; everything else is rejected outright.
        if self.config.permission_mode == PermissionMode::ReadOnly
            && !read_only_safe
            && !self.config.allowed_tools.contains(&invocation.tool)
        {
            return GateOutcome::Executed(ExecResult::failed(format!(
                "tool '{tool}' is not allowed in read-only mode"
            )));
        }

        // 2. Confirm-required under the default mode blocks on approval
        //    unless the broker grants standing full access.
        if confirm_required
            && self.config.permission_mode == PermissionMode::Default
            && !self.broker.has_full_access()
        {
            let request = PendingApprovalRequest::new(task, invocation);
            return match self.broker.create_pending(request).await {
                Ok(approval_id) => {
                    let mut result = ExecResult::failed(TaskError::PendingBlocked {
                        id: approval_id.clone(),
                    });
                    result.result = self.broker.pending_blocked_message();
                    result.pending_approval_id = Some(approval_id.clone());
                    GateOutcome::PendingCreated {
                        approval_id,
                        result,
                    }
                }
                Err(error) => GateOutcome::Executed(ExecResult::failed(format!(
                    "failed to create pending approval: {error}"
                ))),
            };
        }

        // 3. Audited execution for confirm-required tools that may proceed
        //    and for audit-only tools. Remote tools audit themselves out of
        //    process, so they take the probed direct route instead.
        let route = if !remote && (confirm_required || self.broker.is_audit_only(tool)) {
            ExecutionRoute::Audited
        } else {
            // 4. Everything else, remote tools included.
            ExecutionRoute::Direct
        };

        let mut result = self.run_pipeline(invocation, route).await;
        for warning in warnings {
            result.result.push_str("\n[note] ");
            result.result.push_str(&warning);
        }
        GateOutcome::Executed(result)
    }

    /// The shared execution pipeline every executing branch funnels through.
    async fn run_pipeline(&self, invocation: &ToolInvocation, route: ExecutionRoute) -> ExecResult {
        let (before, before_partial) = probe::snapshot(self.workspace_root);
        if before_partial {
            tracing::warn!(tool = %invocation.tool, "workspace probe is partial; diff may miss effects");
        }

        let outcome = ToolContext::bind(self.context.clone(), async {
            let call = async {
                match route {
                    ExecutionRoute::Direct => {
                        self.registry
                            .call(&invocation.tool, &invocation.arguments, self.scope)
                            .await
                    }
                    ExecutionRoute::Audited => {
                        self.broker
                            .execute_and_audit(self.registry, self.scope, invocation)
                            .await
                    }
                }
            };
            tokio::time::timeout(self.call_timeout, AssertUnwindSafe(call).catch_unwind()).await
        })
        .await;

        let mut result = match outcome {
            Err(_) => ExecResult::failed(TaskError::ToolTimeout {
                tool: invocation.tool.clone(),
                secs: self.call_timeout.as_secs(),
            }),
            Ok(Err(panic)) => ExecResult::failed(TaskError::ToolFailed(panic_text(panic))),
            Ok(Ok(Err(error))) => ExecResult::failed(error),
            Ok(Ok(Ok(value))) => interpret_tool_value(value),
        };

        // Side-effect detection even when the tool reported nothing.
        let (after, _) = probe::snapshot(self.workspace_root);
        for change in WorkspaceIndex::diff(&before, &after) {
            if !result.file_changes.contains(&change) {
                result.file_changes.push(change);
            }
        }

        let budget = self
            .registry
            .get(&invocation.tool)
            .map(|descriptor| descriptor.result_budget)
            .unwrap_or(DEFAULT_RESULT_BUDGET);
        if let Some(truncated) = truncate_chars(&result.result, budget) {
            result.raw_result = Some(std::mem::replace(&mut result.result, truncated));
        }

        if let Some(enricher) = self.enricher {
            result = enricher.enrich(invocation, result);
        }
        result
    }
}

/// Interpret a tool's JSON result: a top-level `"error"` key marks a
/// structured failure; a `"file_changes"` array carries reported effects.
pub(crate) fn interpret_tool_value(value: Value) -> ExecResult {
    let file_changes = value
        .get("file_changes")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value::<FileChange>(entry.clone()).ok())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if let Some(error) = value.get("error") {
        let message = match error {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let mut result = ExecResult::failed(message);
        result.file_changes = file_changes;
        return result;
    }

    let text = match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => serde_json::to_string(&other).unwrap_or_default(),
    };
    let mut result = ExecResult::ok(text);
    result.file_changes = file_changes;
    result
}
