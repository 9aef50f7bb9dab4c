//! Concurrent fast path for batches that are certified read-only.
//!
//! Applicability is all-or-nothing: one unparseable or non-read-only call
//! routes the whole batch to the serial gate. Calls the broker certified as
//! read-only-safe cannot mutate the workspace, so this path skips the
//! probe, the breaker, and the approval machinery entirely.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::FutureExt;

use crate::approval::ApprovalBroker;
use crate::completion::RawToolCall;
use crate::context::ToolContext;
use crate::engine::gate::interpret_tool_value;
use crate::engine::Emitter;
use crate::error::TaskError;
use crate::events::TaskEvent;
use crate::tools::schema::ToolRegistry;
use crate::tools::scope::ToolScopeView;
use crate::types::{ExecResult, ToolInvocation};
use crate::utils::truncate_chars;

pub(crate) struct ParallelBatchRunner<'a> {
    pub registry: &'a dyn ToolRegistry,
    pub broker: &'a dyn ApprovalBroker,
    pub scope: &'a ToolScopeView,
    pub context: Arc<ToolContext>,
    pub call_timeout: Duration,
}

impl ParallelBatchRunner<'_> {
    /// Decide applicability for the whole batch. `None` routes everything
    /// serial; `Some` returns the parsed invocations in input order.
    pub fn plan(&self, calls: &[RawToolCall]) -> Option<Vec<ToolInvocation>> {
        if calls.len() < 2 {
            return None;
        }
        let mut invocations = Vec::with_capacity(calls.len());
        for raw in calls {
            let invocation = ToolInvocation::parse(raw).ok()?;
            if !self.scope.contains(&invocation.tool) {
                return None;
            }
            if !self.broker.is_read_only_safe(&invocation.tool) {
                return None;
            }
            invocations.push(invocation);
        }
        Some(invocations)
    }

    /// Execute the planned batch concurrently under a shared per-call
    /// timeout. Results come back in input order; a call that fails or
    /// raises becomes a failed result, never a propagated error.
    pub async fn run(
        &self,
        invocations: Vec<ToolInvocation>,
        emitter: &Emitter,
    ) -> Vec<(ToolInvocation, ExecResult)> {
        for invocation in &invocations {
            emitter.emit(TaskEvent::ToolStarted {
                run_id: emitter.run_id.clone(),
                call_id: invocation.call_id.clone(),
                tool: invocation.tool.clone(),
            });
        }

        let futures = invocations
            .iter()
            .map(|invocation| self.execute_one(invocation));
        let results = join_all(futures).await;

        invocations.into_iter().zip(results).collect()
    }

    async fn execute_one(&self, invocation: &ToolInvocation) -> ExecResult {
        let call = self
            .registry
            .call(&invocation.tool, &invocation.arguments, self.scope);
        let outcome = ToolContext::bind(
            self.context.clone(),
            tokio::time::timeout(self.call_timeout, AssertUnwindSafe(call).catch_unwind()),
        )
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

        let budget = self
            .registry
            .get(&invocation.tool)
            .map(|descriptor| descriptor.result_budget)
            .unwrap_or(crate::tools::schema::DEFAULT_RESULT_BUDGET);
        if let Some(truncated) = truncate_chars(&result.result, budget) {
            result.raw_result = Some(std::mem::replace(&mut result.result, truncated));
        }
        result
    }
}

pub(crate) fn panic_text(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        format!("tool panicked: {text}")
    } else if let Some(text) = panic.downcast_ref::<String>() {
        format!("tool panicked: {text}")
    } else {
        "tool panicked".to_string()
    }
}
