//! The run loop composing scope, gate, breaker, and batch execution into a
//! single terminating task run.

pub mod classifier;
mod gate;
mod parallel;
mod summary;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::approval::ApprovalBroker;
use crate::completion::{CompletionClient, CompletionRequest, RawToolCall, ToolChoice};
use crate::config::TaskConfig;
use crate::context::ToolContext;
use crate::error::TaskError;
use crate::events::{task_finished, task_started, EventSink, TaskEvent};
use crate::memory::ConversationMemory;
use crate::redirect::{PathRedirector, PATH_ARGUMENT_FIELDS};
use crate::tools::schema::ToolRegistry;
use crate::tools::scope::ToolScopeView;
use crate::types::{ExecResult, FileChange, TaskResult, TokenUsage, ToolInvocation};

use self::classifier::{BreakerVerdict, FailureClassifier};
use self::gate::{GateOutcome, PermissionGate};
use self::parallel::ParallelBatchRunner;

/// Default per-call execution time limit.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

const BREAKER_BACKFILL_TEXT: &str =
    "not executed: the failure circuit breaker tripped earlier in this batch";
const PENDING_BACKFILL_TEXT: &str =
    "not executed: a prior call in this batch is awaiting approval";

/// Optional hook applied to every executed result after truncation.
pub trait ResultEnricher: Send + Sync {
    fn enrich(&self, invocation: &ToolInvocation, result: ExecResult) -> ExecResult;
}

/// Explicit run state, instead of scattered boolean flags.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunPhase {
    Running,
    Completed { summary: String },
    AwaitingApproval { id: String },
    Tripped { count: usize },
    Exhausted,
    Faulted { error: String },
}

/// Mutable per-run bookkeeping, separate from the engine's collaborators.
struct RunState {
    memory: ConversationMemory,
    iterations: usize,
    tool_calls_count: usize,
    usage: TokenUsage,
    observed_files: BTreeSet<PathBuf>,
    file_changes: Vec<FileChange>,
}

impl RunState {
    fn new(memory: ConversationMemory) -> Self {
        Self {
            memory,
            iterations: 0,
            tool_calls_count: 0,
            usage: TokenUsage::default(),
            observed_files: BTreeSet::new(),
            file_changes: Vec::new(),
        }
    }

    fn record(&mut self, call_id: &str, result: &ExecResult) {
        self.memory.push_tool_result(call_id, result);
        for change in &result.file_changes {
            if !self.file_changes.contains(change) {
                self.observed_files.insert(change.path.clone());
                self.file_changes.push(change.clone());
            }
        }
    }

    fn observe_arguments(&mut self, arguments: &Map<String, Value>) {
        for field in PATH_ARGUMENT_FIELDS {
            if let Some(Value::String(path)) = arguments.get(field) {
                self.observed_files.insert(PathBuf::from(path));
            }
        }
    }
}

/// Executes exactly one delegated task per [`run`](ExecutionEngine::run)
/// call and always returns a terminal [`TaskResult`].
pub struct ExecutionEngine {
    completion: Arc<dyn CompletionClient>,
    registry: Arc<dyn ToolRegistry>,
    approvals: Arc<dyn ApprovalBroker>,
    events: Option<Arc<dyn EventSink>>,
    enricher: Option<Arc<dyn ResultEnricher>>,
    workspace_root: PathBuf,
    redirector: Option<Arc<PathRedirector>>,
    parent_context: Option<String>,
    workspace_overview: Option<String>,
    call_timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        registry: Arc<dyn ToolRegistry>,
        approvals: Arc<dyn ApprovalBroker>,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            completion,
            registry,
            approvals,
            events: None,
            enricher: None,
            workspace_root: workspace_root.into(),
            redirector: None,
            parent_context: None,
            workspace_overview: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn ResultEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_redirector(mut self, redirector: PathRedirector) -> Self {
        self.redirector = Some(Arc::new(redirector));
        self
    }

    pub fn with_parent_context(mut self, context: impl Into<String>) -> Self {
        self.parent_context = Some(context.into());
        self
    }

    pub fn with_workspace_overview(mut self, overview: impl Into<String>) -> Self {
        self.workspace_overview = Some(overview.into());
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Run one delegated task to a terminal result. Never panics and never
    /// returns an `Err`: every disturbance is folded into the result.
    pub async fn run(&self, config: &TaskConfig, prompt: &str) -> TaskResult {
        let run_id = Uuid::now_v7().to_string();
        let emitter = Emitter {
            sink: self.events.clone(),
            run_id: run_id.clone(),
        };
        emitter.emit(task_started(&run_id, &config.name));
        tracing::debug!(task = %config.name, %run_id, "task run started");

        let system_prompt = self.compose_system_prompt(config);
        let mut state = RunState::new(ConversationMemory::seeded(system_prompt, prompt));
        let phase = self.drive(config, &emitter, &mut state).await;
        let result = self.finish(config, phase, state, &emitter);

        emitter.emit(task_finished(&run_id, result.success));
        tracing::debug!(
            task = %config.name,
            %run_id,
            success = result.success,
            iterations = result.iterations,
            "task run finished"
        );
        result
    }

    async fn drive(
        &self,
        config: &TaskConfig,
        emitter: &Emitter,
        state: &mut RunState,
    ) -> RunPhase {
        let scope = ToolScopeView::for_run(self.registry.as_ref(), config);
        let schemas = self.registry.schemas(&scope);
        let mut classifier = FailureClassifier::new(config.max_consecutive_failures);

        let mut context = ToolContext::new(self.workspace_root.clone());
        if let Some(redirector) = &self.redirector {
            context = context.with_guard(redirector.clone());
        }
        let context = Arc::new(context);

        for iteration in 1..=config.max_iterations {
            state.iterations = iteration;
            emitter.emit(TaskEvent::IterationStarted {
                run_id: emitter.run_id.clone(),
                iteration,
            });

            let request = CompletionRequest {
                model: config.model.as_deref(),
                messages: state.memory.messages(),
                tools: &schemas,
                tool_choice: ToolChoice::Auto,
            };
            let turn = match self.completion.create(request).await {
                Ok(turn) => turn,
                Err(error) => {
                    tracing::warn!(task = %config.name, %error, "completion request failed");
                    return RunPhase::Faulted {
                        error: error.to_string(),
                    };
                }
            };
            state.usage.absorb(turn.usage);

            if turn.tool_calls.is_empty() {
                return RunPhase::Completed {
                    summary: turn.content.unwrap_or_default(),
                };
            }
            state.memory.push_assistant_turn(&turn);

            // Fast path: the whole batch is certified read-only and parses.
            let runner = ParallelBatchRunner {
                registry: self.registry.as_ref(),
                broker: self.approvals.as_ref(),
                scope: &scope,
                context: context.clone(),
                call_timeout: self.call_timeout,
            };
            if let Some(invocations) = runner.plan(&turn.tool_calls) {
                tracing::debug!(batch = invocations.len(), "dispatching batch concurrently");
                for invocation in &invocations {
                    state.observe_arguments(&invocation.arguments);
                }
                let executed = runner.run(invocations, emitter).await;
                for (invocation, result) in &executed {
                    state.tool_calls_count += 1;
                    state.record(&invocation.call_id, result);
                    emitter.emit(TaskEvent::ToolFinished {
                        run_id: emitter.run_id.clone(),
                        call_id: invocation.call_id.clone(),
                        tool: invocation.tool.clone(),
                        success: result.success,
                    });
                }
                continue;
            }

            let phase = self
                .dispatch_serial(config, &scope, &context, &mut classifier, emitter, state, &turn.tool_calls)
                .await;
            if phase != RunPhase::Running {
                return phase;
            }
        }

        RunPhase::Exhausted
    }

    /// Serial permission-gated dispatch of one batch. Returns `Running` when
    /// the loop should continue to the next completion.
    #[allow(clippy::too_many_arguments)]
    async fn dispatch_serial(
        &self,
        config: &TaskConfig,
        scope: &ToolScopeView,
        context: &Arc<ToolContext>,
        classifier: &mut FailureClassifier,
        emitter: &Emitter,
        state: &mut RunState,
        calls: &[RawToolCall],
    ) -> RunPhase {
        let gate = PermissionGate {
            registry: self.registry.as_ref(),
            broker: self.approvals.as_ref(),
            scope,
            config,
            workspace_root: &self.workspace_root,
            context: context.clone(),
            redirector: self.redirector.as_deref(),
            enricher: self.enricher.as_deref(),
            call_timeout: self.call_timeout,
        };

        let mut phase = RunPhase::Running;
        for raw in calls {
            state.tool_calls_count += 1;

            // Once the run is stopping, the rest of the batch is backfilled
            // so every call still has a matching result entry.
            if phase != RunPhase::Running {
                let text = if matches!(phase, RunPhase::AwaitingApproval { .. }) {
                    PENDING_BACKFILL_TEXT
                } else {
                    BREAKER_BACKFILL_TEXT
                };
                let mut backfill = ExecResult::failed(text);
                backfill.result = text.to_string();
                state.record(&raw.id, &backfill);
                continue;
            }

            emitter.emit(TaskEvent::ToolStarted {
                run_id: emitter.run_id.clone(),
                call_id: raw.id.clone(),
                tool: raw.name.clone(),
            });

            let (result, arguments) = match ToolInvocation::parse(raw) {
                Err(error) => (ExecResult::failed(&error), Map::new()),
                Ok(mut invocation) => {
                    state.observe_arguments(&invocation.arguments);
                    match gate.dispatch(&config.name, &mut invocation).await {
                        GateOutcome::Executed(result) => (result, invocation.arguments),
                        GateOutcome::PendingCreated { approval_id, result } => {
                            phase = RunPhase::AwaitingApproval { id: approval_id };
                            (result, invocation.arguments)
                        }
                    }
                }
            };

            state.record(&raw.id, &result);
            emitter.emit(TaskEvent::ToolFinished {
                run_id: emitter.run_id.clone(),
                call_id: raw.id.clone(),
                tool: raw.name.clone(),
                success: result.success,
            });

            if result.success {
                classifier.record_success();
            } else if phase == RunPhase::Running {
                let error = result.error.as_deref().unwrap_or("unknown failure");
                match classifier.record_failure(&raw.name, &arguments, error) {
                    BreakerVerdict::Continue => {}
                    BreakerVerdict::Warn(message) => {
                        tracing::debug!(tool = %raw.name, "soft failure warning injected");
                        state.memory.push_user(message);
                    }
                    BreakerVerdict::Tripped => {
                        phase = RunPhase::Tripped {
                            count: classifier.exact_streak(),
                        };
                    }
                }
            }
        }
        phase
    }

    fn finish(
        &self,
        config: &TaskConfig,
        phase: RunPhase,
        state: RunState,
        emitter: &Emitter,
    ) -> TaskResult {
        let (success, mut summary, error, pending_approval_id) = match phase {
            RunPhase::Completed { summary } => (true, summary, None, None),
            RunPhase::AwaitingApproval { id } => (
                false,
                self.approvals.pending_blocked_message(),
                Some(TaskError::PendingBlocked { id: id.clone() }.to_string()),
                Some(id),
            ),
            RunPhase::Tripped { count } => (
                false,
                String::new(),
                Some(TaskError::BreakerTripped { count }.to_string()),
                None,
            ),
            RunPhase::Exhausted => (
                false,
                String::new(),
                Some(
                    TaskError::IterationsExhausted {
                        max: config.max_iterations,
                    }
                    .to_string(),
                ),
                None,
            ),
            RunPhase::Faulted { error } => (false, String::new(), Some(error), None),
            RunPhase::Running => (
                false,
                String::new(),
                Some(TaskError::Internal("run ended while still running".to_string()).to_string()),
                None,
            ),
        };

        let observed_files: Vec<PathBuf> = state.observed_files.into_iter().collect();
        if !success {
            if let Some(section) = summary::partial_progress_section(
                &state.memory.assistant_texts(),
                &observed_files,
                &state.file_changes,
            ) {
                if !summary.is_empty() {
                    summary.push_str("\n\n");
                }
                summary.push_str(&section);
            }
        }

        emitter.emit(TaskEvent::SummaryReady {
            run_id: emitter.run_id.clone(),
            summary: summary.clone(),
        });

        TaskResult {
            success,
            summary,
            iterations: state.iterations,
            tool_calls_count: state.tool_calls_count,
            usage: state.usage,
            error,
            pending_approval_id,
            file_changes: state.file_changes,
            observed_files,
        }
    }

    fn compose_system_prompt(&self, config: &TaskConfig) -> String {
        let mut prompt = match &config.system_prompt {
            Some(custom) => custom.clone(),
            None => format!(
                "You are a focused assistant executing one delegated subtask.\n\
                 Task: {}\n\
                 Goal: {}\n\
                 Use only the tools provided. Work step by step. When the task \
                 is done, reply with a plain-text summary of the outcome and \
                 make no further tool calls.",
                config.name, config.description
            ),
        };
        if let Some(parent) = &self.parent_context {
            prompt.push_str("\n\nContext from the delegating task:\n");
            prompt.push_str(parent);
        }
        if let Some(overview) = &self.workspace_overview {
            prompt.push_str("\n\nWorkspace:\n");
            prompt.push_str(overview);
        }
        prompt
    }
}

/// Event delivery wrapper: failures are logged and never abort the run.
pub(crate) struct Emitter {
    sink: Option<Arc<dyn EventSink>>,
    pub(crate) run_id: String,
}

impl Emitter {
    pub(crate) fn emit(&self, event: TaskEvent) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(error) = sink.deliver(&event) {
            tracing::warn!(%error, "event sink delivery failed");
        }
    }
}
