pub mod approval;
pub mod completion;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod memory;
pub mod redirect;
pub mod tools;
pub mod types;
pub mod utils;
pub mod workspace;

pub use crate::approval::{ApprovalBroker, PendingApprovalRequest};
pub use crate::completion::{AssistantTurn, ChatMessage, CompletionClient, RawToolCall};
pub use crate::config::{CapabilityMode, PermissionMode, TaskConfig};
pub use crate::context::ToolContext;
pub use crate::engine::{ExecutionEngine, ResultEnricher, DEFAULT_CALL_TIMEOUT};
pub use crate::error::{EngineResult, TaskError};
pub use crate::events::{EventBus, EventSink, TaskEvent};
pub use crate::memory::ConversationMemory;
pub use crate::redirect::PathRedirector;
pub use crate::tools::{ToolDescriptor, ToolKind, ToolRegistry, ToolSchema, ToolScopeView};
pub use crate::types::{
    ExecResult, FileChange, FileChangeKind, TaskResult, TokenUsage, ToolInvocation,
};
