//! Boundary to the chat-completion client. The wire protocol lives outside
//! this crate; only the turn shapes the engine needs are modeled here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::tools::schema::ToolSchema;
use crate::types::TokenUsage;

/// One transcript entry, in the shape completion providers expect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<RawToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

/// A tool call as the model emitted it: arguments still a raw JSON string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
}

/// One completion request, restricted to the run's scoped tool schemas.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: Option<&'a str>,
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolSchema],
    pub tool_choice: ToolChoice,
}

/// The assistant's reply to one request.
#[derive(Debug, Clone, Default)]
pub struct AssistantTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<RawToolCall>,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn create(&self, request: CompletionRequest<'_>) -> Result<AssistantTurn, TaskError>;
}
