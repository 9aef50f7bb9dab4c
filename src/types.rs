//! Data shapes shared across the engine: invocations, per-call results, the
//! terminal task result, and file-change records.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::completion::RawToolCall;
use crate::error::TaskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One workspace file effect, reported by a tool or detected by the probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: FileChangeKind,
}

/// Token counts accumulated across a run's completion requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn absorb(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A model-issued tool call with its arguments parsed into a JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub call_id: String,
    pub tool: String,
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    /// Parse a raw tool call. The argument string must be a JSON object;
    /// anything else is a parse failure the caller records as a result.
    pub fn parse(raw: &RawToolCall) -> Result<Self, TaskError> {
        let value: Value =
            serde_json::from_str(&raw.arguments).map_err(|e| TaskError::MalformedArguments {
                tool: raw.name.clone(),
                message: e.to_string(),
            })?;
        let Value::Object(arguments) = value else {
            return Err(TaskError::MalformedArguments {
                tool: raw.name.clone(),
                message: "arguments must be a JSON object".to_string(),
            });
        };
        Ok(Self {
            call_id: raw.id.clone(),
            tool: raw.name.clone(),
            arguments,
        })
    }
}

/// Internal outcome of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub success: bool,
    /// Result text after truncation to the tool's budget.
    pub result: String,
    pub error: Option<String>,
    pub pending_approval_id: Option<String>,
    pub file_changes: Vec<FileChange>,
    /// Pre-truncation text, kept only when truncation happened.
    pub raw_result: Option<String>,
}

impl ExecResult {
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: result.into(),
            ..Self::default()
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        let error = error.to_string();
        Self {
            success: false,
            result: format!("Error: {error}"),
            error: Some(error),
            ..Self::default()
        }
    }

    /// The text recorded into conversation memory for this call.
    pub fn transcript_text(&self) -> &str {
        &self.result
    }
}

/// Terminal outcome of one delegated run. Produced exactly once per
/// [`crate::engine::ExecutionEngine::run`] call, on every exit path.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub success: bool,
    pub summary: String,
    pub iterations: usize,
    pub tool_calls_count: usize,
    pub usage: TokenUsage,
    pub error: Option<String>,
    pub pending_approval_id: Option<String>,
    pub file_changes: Vec<FileChange>,
    pub observed_files: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, arguments: &str) -> RawToolCall {
        RawToolCall {
            id: "call-1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn parse_accepts_json_object_arguments() {
        let invocation = ToolInvocation::parse(&raw("read_sheet", r#"{"path": "a.xlsx"}"#))
            .expect("parse");
        assert_eq!(invocation.tool, "read_sheet");
        assert_eq!(invocation.arguments["path"], "a.xlsx");
    }

    #[test]
    fn parse_rejects_non_object_arguments() {
        for bad in ["[1, 2]", "\"text\"", "42", "", "{not json"] {
            let error = ToolInvocation::parse(&raw("read_sheet", bad)).unwrap_err();
            assert!(matches!(error, TaskError::MalformedArguments { .. }), "{bad}");
        }
    }

    #[test]
    fn failed_result_carries_error_in_transcript() {
        let result = ExecResult::failed("file not found");
        assert!(!result.success);
        assert_eq!(result.transcript_text(), "Error: file not found");
        assert_eq!(result.error.as_deref(), Some("file not found"));
    }

    #[test]
    fn usage_absorb_accumulates() {
        let mut usage = TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
        };
        usage.absorb(TokenUsage {
            prompt_tokens: 7,
            completion_tokens: 3,
        });
        assert_eq!(usage.prompt_tokens, 17);
        assert_eq!(usage.completion_tokens, 8);
        assert_eq!(usage.total(), 25);
    }
}
