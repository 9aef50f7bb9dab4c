//! Single-writer conversation transcript for one run.
//!
//! The engine owns exactly one instance per run and is its only writer, so
//! no synchronization is needed even while a batch executes concurrently:
//! results are replayed into memory sequentially after the join.

use crate::completion::{AssistantTurn, ChatMessage};
use crate::types::ExecResult;

#[derive(Debug, Default)]
pub struct ConversationMemory {
    messages: Vec<ChatMessage>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with the composed system prompt and the delegated user prompt.
    pub fn seeded(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        let mut memory = Self::new();
        memory.messages.push(ChatMessage::System {
            content: system_prompt.into(),
        });
        memory.push_user(user_prompt);
        memory
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::User {
            content: content.into(),
        });
    }

    pub fn push_assistant_turn(&mut self, turn: &AssistantTurn) {
        self.messages.push(ChatMessage::Assistant {
            content: turn.content.clone(),
            tool_calls: turn.tool_calls.clone(),
        });
    }

    /// Record the result entry matching one tool call id.
    pub fn push_tool_result(&mut self, call_id: &str, result: &ExecResult) {
        self.messages.push(ChatMessage::Tool {
            tool_call_id: call_id.to_string(),
            content: result.transcript_text().to_string(),
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Assistant narration so far, oldest first. Feeds the partial-progress
    /// section when a run stops early.
    pub fn assistant_texts(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter_map(|message| match message {
                ChatMessage::Assistant {
                    content: Some(text),
                    ..
                } if !text.is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Count of tool-result entries, one per dispatched call.
    pub fn tool_result_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| matches!(message, ChatMessage::Tool { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::RawToolCall;

    fn turn_with_calls(content: Option<&str>, calls: usize) -> AssistantTurn {
        AssistantTurn {
            content: content.map(str::to_string),
            tool_calls: (0..calls)
                .map(|i| RawToolCall {
                    id: format!("call-{i}"),
                    name: "read_sheet".to_string(),
                    arguments: "{}".to_string(),
                })
                .collect(),
            usage: Default::default(),
        }
    }

    #[test]
    fn seeded_memory_has_system_then_user() {
        let memory = ConversationMemory::seeded("be brief", "summarize the sheet");
        assert_eq!(memory.len(), 2);
        assert!(matches!(&memory.messages()[0], ChatMessage::System { content } if content == "be brief"));
        assert!(matches!(&memory.messages()[1], ChatMessage::User { .. }));
    }

    #[test]
    fn tool_results_are_recorded_per_call_id() {
        let mut memory = ConversationMemory::seeded("s", "u");
        memory.push_assistant_turn(&turn_with_calls(None, 2));
        memory.push_tool_result("call-0", &ExecResult::ok("42"));
        memory.push_tool_result("call-1", &ExecResult::failed("boom"));

        assert_eq!(memory.tool_result_count(), 2);
        let last = memory.messages().last().unwrap();
        assert!(matches!(
            last,
            ChatMessage::Tool { tool_call_id, content }
                if tool_call_id == "call-1" && content == "Error: boom"
        ));
    }

    #[test]
    fn assistant_texts_skips_empty_and_tool_only_turns() {
        let mut memory = ConversationMemory::seeded("s", "u");
        memory.push_assistant_turn(&turn_with_calls(Some("checking the sheet"), 1));
        memory.push_assistant_turn(&turn_with_calls(None, 1));
        memory.push_assistant_turn(&turn_with_calls(Some(""), 0));

        assert_eq!(memory.assistant_texts(), vec!["checking the sheet"]);
    }
}
