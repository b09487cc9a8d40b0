//! Message history management
//!
//! 히스토리는 append-only입니다. 수정/삭제 API는 없습니다.

use forgebox_foundation::{Message, MessageRole, ToolCall, ToolResult};
use serde::Serialize;
use std::collections::HashSet;

/// Message history for a session
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct MessageHistory {
    messages: Vec<Message>,
}

impl MessageHistory {
    /// Create a new empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the system message
    pub fn add_system(&mut self, content: impl Into<String>) {
        self.messages.push(Message::system(content));
    }

    /// Add a user message
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Add an assistant message
    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Add an assistant message with tool calls
    pub fn add_assistant_with_tools(&mut self, content: Option<String>, tool_calls: Vec<ToolCall>) {
        self.messages
            .push(Message::assistant_with_tools(content, tool_calls));
    }

    /// Add a tool result (serialized `ToolResult`, correlated by call id)
    pub fn add_tool_result(&mut self, tool_call_id: impl Into<String>, result: &ToolResult) {
        self.messages
            .push(Message::tool_result(tool_call_id, result));
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get messages as owned vec
    pub fn to_messages(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Get the last assistant message
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role() == MessageRole::Assistant)
    }

    /// 모든 tool 호출이 같은 id의 tool 메시지로 응답되었는지
    pub fn unanswered_tool_calls(&self) -> Vec<&str> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .filter_map(|m| match m {
                Message::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();

        self.messages
            .iter()
            .flat_map(|m| m.tool_calls())
            .map(|tc| tc.id.as_str())
            .filter(|id| !answered.contains(id))
            .collect()
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> usize {
        self.messages
            .iter()
            .map(|msg| {
                let content = msg.content().map_or(0, str::len);
                let calls: usize = msg
                    .tool_calls()
                    .iter()
                    .map(|tc| tc.name.len() + tc.arguments.to_string().len())
                    .sum();
                (content + calls) / 4
            })
            .sum()
    }
}
