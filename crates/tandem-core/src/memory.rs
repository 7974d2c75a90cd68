// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::RwLock;

use tandem_model::{Message, Role, ToolCall};

/// Append-only conversation log shared between the agent loop and any
/// concurrent observers.
///
/// Reads return snapshot clones; mutating a snapshot never affects the
/// store.  Writes serialize on the interior lock, so insertion order is
/// exactly call order under any interleaving.
#[derive(Debug, Default)]
pub struct ConversationMemory {
    messages: RwLock<Vec<Message>>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plain message with no tool fields.
    pub fn add_message(&self, role: Role, content: impl Into<String>) {
        self.push(Message {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            tool_calls: Vec::new(),
        });
    }

    /// Append an assistant message announcing tool calls.  `content` may be
    /// empty.
    pub fn add_assistant_with_tool_calls(
        &self,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) {
        self.push(Message::assistant_with_tool_calls(content, tool_calls));
    }

    /// Append a tool-role message carrying one tool result.
    pub fn add_tool_result(
        &self,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        result_text: impl Into<String>,
    ) {
        self.push(Message::tool_result(tool_call_id, tool_name, result_text));
    }

    /// Snapshot copy of the log.  The caller may mutate the returned list
    /// freely.
    pub fn get_messages(&self) -> Vec<Message> {
        self.messages.read().expect("memory lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.messages.read().expect("memory lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.messages.write().expect("memory lock poisoned").clear();
    }

    fn push(&self, msg: Message) {
        self.messages.write().expect("memory lock poisoned").push(msg);
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
