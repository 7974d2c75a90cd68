// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::{CompletionRequest, CompletionResponse, ToolCall};

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Plain text answer (terminates an agent loop).
    Text(String),
    /// Tool calls, optionally with accompanying text.
    ToolCalls {
        text: String,
        calls: Vec<ToolCall>,
    },
    /// A provider-level failure.
    Error(String),
}

/// A pre-scripted provider.  Each `generate` call pops the next response
/// from the front of the script queue.  This lets tests specify exact
/// turn sequences — including tool calls and provider failures — without
/// network access.
#[derive(Debug)]
pub struct ScriptedProvider {
    scripts: Mutex<Vec<ScriptedResponse>>,
    /// Emitted when the script queue is exhausted.
    fallback: ScriptedResponse,
    calls: AtomicU32,
    /// The last `CompletionRequest` seen by this provider.
    /// Written on each `generate` call so tests can inspect what was sent.
    pub last_request: Mutex<Option<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<ScriptedResponse>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            fallback: ScriptedResponse::Text("[no more scripts]".into()),
            calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Convenience: provider that always returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        let mut p = Self::new(vec![]);
        p.fallback = ScriptedResponse::Text(reply.into());
        p
    }

    /// Convenience: provider that returns one tool call followed by a text
    /// reply.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Value,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            ScriptedResponse::ToolCalls {
                text: String::new(),
                calls: vec![ToolCall::new(tool_id, tool_name, arguments)],
            },
            ScriptedResponse::Text(final_text.into()),
        ])
    }

    /// Convenience: provider that returns a tool call on every turn, with a
    /// fresh id per call.  Used to exercise iteration limits.
    pub fn always_tool_call(tool_name: impl Into<String>, arguments: Value) -> Self {
        let mut p = Self::new(vec![]);
        p.fallback = ScriptedResponse::ToolCalls {
            text: String::new(),
            calls: vec![ToolCall::new("call", tool_name, arguments)],
        };
        p
    }

    /// Convenience: provider whose first turn fails.
    pub fn always_error(message: impl Into<String>) -> Self {
        let mut p = Self::new(vec![]);
        p.fallback = ScriptedResponse::Error(message.into());
        p
    }

    /// Number of `generate` calls observed so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl crate::ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn generate(&self, req: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(req);

        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                self.fallback.clone()
            } else {
                scripts.remove(0)
            }
        };

        match script {
            ScriptedResponse::Text(t) => Ok(CompletionResponse::text(t)),
            ScriptedResponse::ToolCalls { text, calls } => {
                // Re-key ids so repeated fallback turns stay distinguishable
                // in the conversation history.
                let calls = calls
                    .into_iter()
                    .enumerate()
                    .map(|(i, mut tc)| {
                        if tc.id == "call" {
                            tc.id = format!("call-{}-{}", n + 1, i + 1);
                        }
                        tc
                    })
                    .collect();
                Ok(CompletionResponse::tool_calls(text, calls))
            }
            ScriptedResponse::Error(msg) => Err(anyhow::anyhow!(msg)),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{Message, ModelProvider};

    fn req() -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::user("hi")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn scripted_single_text_reply() {
        let p = ScriptedProvider::always_text("hello world");
        let r = p.generate(req()).await.unwrap();
        assert_eq!(r.text, "hello world");
        assert!(!r.has_tool_calls());
    }

    #[tokio::test]
    async fn scripted_tool_then_text_two_rounds() {
        let p = ScriptedProvider::tool_then_text("c1", "shell", json!({"command": "ls"}), "done");

        let r1 = p.generate(req()).await.unwrap();
        assert!(r1.has_tool_calls());
        assert_eq!(r1.tool_calls[0].name, "shell");

        let r2 = p.generate(req()).await.unwrap();
        assert_eq!(r2.text, "done");
        assert_eq!(p.call_count(), 2);
    }

    #[tokio::test]
    async fn fallback_when_scripts_exhausted() {
        let p = ScriptedProvider::new(vec![]);
        let r = p.generate(req()).await.unwrap();
        assert!(r.text.contains("no more scripts"));
    }

    #[tokio::test]
    async fn always_tool_call_generates_fresh_ids() {
        let p = ScriptedProvider::always_tool_call("spin", json!({}));
        let r1 = p.generate(req()).await.unwrap();
        let r2 = p.generate(req()).await.unwrap();
        assert_ne!(r1.tool_calls[0].id, r2.tool_calls[0].id);
    }

    #[tokio::test]
    async fn error_script_propagates() {
        let p = ScriptedProvider::always_error("boom");
        let err = p.generate(req()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn last_request_is_recorded() {
        let p = ScriptedProvider::always_text("ok");
        p.generate(req()).await.unwrap();
        let seen = p.last_request.lock().unwrap();
        assert_eq!(seen.as_ref().unwrap().messages[0].content, "hi");
    }
}
