// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use tandem_model::{CompletionRequest, ModelProvider, Role, ToolCall};
use tandem_tools::ToolRegistry;

use crate::memory::ConversationMemory;

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Errors that terminate an agent run.
///
/// Tool-level failures are *not* represented here — they are fed back to
/// the model as tool-result messages and the loop continues.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model provider failed (network, API, or cancellation).
    #[error("LLM generation failed: {0}")]
    Generation(#[source] anyhow::Error),
    /// The model kept requesting tools until the iteration budget ran out.
    /// No partial result is returned.
    #[error("max iterations ({iterations}) exceeded")]
    MaxIterations { iterations: u32 },
}

/// The outcome of a completed agent run.
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// The model's final text response.
    pub response: String,
    /// Every tool call the model issued, in order.
    pub tool_calls_made: Vec<ToolCall>,
    /// Number of provider calls performed (1-based).
    pub iterations: u32,
}

/// The core agent: drives the model ↔ tool loop against a conversation
/// memory owned by the caller.
pub struct Agent {
    provider: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_iterations: u32,
}

impl Agent {
    pub fn new(provider: Arc<dyn ModelProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            system_prompt: String::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the iteration budget.  Values below 1 are clamped to 1: a loop
    /// that may never call the provider is meaningless.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Append the user input and run the Think → Act → Observe loop until
    /// the model answers in plain text or the iteration budget runs out.
    pub async fn run(
        &self,
        input: &str,
        memory: &ConversationMemory,
    ) -> Result<AgentResult, AgentError> {
        self.run_inner(input, memory, None).await
    }

    /// Like [`run`] but accepts a cancellation channel.
    ///
    /// Both an explicit `send(())` and a dropped sender count as
    /// cancellation.  Cancellation aborts the in-flight model call and
    /// surfaces as a generation error, per the provider-error contract.
    pub async fn run_with_cancel(
        &self,
        input: &str,
        memory: &ConversationMemory,
        cancel: oneshot::Receiver<()>,
    ) -> Result<AgentResult, AgentError> {
        self.run_inner(input, memory, Some(cancel)).await
    }

    async fn run_inner(
        &self,
        input: &str,
        memory: &ConversationMemory,
        mut cancel: Option<oneshot::Receiver<()>>,
    ) -> Result<AgentResult, AgentError> {
        memory.add_message(Role::User, input);

        let mut tool_calls_made: Vec<ToolCall> = Vec::new();

        for iteration in 1..=self.max_iterations {
            // We treat both an explicit send(()) AND a dropped sender as a
            // cancellation signal, so a plain `.is_ok()` check would miss
            // the dropped-sender case (`Err(Closed)`).
            if let Some(rx) = cancel.as_mut() {
                match rx.try_recv() {
                    Err(oneshot::error::TryRecvError::Empty) => {}
                    _ => {
                        return Err(AgentError::Generation(anyhow::anyhow!(
                            "model call cancelled"
                        )))
                    }
                }
            }

            let req = CompletionRequest {
                messages: memory.get_messages(),
                tools: self.tools.schemas(),
                system: self.system_prompt.clone(),
            };

            debug!(iteration, messages = req.messages.len(), "agent model call");

            let response = match cancel.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        biased;
                        _ = &mut *rx => {
                            return Err(AgentError::Generation(anyhow::anyhow!(
                                "model call cancelled"
                            )));
                        }
                        result = self.provider.generate(req) => {
                            result.map_err(AgentError::Generation)?
                        }
                    }
                }
                None => self
                    .provider
                    .generate(req)
                    .await
                    .map_err(AgentError::Generation)?,
            };

            if !response.has_tool_calls() {
                memory.add_message(Role::Assistant, response.text.clone());
                return Ok(AgentResult {
                    response: response.text,
                    tool_calls_made,
                    iterations: iteration,
                });
            }

            // The assistant message announcing the tool calls must land in
            // memory BEFORE any tool-result message: providers reject
            // tool_result blocks with no matching preceding tool_use block,
            // and replays depend on the same ordering.
            memory.add_assistant_with_tool_calls(
                response.text.clone(),
                response.tool_calls.clone(),
            );

            for tc in response.tool_calls {
                tool_calls_made.push(tc.clone());
                let result_text = self.execute_one(&tc).await;
                memory.add_tool_result(&tc.id, &tc.name, result_text);
            }
        }

        Err(AgentError::MaxIterations {
            iterations: self.max_iterations,
        })
    }

    /// Execute one tool call and render its outcome as the tool-result
    /// text fed back to the model.  Failures never abort the loop.
    async fn execute_one(&self, tc: &ToolCall) -> String {
        let tool = match self.tools.get(&tc.name) {
            Some(t) => t,
            None => {
                warn!(tool_name = %tc.name, "model requested unknown tool");
                return format!("error: unknown tool '{}'", tc.name);
            }
        };

        // Run the tool in its own task so a panic surfaces as a failed
        // result instead of tearing down the agent.
        let call = tc.clone();
        let handle = tokio::spawn(async move { tool.execute(&call).await });
        match handle.await {
            Err(e) => {
                warn!(tool_name = %tc.name, error = %e, "tool task failed");
                format!("error: tool execution failed: {e}")
            }
            Ok(output) if output.is_error => format!("error: {}", output.content),
            Ok(output) => output.content,
        }
    }
}
