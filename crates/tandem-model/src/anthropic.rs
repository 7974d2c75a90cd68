// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{CompletionRequest, CompletionResponse, Message, Role, ToolCall};

#[derive(Debug)]
pub struct AnthropicProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".into()),
            max_tokens: max_tokens.unwrap_or(4096),
            temperature: temperature.unwrap_or(0.2),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, req: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        let key = self
            .api_key
            .as_deref()
            .context("ANTHROPIC_API_KEY not set")?;

        let body = build_request_body(&self.model, self.max_tokens, self.temperature, &req);

        debug!(model = %self.model, messages = req.messages.len(), tools = req.tools.len(),
               "sending anthropic request");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("Anthropic request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Anthropic error {status}: {text}");
        }

        let value: Value = resp
            .json()
            .await
            .context("Anthropic response was not valid JSON")?;
        Ok(parse_response_body(&value))
    }
}

/// Build the `/v1/messages` request body from a logical completion request.
pub(crate) fn build_request_body(
    model: &str,
    max_tokens: u32,
    temperature: f32,
    req: &CompletionRequest,
) -> Value {
    let (system_text, messages) = build_anthropic_messages(&req.system, &req.messages);

    let tools: Vec<Value> = req
        .tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.parameters,
            })
        })
        .collect();

    let mut body = json!({
        "model": model,
        "messages": messages,
        "max_tokens": max_tokens,
        "temperature": temperature,
    });
    if !system_text.is_empty() {
        body["system"] = json!(system_text);
    }
    if !tools.is_empty() {
        body["tools"] = json!(tools);
    }
    body
}

/// Convert a slice of [`Message`]s into the Anthropic wire format.
///
/// Returns `(system_text, conversation_messages)`.  The system prompt is
/// separated out because Anthropic expects it as a top-level `system`
/// field, not as a conversation turn.  A system-role message in the
/// conversation wins over an empty request-level prompt.
fn build_anthropic_messages(system: &str, messages: &[Message]) -> (String, Vec<Value>) {
    let mut system_text = system.to_string();
    let mut out: Vec<Value> = Vec::new();

    for m in messages {
        match m.role {
            Role::System => {
                if system_text.is_empty() {
                    system_text = m.content.clone();
                }
            }
            Role::User => {
                out.push(json!({ "role": "user", "content": m.content }));
            }
            Role::Assistant if m.has_tool_calls() => {
                let mut content: Vec<Value> = Vec::new();
                if !m.content.is_empty() {
                    content.push(json!({ "type": "text", "text": m.content }));
                }
                for tc in &m.tool_calls {
                    // Anthropic requires tool_use.id to match `^[a-zA-Z0-9_-]+$`.
                    // An empty id would yield a 400 on this request; substitute
                    // a stable fallback so the conversation remains coherent.
                    let safe_id = if tc.id.is_empty() {
                        warn!(tool_name = %tc.name,
                              "tool call has empty id when building Anthropic request; \
                               substituting fallback id");
                        "tc_fallback".to_string()
                    } else {
                        tc.id.clone()
                    };
                    content.push(json!({
                        "type": "tool_use",
                        "id": safe_id,
                        "name": tc.name,
                        "input": tc.arguments,
                    }));
                }
                out.push(json!({ "role": "assistant", "content": content }));
            }
            Role::Assistant => {
                out.push(json!({ "role": "assistant", "content": m.content }));
            }
            Role::Tool => {
                // Anthropic carries tool results as user-role tool_result
                // blocks that reference the originating tool_use id.
                let id = m.tool_call_id.clone().unwrap_or_default();
                out.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": id,
                        "content": m.content,
                    }],
                }));
            }
        }
    }
    (system_text, out)
}

/// Fold the response `content` blocks into a [`CompletionResponse`].
///
/// `text` blocks concatenate into the response text; `tool_use` blocks
/// become tool calls in order.  Unknown block types are ignored.
pub(crate) fn parse_response_body(value: &Value) -> CompletionResponse {
    let mut text = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    if let Some(blocks) = value["content"].as_array() {
        for block in blocks {
            match block["type"].as_str().unwrap_or("") {
                "text" => {
                    text.push_str(block["text"].as_str().unwrap_or(""));
                }
                "tool_use" => {
                    let id = block["id"].as_str().unwrap_or("").to_string();
                    let name = block["name"].as_str().unwrap_or("").to_string();
                    if name.is_empty() {
                        warn!(tool_call_id = %id,
                              "dropping tool_use block with empty name; cannot dispatch");
                        continue;
                    }
                    // tool_use input must be an object; anything else is
                    // replaced with `{}` so the next request round-trips.
                    let arguments = match &block["input"] {
                        Value::Object(_) => block["input"].clone(),
                        other => {
                            warn!(tool_name = %name, input = %other,
                                  "tool_use input was not an object; substituting {{}}");
                            Value::Object(Default::default())
                        }
                    };
                    tool_calls.push(ToolCall {
                        id,
                        name,
                        arguments,
                    });
                }
                _ => {}
            }
        }
    }

    CompletionResponse { text, tool_calls }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
