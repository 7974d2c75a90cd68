// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! OpenAI-compatible chat completion provider.
//!
//! Many providers speak the same `/chat/completions` wire format; this one
//! implementation covers them all, configured with its own endpoint and
//! auth style by the driver registry.

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{CompletionRequest, CompletionResponse, Message, Role, ToolCall};

/// How to send the API key in HTTP requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` — standard for most providers.
    Bearer,
    /// No authentication header — local servers (Ollama, vLLM, LM Studio).
    None,
}

#[derive(Debug)]
pub struct OpenAiCompatProvider {
    /// Provider id returned by `ModelProvider::name()`.
    driver_name: &'static str,
    model: String,
    api_key: Option<String>,
    /// Full chat completions URL.
    chat_url: String,
    max_tokens: u32,
    temperature: f32,
    auth_style: AuthStyle,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// `base_url` ends **before** `/chat/completions`, e.g.
    /// `https://api.openai.com/v1`.
    pub fn new(
        driver_name: &'static str,
        model: String,
        api_key: Option<String>,
        base_url: &str,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        auth_style: AuthStyle,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            driver_name,
            model,
            api_key,
            chat_url: format!("{base}/chat/completions"),
            max_tokens: max_tokens.unwrap_or(4096),
            temperature: temperature.unwrap_or(0.2),
            auth_style,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl crate::ModelProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        self.driver_name
    }
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, req: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        let body = build_request_body(&self.model, self.max_tokens, self.temperature, &req);

        debug!(driver = self.driver_name, model = %self.model,
               messages = req.messages.len(), "sending chat completion request");

        let mut request = self.client.post(&self.chat_url).json(&body);
        match (self.auth_style, self.api_key.as_deref()) {
            (AuthStyle::Bearer, Some(key)) => request = request.bearer_auth(key),
            (AuthStyle::Bearer, None) => bail!("{} API key not set", self.driver_name),
            (AuthStyle::None, _) => {}
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("{} request failed", self.driver_name))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("{} error {status}: {text}", self.driver_name);
        }

        let value: Value = resp
            .json()
            .await
            .with_context(|| format!("{} response was not valid JSON", self.driver_name))?;
        Ok(parse_response_body(&value))
    }
}

/// Build the `/chat/completions` request body from a logical request.
pub(crate) fn build_request_body(
    model: &str,
    max_tokens: u32,
    temperature: f32,
    req: &CompletionRequest,
) -> Value {
    let mut messages: Vec<Value> = Vec::new();
    if !req.system.is_empty() {
        messages.push(json!({ "role": "system", "content": req.system }));
    }
    for m in &req.messages {
        messages.push(convert_message(m));
    }

    let mut body = json!({
        "model": model,
        "messages": messages,
        "max_tokens": max_tokens,
        "temperature": temperature,
    });
    if !req.tools.is_empty() {
        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = json!(tools);
    }
    body
}

fn convert_message(m: &Message) -> Value {
    match m.role {
        Role::System => json!({ "role": "system", "content": m.content }),
        Role::User => json!({ "role": "user", "content": m.content }),
        Role::Assistant if m.has_tool_calls() => {
            let tool_calls: Vec<Value> = m
                .tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            // The OpenAI wire format carries arguments as a
                            // JSON-encoded string, not an object.
                            "arguments": tc.arguments.to_string(),
                        }
                    })
                })
                .collect();
            let content = if m.content.is_empty() {
                Value::Null
            } else {
                json!(m.content)
            };
            json!({ "role": "assistant", "content": content, "tool_calls": tool_calls })
        }
        Role::Assistant => json!({ "role": "assistant", "content": m.content }),
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": m.tool_call_id.clone().unwrap_or_default(),
            "content": m.content,
        }),
    }
}

/// Fold `choices[0].message` into a [`CompletionResponse`].
pub(crate) fn parse_response_body(value: &Value) -> CompletionResponse {
    let message = &value["choices"][0]["message"];
    let text = message["content"].as_str().unwrap_or("").to_string();

    let mut tool_calls: Vec<ToolCall> = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let id = call["id"].as_str().unwrap_or("").to_string();
            let name = call["function"]["name"].as_str().unwrap_or("").to_string();
            if name.is_empty() {
                warn!(tool_call_id = %id, "dropping tool call with empty name; cannot dispatch");
                continue;
            }
            let raw_args = call["function"]["arguments"].as_str().unwrap_or("");
            let arguments = match serde_json::from_str::<Value>(raw_args) {
                Ok(Value::Object(o)) => Value::Object(o),
                _ => {
                    if !raw_args.is_empty() {
                        warn!(tool_name = %name, raw = raw_args,
                              "tool call arguments were not a JSON object; substituting {{}}");
                    }
                    Value::Object(Default::default())
                }
            };
            tool_calls.push(ToolCall {
                id,
                name,
                arguments,
            });
        }
    }

    CompletionResponse { text, tool_calls }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
