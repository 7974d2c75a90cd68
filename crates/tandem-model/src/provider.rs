// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::{CompletionRequest, CompletionResponse};

/// A model provider turns one completion request into one complete response.
///
/// Streaming is deliberately not part of this trait: callers consume whole
/// turns, and the agent loop decides whether to continue from the presence
/// of tool calls in the response.
#[async_trait]
pub trait ModelProvider: Send + Sync + std::fmt::Debug {
    /// Human-readable provider name for status display.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return the model's turn.
    ///
    /// Errors are propagated verbatim; callers wrap them with context at
    /// the component boundary.
    async fn generate(&self, req: CompletionRequest) -> anyhow::Result<CompletionResponse>;
}
