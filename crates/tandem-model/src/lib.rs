// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod anthropic;
mod mock;
mod openai;
mod provider;
pub mod registry;
mod types;

pub use anthropic::AnthropicProvider;
pub use mock::{ScriptedProvider, ScriptedResponse};
pub use provider::ModelProvider;
pub use registry::{from_config, get_driver, DriverMeta, DRIVERS};
pub use types::*;
