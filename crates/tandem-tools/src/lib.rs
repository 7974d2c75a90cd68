// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod registry;
pub mod tool;

pub use builtin::{CalculatorTool, ListDirTool, ReadFileTool, WriteFileTool};
pub use registry::{RegistryError, ToolRegistry};
pub use tool::{Tool, ToolCall, ToolOutput};
