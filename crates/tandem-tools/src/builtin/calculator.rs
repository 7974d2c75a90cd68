// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Built-in arithmetic tool.
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Performs basic arithmetic. Operations: add, subtract, multiply, divide."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide"],
                    "description": "Arithmetic operation"
                },
                "a": { "type": "number", "description": "First operand" },
                "b": { "type": "number", "description": "Second operand" }
            },
            "required": ["operation", "a", "b"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let op = match call.arguments.get("operation").and_then(Value::as_str) {
            Some(o) => o.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'operation'"),
        };
        let a = match number_arg(&call.arguments, "a") {
            Ok(n) => n,
            Err(msg) => return ToolOutput::err(&call.id, msg),
        };
        let b = match number_arg(&call.arguments, "b") {
            Ok(n) => n,
            Err(msg) => return ToolOutput::err(&call.id, msg),
        };

        debug!(op = %op, a, b, "calculator tool");

        let result = match op.as_str() {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    return ToolOutput::err(&call.id, "division by zero");
                }
                a / b
            }
            other => return ToolOutput::err(&call.id, format!("unknown operation: {other}")),
        };

        ToolOutput::ok(&call.id, format!("{result}"))
    }
}

/// Extract a numeric argument, accepting both integer and double JSON
/// representations.
fn number_arg(args: &Value, key: &str) -> Result<f64, String> {
    match args.get(key) {
        None => Err(format!("missing required parameter '{key}'")),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| format!("parameter '{key}' must be a number")),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
