// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use tandem_tools::{Tool, ToolCall, ToolOutput};

use crate::plan::Plan;

/// Shared sink the planner agent writes its final plan into.
///
/// One sink is created per orchestrator run and handed to the sentinel
/// tool at construction; it is never global.  The sink holds the plan as
/// normalized JSON so the orchestrator parses exactly what was validated.
#[derive(Debug, Clone, Default)]
pub struct PlanSink {
    inner: Arc<Mutex<Option<String>>>,
}

impl PlanSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_captured(&self) -> bool {
        self.inner.lock().expect("plan sink lock poisoned").is_some()
    }

    pub fn get_captured(&self) -> Option<String> {
        self.inner.lock().expect("plan sink lock poisoned").clone()
    }

    pub fn clear_captured(&self) {
        *self.inner.lock().expect("plan sink lock poisoned") = None;
    }

    fn store(&self, json: String) {
        *self.inner.lock().expect("plan sink lock poisoned") = Some(json);
    }
}

/// The plan-capture sentinel: the planner agent signals completion by
/// calling this tool with its finished plan.
pub struct PlanCaptureTool {
    sink: PlanSink,
}

impl PlanCaptureTool {
    pub fn new(sink: PlanSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Tool for PlanCaptureTool {
    fn name(&self) -> &str {
        "capture_plan"
    }

    fn description(&self) -> &str {
        "Records the finished plan. Call this exactly once, after breaking \
         the goal into concrete steps. This is the only way to hand the \
         plan over for execution."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "goal": {
                    "type": "string",
                    "description": "The goal this plan achieves"
                },
                "steps": {
                    "type": "array",
                    "description": "Ordered steps to achieve the goal",
                    "items": {
                        "type": "object",
                        "properties": {
                            "description": { "type": "string" },
                            "action": {
                                "type": "string",
                                "description": "Action verb for this step"
                            },
                            "parameters": {
                                "type": "object",
                                "additionalProperties": true
                            }
                        },
                        "required": ["description", "action"]
                    }
                }
            },
            "required": ["goal", "steps"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        // The argument object has exactly the plan shape, so the plan codec
        // does the validation and the parameter normalization in one step.
        // Invalid input leaves any previously captured plan untouched.
        let plan = match Plan::parse(&call.arguments.to_string()) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, format!("invalid plan: {e}")),
        };
        let json = match plan.to_json() {
            Ok(j) => j,
            Err(e) => return ToolOutput::err(&call.id, format!("invalid plan: {e}")),
        };

        debug!(goal = %plan.goal, steps = plan.steps.len(), "plan captured");
        self.sink.store(json);

        ToolOutput::ok(
            &call.id,
            format!(
                "captured plan with {} step(s) for goal '{}'",
                plan.steps.len(),
                plan.goal
            ),
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
