// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One step of a captured plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub description: String,
    /// An action verb chosen by the planner — not necessarily a tool name.
    pub action: String,
    /// Free-form step parameters.  Never null: absent parameters normalize
    /// to an empty map at parse time.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// A validated plan: a goal and a non-empty ordered list of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    pub steps: Vec<PlanStep>,
}

/// Validation and codec errors.  Messages name the offending field, with
/// 1-based step indices.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("empty JSON input")]
    Empty,
    #[error("failed to parse plan JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("plan goal is missing or empty")]
    MissingGoal,
    #[error("plan steps are missing or empty")]
    MissingSteps,
    #[error("step {index}: description is missing or empty")]
    MissingDescription { index: usize },
    #[error("step {index}: action is missing or empty")]
    MissingAction { index: usize },
}

impl Plan {
    /// Parse and validate a plan from JSON text.
    pub fn parse(input: &str) -> Result<Plan, PlanError> {
        if input.trim().is_empty() {
            return Err(PlanError::Empty);
        }
        let value: Value = serde_json::from_str(input)?;

        let goal = value
            .get("goal")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();
        if goal.is_empty() {
            return Err(PlanError::MissingGoal);
        }

        let raw_steps = match value.get("steps").and_then(Value::as_array) {
            Some(steps) if !steps.is_empty() => steps,
            _ => return Err(PlanError::MissingSteps),
        };

        let mut steps = Vec::with_capacity(raw_steps.len());
        for (i, raw) in raw_steps.iter().enumerate() {
            let index = i + 1;
            let description = raw
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim()
                .to_string();
            if description.is_empty() {
                return Err(PlanError::MissingDescription { index });
            }
            let action = raw
                .get("action")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim()
                .to_string();
            if action.is_empty() {
                return Err(PlanError::MissingAction { index });
            }
            let parameters = raw
                .get("parameters")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            steps.push(PlanStep {
                description,
                action,
                parameters,
            });
        }

        Ok(Plan { goal, steps })
    }

    /// Serialize the plan to JSON.  Parameters always serialize, so
    /// `parse(to_json(p)) == p` holds for every plan that parses.
    pub fn to_json(&self) -> Result<String, PlanError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn valid_json() -> String {
        json!({
            "goal": "ship it",
            "steps": [
                {"description": "write code", "action": "write", "parameters": {"path": "main.rs"}},
                {"description": "verify", "action": "review"}
            ]
        })
        .to_string()
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn parses_valid_plan() {
        let plan = Plan::parse(&valid_json()).unwrap();
        assert_eq!(plan.goal, "ship it");
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].action, "write");
        assert_eq!(plan.steps[0].parameters["path"], json!("main.rs"));
    }

    #[test]
    fn absent_parameters_normalize_to_empty_map() {
        let plan = Plan::parse(&valid_json()).unwrap();
        assert!(plan.steps[1].parameters.is_empty());
    }

    // ── Validation errors name the field ──────────────────────────────────────

    #[test]
    fn empty_input_is_distinct_error() {
        let err = Plan::parse("   ").unwrap_err();
        assert!(err.to_string().contains("empty JSON"));
    }

    #[test]
    fn malformed_json_mentions_parse() {
        let err = Plan::parse("{not json").unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn missing_goal_mentions_goal() {
        let err = Plan::parse(r#"{"steps":[{"description":"d","action":"a"}]}"#).unwrap_err();
        assert!(err.to_string().contains("goal"));
    }

    #[test]
    fn empty_goal_mentions_goal() {
        let err =
            Plan::parse(r#"{"goal":"  ","steps":[{"description":"d","action":"a"}]}"#).unwrap_err();
        assert!(err.to_string().contains("goal"));
    }

    #[test]
    fn missing_steps_mentions_steps() {
        let err = Plan::parse(r#"{"goal":"g"}"#).unwrap_err();
        assert!(err.to_string().contains("steps"));
    }

    #[test]
    fn empty_steps_list_mentions_steps() {
        let err = Plan::parse(r#"{"goal":"g","steps":[]}"#).unwrap_err();
        assert!(err.to_string().contains("steps"));
    }

    #[test]
    fn step_without_description_names_step_index() {
        let err = Plan::parse(
            r#"{"goal":"g","steps":[{"description":"d","action":"a"},{"action":"a"}]}"#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("step 2"));
        assert!(msg.contains("description"));
    }

    #[test]
    fn step_without_action_names_step_index() {
        let err = Plan::parse(r#"{"goal":"g","steps":[{"description":"d"}]}"#).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("step 1"));
        assert!(msg.contains("action"));
    }

    // ── Round-trip ────────────────────────────────────────────────────────────

    #[test]
    fn round_trip_preserves_all_fields() {
        let plan = Plan::parse(&valid_json()).unwrap();
        let back = Plan::parse(&plan.to_json().unwrap()).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn round_trip_normalizes_absent_parameters() {
        let plan = Plan::parse(r#"{"goal":"g","steps":[{"description":"d","action":"a"}]}"#)
            .unwrap();
        let json = plan.to_json().unwrap();
        assert!(json.contains("\"parameters\""), "parameters must serialize: {json}");
        let back = Plan::parse(&json).unwrap();
        assert_eq!(back, plan);
        assert!(back.steps[0].parameters.is_empty());
    }

    #[test]
    fn round_trip_deep_parameters() {
        let src = json!({
            "goal": "g",
            "steps": [{
                "description": "d",
                "action": "a",
                "parameters": {"nested": {"list": [1, "two", 3.5], "flag": false}}
            }]
        })
        .to_string();
        let plan = Plan::parse(&src).unwrap();
        let back = Plan::parse(&plan.to_json().unwrap()).unwrap();
        assert_eq!(back, plan);
        assert_eq!(
            back.steps[0].parameters["nested"]["list"],
            json!([1, "two", 3.5])
        );
    }
}
