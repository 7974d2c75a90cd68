// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use tandem_core::{Agent, AgentError, ConversationMemory, DEFAULT_MAX_ITERATIONS};
use tandem_model::{ModelProvider, ToolCall};
use tandem_tools::{ReadFileTool, ToolRegistry, WriteFileTool};

use crate::capture::{PlanCaptureTool, PlanSink};
use crate::plan::{Plan, PlanError};
use crate::prompts::{executor_input, EXECUTOR_SYSTEM_PROMPT, PLANNER_SYSTEM_PROMPT};

/// Where the workflow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowPhase {
    #[default]
    Idle,
    Planning,
    Executing,
    Complete,
    Failed,
}

/// Snapshot of the orchestrator's observable state.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    pub phase: WorkflowPhase,
    pub current_agent: Option<String>,
    /// Set once planning succeeds; survives executor failure.
    pub plan: Option<Plan>,
    /// Set only when `phase == Failed`.
    pub error: Option<String>,
}

/// Workflow failures.  Each variant renders the message the embedder
/// matches on; `ExecutorFailed` carries the parsed plan as the partial
/// result.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("architect agent failed: {0}")]
    PlannerFailed(#[source] AgentError),
    #[error("architect agent did not produce a plan")]
    PlanMissing,
    #[error("failed to parse plan: {0}")]
    PlanParse(#[from] PlanError),
    #[error("coder agent failed: {source}")]
    ExecutorFailed {
        plan: Box<Plan>,
        #[source]
        source: AgentError,
    },
}

impl WorkflowError {
    /// The plan captured before the failure, when one exists.
    pub fn plan(&self) -> Option<&Plan> {
        match self {
            WorkflowError::ExecutorFailed { plan, .. } => Some(plan),
            _ => None,
        }
    }
}

/// The outcome of a successful workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub plan: Plan,
    /// Planner tool calls followed by executor tool calls, each rendered
    /// as `"<tool_name>: <arguments>"`.
    pub actions: Vec<String>,
    /// The executor's final response text.
    pub summary: String,
}

/// Two-phase planner/executor workflow.
///
/// The planner ("architect") gets only the plan-capture sentinel; the
/// executor ("coder") gets the file tools bound to `workspace_root`.
/// Each run starts from a reset state and uses fresh conversation
/// memories for both agents.
pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    workspace_root: PathBuf,
    max_iterations: u32,
    state: Mutex<WorkflowState>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ModelProvider>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            workspace_root: workspace_root.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            state: Mutex::new(WorkflowState::default()),
        }
    }

    /// Iteration budget applied to both agents.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Snapshot of the current workflow state.  The copy is independent;
    /// the lock is held only for the clone.
    pub fn state(&self) -> WorkflowState {
        self.state.lock().expect("state lock poisoned").clone()
    }

    /// Run the full workflow for `goal`.
    pub async fn run(&self, goal: &str) -> Result<WorkflowReport, WorkflowError> {
        // Every run starts fresh.
        self.update(|st| *st = WorkflowState::default());

        // ── Planning ─────────────────────────────────────────────────────
        self.update(|st| {
            st.phase = WorkflowPhase::Planning;
            st.current_agent = Some("architect".into());
        });
        info!(goal, "workflow planning");

        let sink = PlanSink::new();
        let mut planner_tools = ToolRegistry::new();
        planner_tools
            .register(PlanCaptureTool::new(sink.clone()))
            .expect("fresh registry");
        let planner = Agent::new(Arc::clone(&self.provider), Arc::new(planner_tools))
            .with_system_prompt(PLANNER_SYSTEM_PROMPT)
            .with_max_iterations(self.max_iterations);
        let planner_memory = ConversationMemory::new();

        let planner_result = match planner.run(goal, &planner_memory).await {
            Ok(r) => r,
            Err(e) => return self.fail(WorkflowError::PlannerFailed(e)),
        };

        let captured = match sink.get_captured() {
            Some(c) => c,
            None => return self.fail(WorkflowError::PlanMissing),
        };
        let plan = match Plan::parse(&captured) {
            Ok(p) => p,
            Err(e) => return self.fail(e.into()),
        };
        debug!(steps = plan.steps.len(), "plan parsed");

        // ── Executing ────────────────────────────────────────────────────
        self.update(|st| {
            st.plan = Some(plan.clone());
            st.phase = WorkflowPhase::Executing;
            st.current_agent = Some("coder".into());
        });

        let plan_json = match plan.to_json() {
            Ok(j) => j,
            Err(e) => return self.fail(e.into()),
        };

        let mut executor_tools = ToolRegistry::new();
        executor_tools
            .register(ReadFileTool::new(self.workspace_root.clone()))
            .expect("fresh registry");
        executor_tools
            .register(WriteFileTool::new(self.workspace_root.clone()))
            .expect("fresh registry");
        let executor = Agent::new(Arc::clone(&self.provider), Arc::new(executor_tools))
            .with_system_prompt(EXECUTOR_SYSTEM_PROMPT)
            .with_max_iterations(self.max_iterations);
        let executor_memory = ConversationMemory::new();

        let executor_result = match executor
            .run(&executor_input(&plan_json), &executor_memory)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return self.fail(WorkflowError::ExecutorFailed {
                    plan: Box::new(plan),
                    source: e,
                })
            }
        };

        self.update(|st| {
            st.phase = WorkflowPhase::Complete;
            st.current_agent = None;
        });

        let actions: Vec<String> = planner_result
            .tool_calls_made
            .iter()
            .chain(executor_result.tool_calls_made.iter())
            .map(render_action)
            .collect();
        info!(actions = actions.len(), "workflow complete");

        Ok(WorkflowReport {
            plan,
            actions,
            summary: executor_result.response,
        })
    }

    fn update(&self, f: impl FnOnce(&mut WorkflowState)) {
        let mut st = self.state.lock().expect("state lock poisoned");
        f(&mut st);
    }

    /// Record the failure in the observable state, then return it.
    fn fail<T>(&self, err: WorkflowError) -> Result<T, WorkflowError> {
        self.update(|st| {
            st.phase = WorkflowPhase::Failed;
            st.error = Some(err.to_string());
        });
        Err(err)
    }
}

fn render_action(tc: &ToolCall) -> String {
    format!("{}: {}", tc.name, tc.arguments)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use tandem_model::{ScriptedProvider, ScriptedResponse, ToolCall};

    use super::*;

    fn capture_call(goal: &str) -> ToolCall {
        ToolCall::new(
            "p1",
            "capture_plan",
            json!({
                "goal": goal,
                "steps": [{"description": "d", "action": "a", "parameters": {}}]
            }),
        )
    }

    fn orchestrator_with(scripts: Vec<ScriptedResponse>) -> (Orchestrator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(scripts));
        (Orchestrator::new(provider, dir.path()), dir)
    }

    // ── Success path (S4) ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn successful_run_reports_plan_and_summary() {
        let (orch, _dir) = orchestrator_with(vec![
            // planner: capture then confirm
            ScriptedResponse::ToolCalls {
                text: String::new(),
                calls: vec![capture_call("G")],
            },
            ScriptedResponse::Text("plan captured".into()),
            // executor: immediate completion
            ScriptedResponse::Text("done".into()),
        ]);

        let report = orch.run("G").await.unwrap();
        assert_eq!(report.plan.goal, "G");
        assert_eq!(report.plan.steps.len(), 1);
        assert_eq!(report.summary, "done");
        assert_eq!(report.actions.len(), 1);
        assert!(report.actions[0].starts_with("capture_plan: "));

        let state = orch.state();
        assert_eq!(state.phase, WorkflowPhase::Complete);
        assert!(state.error.is_none());
        assert_eq!(state.plan.as_ref().unwrap().goal, "G");
    }

    #[tokio::test]
    async fn actions_concatenate_planner_then_executor_calls() {
        let (orch, _dir) = orchestrator_with(vec![
            ScriptedResponse::ToolCalls {
                text: String::new(),
                calls: vec![capture_call("G")],
            },
            ScriptedResponse::Text("ok".into()),
            // executor uses a file tool before finishing
            ScriptedResponse::ToolCalls {
                text: String::new(),
                calls: vec![ToolCall::new(
                    "e1",
                    "write_file",
                    json!({"path": "out.txt", "content": "x"}),
                )],
            },
            ScriptedResponse::Text("wrote the file".into()),
        ]);

        let report = orch.run("G").await.unwrap();
        assert_eq!(report.actions.len(), 2);
        assert!(report.actions[0].starts_with("capture_plan: "));
        assert!(report.actions[1].starts_with("write_file: "));
    }

    // ── Missing plan (S5) ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn planner_without_capture_fails_with_plan_missing() {
        let (orch, _dir) = orchestrator_with(vec![ScriptedResponse::Text(
            "I would rather chat than plan".into(),
        )]);

        let err = orch.run("G").await.unwrap_err();
        assert!(matches!(err, WorkflowError::PlanMissing));
        assert!(err.to_string().contains("plan"));
        assert!(err.plan().is_none());

        let state = orch.state();
        assert_eq!(state.phase, WorkflowPhase::Failed);
        assert!(state.error.as_ref().unwrap().contains("plan"));
    }

    // ── Planner failure ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn planner_error_fails_with_architect_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::always_error("api down"));
        let orch = Orchestrator::new(provider, dir.path());

        let err = orch.run("G").await.unwrap_err();
        assert!(matches!(err, WorkflowError::PlannerFailed(_)));
        assert!(err.to_string().starts_with("architect agent failed"));
        assert_eq!(orch.state().phase, WorkflowPhase::Failed);
    }

    // ── Executor failure keeps the plan (P12) ─────────────────────────────────

    #[tokio::test]
    async fn executor_failure_returns_partial_result_with_plan() {
        let (orch, _dir) = orchestrator_with(vec![
            ScriptedResponse::ToolCalls {
                text: String::new(),
                calls: vec![capture_call("G")],
            },
            ScriptedResponse::Text("ok".into()),
            ScriptedResponse::Error("executor exploded".into()),
        ]);

        let err = orch.run("G").await.unwrap_err();
        assert!(err.to_string().contains("coder"));
        let plan = err.plan().expect("executor failure must carry the plan");
        assert_eq!(plan.goal, "G");

        let state = orch.state();
        assert_eq!(state.phase, WorkflowPhase::Failed);
        assert!(state.error.as_ref().unwrap().contains("coder"));
        // The plan survives in the observable state too.
        assert_eq!(state.plan.as_ref().unwrap().goal, "G");
    }

    // ── State reset between runs ──────────────────────────────────────────────

    #[tokio::test]
    async fn each_run_starts_from_a_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            // run 1: planner never captures
            ScriptedResponse::Text("no plan".into()),
            // run 2: full success
            ScriptedResponse::ToolCalls {
                text: String::new(),
                calls: vec![capture_call("G2")],
            },
            ScriptedResponse::Text("ok".into()),
            ScriptedResponse::Text("done".into()),
        ]));
        let orch = Orchestrator::new(provider, dir.path());

        assert!(orch.run("G1").await.is_err());
        assert_eq!(orch.state().phase, WorkflowPhase::Failed);

        let report = orch.run("G2").await.unwrap();
        assert_eq!(report.plan.goal, "G2");
        let state = orch.state();
        assert_eq!(state.phase, WorkflowPhase::Complete);
        assert!(state.error.is_none());
    }

    // ── Phase discipline, observed mid-run ────────────────────────────────────

    /// Records the orchestrator's state at the moment of every model call,
    /// then delegates to a scripted provider.
    #[derive(Debug)]
    struct ProbeProvider {
        inner: ScriptedProvider,
        orch: std::sync::OnceLock<std::sync::Weak<Orchestrator>>,
        observed: std::sync::Mutex<Vec<(WorkflowPhase, Option<String>)>>,
    }

    #[async_trait::async_trait]
    impl tandem_model::ModelProvider for ProbeProvider {
        fn name(&self) -> &str {
            "probe"
        }
        fn model_name(&self) -> &str {
            "probe-model"
        }
        async fn generate(
            &self,
            req: tandem_model::CompletionRequest,
        ) -> anyhow::Result<tandem_model::CompletionResponse> {
            if let Some(orch) = self.orch.get().and_then(std::sync::Weak::upgrade) {
                let st = orch.state();
                self.observed
                    .lock()
                    .unwrap()
                    .push((st.phase, st.current_agent));
            }
            self.inner.generate(req).await
        }
    }

    #[tokio::test]
    async fn phase_is_set_before_each_agent_is_invoked() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ProbeProvider {
            inner: ScriptedProvider::new(vec![
                ScriptedResponse::ToolCalls {
                    text: String::new(),
                    calls: vec![capture_call("G")],
                },
                ScriptedResponse::Text("ok".into()),
                ScriptedResponse::Text("done".into()),
            ]),
            orch: std::sync::OnceLock::new(),
            observed: std::sync::Mutex::new(Vec::new()),
        });
        let orch = Arc::new(Orchestrator::new(provider.clone(), dir.path()));
        provider.orch.set(Arc::downgrade(&orch)).ok();

        orch.run("G").await.unwrap();

        let observed = provider.observed.lock().unwrap();
        assert_eq!(observed.len(), 3);
        // Both planner turns see the planning phase and the architect.
        assert_eq!(observed[0], (WorkflowPhase::Planning, Some("architect".into())));
        assert_eq!(observed[1], (WorkflowPhase::Planning, Some("architect".into())));
        // The executor's first turn already sees the executing phase.
        assert_eq!(observed[2], (WorkflowPhase::Executing, Some("coder".into())));
    }

    // ── Snapshot independence ─────────────────────────────────────────────────

    #[tokio::test]
    async fn state_snapshots_are_independent_copies() {
        let (orch, _dir) = orchestrator_with(vec![
            ScriptedResponse::ToolCalls {
                text: String::new(),
                calls: vec![capture_call("G")],
            },
            ScriptedResponse::Text("ok".into()),
            ScriptedResponse::Text("done".into()),
        ]);
        orch.run("G").await.unwrap();

        let mut snap = orch.state();
        snap.phase = WorkflowPhase::Idle;
        snap.plan = None;

        let fresh = orch.state();
        assert_eq!(fresh.phase, WorkflowPhase::Complete);
        assert!(fresh.plan.is_some());
    }
}
