//! Guarded execution loop.
//!
//! An explicit state machine that alternates between asking a model for
//! the next step and executing the tool calls it proposes, with guardrail
//! checks before the loop starts and before every tool call. The loop is
//! bounded by an iteration cap, so it always terminates with a structured
//! outcome.

use async_trait::async_trait;
use tracing::{debug, warn};

use carekey_core::{AccessScope, DataCategory};

use crate::guardrail::{GuardrailContext, GuardrailDecision, GuardrailSet};
use crate::persona::Persona;
use crate::predicate::PredicateContext;

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: u32 = 16;

/// A tool invocation proposed by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Tool name, matched against the persona's allowlist.
    pub tool: String,
    /// Opaque arguments, rendered as text for guardrail inspection.
    pub arguments: String,
    /// Data categories the call would touch.
    pub categories: Vec<DataCategory>,
}

/// One reply from the model.
#[derive(Debug, Clone)]
pub struct ModelReply {
    /// Free text for the transcript.
    pub text: String,
    /// Tool calls to execute before asking again. Empty means done.
    pub tool_calls: Vec<ToolCall>,
}

/// Produces the next step given the transcript so far.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Ask for the next reply.
    async fn complete(&self, transcript: &[String]) -> anyhow::Result<ModelReply>;
}

/// Executes a permitted tool call.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run the call and return its textual result.
    async fn execute(&self, call: &ToolCall) -> anyhow::Result<String>;
}

/// Loop phases. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting on the model for the next step.
    AwaitingModel,
    /// Executing the tool calls from the latest reply.
    ExecutingTools,
    /// Finished with a final text.
    Done,
    /// Stopped on a block or an error.
    Failed,
}

/// How a guarded loop ended.
#[derive(Debug, Clone)]
pub enum LoopOutcome {
    /// The model finished.
    Completed {
        /// Final model text.
        text: String,
        /// How many model turns ran.
        iterations: u32,
        /// Notes attached by annotate-level guardrails.
        annotations: Vec<String>,
    },
    /// A guardrail refused the input or a tool call.
    Blocked {
        /// Why.
        reason: String,
        /// Safer alternative, when the rail offered one.
        suggestion: Option<String>,
    },
    /// The iteration cap was reached before the model finished.
    IterationCapReached,
}

/// A bounded, guardrail-checked model/tool loop.
pub struct GuardedLoop<'a> {
    persona: &'a Persona,
    rails: GuardrailSet,
    grant_scope: Option<&'a AccessScope>,
    session_started_at_ms: i64,
    max_iterations: u32,
}

impl<'a> GuardedLoop<'a> {
    /// Build a loop for a persona, instantiating its guardrails.
    pub fn new(
        persona: &'a Persona,
        grant_scope: Option<&'a AccessScope>,
        session_started_at_ms: i64,
    ) -> Self {
        Self {
            persona,
            rails: GuardrailSet::new(persona.guardrails.clone()),
            grant_scope,
            session_started_at_ms,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Override the iteration cap.
    pub fn with_max_iterations(mut self, cap: u32) -> Self {
        self.max_iterations = cap.max(1);
        self
    }

    fn guard_ctx(
        &self,
        action_text: String,
        categories: Vec<DataCategory>,
        now_ms: i64,
    ) -> GuardrailContext<'a> {
        GuardrailContext {
            action_text,
            touched_categories: categories,
            session_started_at_ms: self.session_started_at_ms,
            now_ms,
            grant_scope: self.grant_scope,
            fields: PredicateContext::new(),
        }
    }

    /// Run the loop to a terminal outcome.
    pub async fn run(
        mut self,
        input: &str,
        model: &dyn ModelClient,
        tools: &dyn ToolExecutor,
        now_ms: i64,
    ) -> anyhow::Result<LoopOutcome> {
        // Check the input itself before any model turn.
        let ctx = self.guard_ctx(input.to_string(), Vec::new(), now_ms);
        if let GuardrailDecision::Block { reason, suggestion } = self.rails.check(&ctx) {
            warn!(persona = %self.persona.id, %reason, "input blocked");
            return Ok(LoopOutcome::Blocked { reason, suggestion });
        }

        let mut transcript = vec![input.to_string()];
        let mut annotations = Vec::new();
        let mut pending: Vec<ToolCall> = Vec::new();
        let mut blocked: Option<LoopOutcome> = None;
        let mut state = LoopState::AwaitingModel;
        let mut iterations = 0u32;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if iterations == self.max_iterations {
                        warn!(persona = %self.persona.id, cap = self.max_iterations, "iteration cap reached");
                        return Ok(LoopOutcome::IterationCapReached);
                    }
                    iterations += 1;

                    let reply = model.complete(&transcript).await?;
                    transcript.push(reply.text.clone());

                    if reply.tool_calls.is_empty() {
                        LoopState::Done
                    } else {
                        for call in &reply.tool_calls {
                            debug!(tool = %call.tool, "tool call proposed");
                        }
                        pending = reply.tool_calls;
                        LoopState::ExecutingTools
                    }
                }
                LoopState::ExecutingTools => {
                    let calls = std::mem::take(&mut pending);
                    match self
                        .execute_calls(&calls, tools, &mut transcript, &mut annotations, now_ms)
                        .await?
                    {
                        Some(outcome) => {
                            blocked = Some(outcome);
                            LoopState::Failed
                        }
                        None => LoopState::AwaitingModel,
                    }
                }
                LoopState::Done => {
                    let text = transcript.last().cloned().unwrap_or_default();
                    return Ok(LoopOutcome::Completed {
                        text,
                        iterations,
                        annotations,
                    });
                }
                LoopState::Failed => {
                    return Ok(blocked.unwrap_or(LoopOutcome::IterationCapReached));
                }
            };
        }
    }

    async fn execute_calls(
        &mut self,
        calls: &[ToolCall],
        tools: &dyn ToolExecutor,
        transcript: &mut Vec<String>,
        annotations: &mut Vec<String>,
        now_ms: i64,
    ) -> anyhow::Result<Option<LoopOutcome>> {
        for call in calls {
            if !self.persona.allows_tool(&call.tool) {
                return Ok(Some(LoopOutcome::Blocked {
                    reason: format!("tool '{}' not permitted for persona '{}'", call.tool, self.persona.id),
                    suggestion: None,
                }));
            }

            let ctx = self.guard_ctx(
                format!("{} {}", call.tool, call.arguments),
                call.categories.clone(),
                now_ms,
            );
            match self.rails.check(&ctx) {
                GuardrailDecision::Block { reason, suggestion } => {
                    warn!(tool = %call.tool, %reason, "tool call blocked");
                    return Ok(Some(LoopOutcome::Blocked { reason, suggestion }));
                }
                GuardrailDecision::Annotate { note } => annotations.push(note),
                GuardrailDecision::Allow => {}
            }

            let result = tools.execute(call).await?;
            transcript.push(result);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::Guardrail;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replies with a fixed script: tool calls for the first n turns, then
    /// a final text.
    struct ScriptedModel {
        tool_turns: u32,
        turn: AtomicU32,
        categories: Vec<DataCategory>,
    }

    impl ScriptedModel {
        fn new(tool_turns: u32, categories: Vec<DataCategory>) -> Self {
            Self {
                tool_turns,
                turn: AtomicU32::new(0),
                categories,
            }
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn complete(&self, _transcript: &[String]) -> anyhow::Result<ModelReply> {
            let turn = self.turn.fetch_add(1, Ordering::SeqCst);
            if turn < self.tool_turns {
                Ok(ModelReply {
                    text: format!("turn {turn}"),
                    tool_calls: vec![ToolCall {
                        tool: "read_records".into(),
                        arguments: "latest".into(),
                        categories: self.categories.clone(),
                    }],
                })
            } else {
                Ok(ModelReply {
                    text: "summary complete".into(),
                    tool_calls: Vec::new(),
                })
            }
        }
    }

    struct EchoTools;

    #[async_trait]
    impl ToolExecutor for EchoTools {
        async fn execute(&self, call: &ToolCall) -> anyhow::Result<String> {
            Ok(format!("ran {}", call.tool))
        }
    }

    fn persona() -> Persona {
        Persona::new("diagnostics", "Diagnostics").with_tool("read_records")
    }

    #[tokio::test]
    async fn test_loop_completes_with_tool_turns() {
        let persona = persona();
        let model = ScriptedModel::new(2, Vec::new());
        let outcome = GuardedLoop::new(&persona, None, 0)
            .run("summarize latest", &model, &EchoTools, 0)
            .await
            .unwrap();

        match outcome {
            LoopOutcome::Completed {
                text, iterations, ..
            } => {
                assert_eq!(text, "summary complete");
                assert_eq!(iterations, 3);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blocked_input_never_reaches_model() {
        let mut persona = persona();
        persona.guardrails.push(Guardrail::NeverAllow {
            patterns: vec!["delete all".into()],
        });
        let model = ScriptedModel::new(0, Vec::new());

        let outcome = GuardedLoop::new(&persona, None, 0)
            .run("delete all records", &model, &EchoTools, 0)
            .await
            .unwrap();

        assert!(matches!(outcome, LoopOutcome::Blocked { .. }));
        assert_eq!(model.turn.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unpermitted_tool_is_blocked() {
        let persona = Persona::new("diagnostics", "Diagnostics"); // no tools
        let model = ScriptedModel::new(1, Vec::new());

        let outcome = GuardedLoop::new(&persona, None, 0)
            .run("summarize", &model, &EchoTools, 0)
            .await
            .unwrap();

        match outcome {
            LoopOutcome::Blocked { reason, .. } => assert!(reason.contains("read_records")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scope_limit_blocks_out_of_scope_tool_call() {
        use carekey_core::AccessAction;

        let mut persona = persona();
        persona.guardrails.push(Guardrail::ScopeLimit);
        let scope = AccessScope::new(
            [DataCategory::Exams],
            [AccessAction::Read],
            600,
            "routine follow-up",
        )
        .unwrap();
        let model = ScriptedModel::new(1, vec![DataCategory::Labs]);

        let outcome = GuardedLoop::new(&persona, Some(&scope), 0)
            .run("summarize labs", &model, &EchoTools, 0)
            .await
            .unwrap();

        assert!(matches!(outcome, LoopOutcome::Blocked { .. }));
    }

    #[tokio::test]
    async fn test_iteration_cap_terminates() {
        let persona = persona();
        // Proposes tool calls forever.
        let model = ScriptedModel::new(u32::MAX, Vec::new());

        let outcome = GuardedLoop::new(&persona, None, 0)
            .with_max_iterations(4)
            .run("loop forever", &model, &EchoTools, 0)
            .await
            .unwrap();

        assert!(matches!(outcome, LoopOutcome::IterationCapReached));
        assert_eq!(model.turn.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_annotations_are_collected() {
        let mut persona = persona();
        persona.guardrails.push(Guardrail::RequireHumanValidation {
            patterns: vec!["read_records".into()],
        });
        let model = ScriptedModel::new(1, Vec::new());

        let outcome = GuardedLoop::new(&persona, None, 0)
            .run("summarize", &model, &EchoTools, 0)
            .await
            .unwrap();

        match outcome {
            LoopOutcome::Completed { annotations, .. } => {
                assert_eq!(annotations.len(), 1);
                assert!(annotations[0].contains("read_records"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
