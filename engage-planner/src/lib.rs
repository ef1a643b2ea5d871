#![deny(missing_docs)]
//! The planner driver: one bounded LLM turn, with `explore` tool fan-out and
//! validation-retry feedback.
//!
//! Mirrors the teacher's `neuron-op-react::ReactOperator::execute` loop
//! shape (call model → dispatch tools → feed results back → repeat, capped)
//! but narrows the tool set to exactly two tools (`explore`,
//! `submit_actions`) and layers a second, outer retry loop around action
//! validation that the teacher's generic ReAct loop has no equivalent of.
//! Concurrent `explore` dispatch follows `neuron-orch-local::LocalOrch`'s
//! bounded fan-out, generalized here to a semaphore-gated `join_all` per the
//! concurrency design (a plain `join_all` over a `Vec` of futures, not
//! spawned tasks, since `explore` calls don't need to outlive this turn).

use std::sync::Arc;

use futures::future::join_all;
use serde_json::json;
use tokio::sync::Semaphore;

use engage_core::{CallContext, EngagementConfig, Explorer, LlmClient};
use engage_types::{
    Action, ActionBatch, FatalError, LlmTurn, Message, RetryableError, Thoroughness, ToolCall,
    ToolSpec, ValidationError,
};
use engage_validate::{format_critique, validate, ValidationContext};

const EXPLORE_TOOL: &str = "explore";
const SUBMIT_ACTIONS_TOOL: &str = "submit_actions";

/// Failure surfaced by [`PlannerDriver::run_cycle`].
#[derive(Debug)]
pub enum PlannerError {
    /// Transient; the caller should fold this into the engagement's own
    /// retryable-error handling.
    Retryable(RetryableError),
    /// Semantic; the caller should fold this into the engagement's own
    /// fatal-error handling.
    Fatal(FatalError),
}

impl From<RetryableError> for PlannerError {
    fn from(e: RetryableError) -> Self {
        Self::Retryable(e)
    }
}

impl From<FatalError> for PlannerError {
    fn from(e: FatalError) -> Self {
        Self::Fatal(e)
    }
}

impl std::fmt::Display for PlannerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retryable(e) => write!(f, "{e}"),
            Self::Fatal(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PlannerError {}

/// Result of one planner cycle. `batch` is `None` when the model ended the
/// turn without ever calling `submit_actions` — either because its final
/// text carried no actions, or because it deliberately resubmitted zero
/// actions on a validation retry (Testable Property: the engagement returns
/// success with no store mutations in that case).
#[derive(Debug, Clone, Default)]
pub struct PlannerOutcome {
    /// The validated batch to execute, if any.
    pub batch: Option<ActionBatch>,
}

enum SolicitOutcome {
    NoActions,
    Submitted { batch: ActionBatch, tool_call_id: String },
}

/// Drives one bounded planner turn to either a validated [`ActionBatch`] or
/// a no-op outcome.
pub struct PlannerDriver {
    llm: Arc<dyn LlmClient>,
    explorer: Arc<dyn Explorer>,
    config: EngagementConfig,
}

impl PlannerDriver {
    /// Build a driver over the given LLM client and explorer.
    pub fn new(llm: Arc<dyn LlmClient>, explorer: Arc<dyn Explorer>, config: EngagementConfig) -> Self {
        Self { llm, explorer, config }
    }

    fn tool_specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: EXPLORE_TOOL.to_string(),
                description: "Search the repository for information relevant to the issue."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "thoroughness": {"type": "string", "enum": ["quick", "medium", "thorough"]},
                    },
                    "required": ["query"],
                }),
            },
            ToolSpec {
                name: SUBMIT_ACTIONS_TOOL.to_string(),
                description: "Submit the batch of actions to apply for this turn.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "actions": {"type": "array", "items": {"type": "object"}},
                        "reasoning": {"type": "string"},
                    },
                    "required": ["actions", "reasoning"],
                }),
            },
        ]
    }

    /// Run one planner cycle over `messages` (already seeded by the context
    /// builder), validating against `validation_ctx` and retrying with a
    /// formatted critique up to `max_validation_retries` additional times.
    #[tracing::instrument(skip(self, messages, validation_ctx, ctx))]
    pub async fn run_cycle(
        &self,
        mut messages: Vec<Message>,
        validation_ctx: &ValidationContext,
        ctx: &CallContext,
    ) -> Result<PlannerOutcome, PlannerError> {
        for attempt in 0..=self.config.max_validation_retries {
            let outcome = self.solicit_batch(&mut messages, ctx).await?;
            let (batch, tool_call_id) = match outcome {
                SolicitOutcome::NoActions => return Ok(PlannerOutcome { batch: None }),
                SolicitOutcome::Submitted { batch, tool_call_id } => (batch, tool_call_id),
            };

            // A deliberate empty resubmission on a retry ends the cycle
            // successfully rather than re-flagging `EmptyBatch`.
            if attempt > 0 && batch.actions.is_empty() {
                return Ok(PlannerOutcome { batch: None });
            }

            let errors = validate(&batch, validation_ctx);
            if errors.is_empty() {
                return Ok(PlannerOutcome { batch: Some(batch) });
            }

            if attempt == self.config.max_validation_retries {
                return Err(FatalError::ValidationExhausted(errors).into());
            }

            let critique = format_critique(&errors);
            messages.push(Message::tool_result(tool_call_id, critique));
        }
        unreachable!("loop always returns or escalates within max_validation_retries + 1 attempts")
    }

    /// Run the inner explore/submit loop: call the model, dispatch any
    /// `explore` calls and feed results back, until `submit_actions` is
    /// called or the model stops calling tools at all.
    async fn solicit_batch(
        &self,
        messages: &mut Vec<Message>,
        ctx: &CallContext,
    ) -> Result<SolicitOutcome, PlannerError> {
        for _round in 0..self.config.max_explore_rounds.max(1) {
            let turn: LlmTurn = self
                .llm
                .complete(messages, &Self::tool_specs(), ctx)
                .await
                .map_err(RetryableError::from)?;

            if let Some(call) = turn.tool_calls.iter().find(|c| c.name == SUBMIT_ACTIONS_TOOL) {
                messages.push(Message::assistant_tool_calls(turn.tool_calls.clone()));
                let batch: ActionBatch = serde_json::from_value(call.arguments.clone())
                    .map_err(|e| FatalError::UnparsableOutput(format!("submit_actions: {e}")))?;
                return Ok(SolicitOutcome::Submitted { batch, tool_call_id: call.id.clone() });
            }

            let explore_calls: Vec<ToolCall> = turn
                .tool_calls
                .iter()
                .filter(|c| c.name == EXPLORE_TOOL)
                .cloned()
                .collect();

            if explore_calls.is_empty() {
                return Ok(SolicitOutcome::NoActions);
            }

            messages.push(Message::assistant_tool_calls(turn.tool_calls.clone()));
            let results = self.dispatch_explores(&explore_calls, ctx).await;
            messages.extend(results);
        }

        Err(RetryableError::Other(
            format!(
                "planner exhausted {} explore round(s) without a submit_actions call",
                self.config.max_explore_rounds
            )
            .into(),
        )
        .into())
    }

    async fn dispatch_explores(&self, calls: &[ToolCall], ctx: &CallContext) -> Vec<Message> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_explorers.max(1)));
        let futures = calls.iter().map(|call| {
            let semaphore = semaphore.clone();
            let explorer = self.explorer.clone();
            let ctx = ctx.clone();
            let call = call.clone();
            async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                let (query, thoroughness) = parse_explore_args(&call.arguments);
                let content = match explorer.explore(&query, thoroughness, &ctx).await {
                    Ok(text) => text,
                    Err(e) => format!("explore failed: {e}"),
                };
                Message::tool_result(call.id, content)
            }
        });
        join_all(futures).await
    }
}

fn parse_explore_args(args: &serde_json::Value) -> (String, Thoroughness) {
    let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let thoroughness = args
        .get("thoroughness")
        .and_then(|v| v.as_str())
        .and_then(Thoroughness::parse)
        .unwrap_or(Thoroughness::Medium);
    (query, thoroughness)
}

/// Surfaces [`ValidationError`]s for callers that want to render or log a
/// planner's last rejected batch independent of the critique text.
pub fn describe_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engage_types::{ExploreError, LlmError};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedLlm {
        turns: Mutex<VecDeque<LlmTurn>>,
    }

    impl ScriptedLlm {
        fn new(turns: Vec<LlmTurn>) -> Self {
            Self { turns: Mutex::new(turns.into_iter().collect()) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolSpec],
            _ctx: &CallContext,
        ) -> Result<LlmTurn, LlmError> {
            self.turns
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::CallFailed("script exhausted".into()))
        }
    }

    struct FakeExplorer;

    #[async_trait]
    impl Explorer for FakeExplorer {
        async fn explore(
            &self,
            query: &str,
            _thoroughness: Thoroughness,
            _ctx: &CallContext,
        ) -> Result<String, ExploreError> {
            Ok(format!("found: {query}"))
        }
    }

    fn submit_turn(id: &str, actions: serde_json::Value, reasoning: &str) -> LlmTurn {
        LlmTurn {
            content: None,
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                name: SUBMIT_ACTIONS_TOOL.to_string(),
                arguments: json!({"actions": actions, "reasoning": reasoning}),
            }],
            tokens: Default::default(),
        }
    }

    fn explore_turn(id: &str, query: &str) -> LlmTurn {
        LlmTurn {
            content: None,
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                name: EXPLORE_TOOL.to_string(),
                arguments: json!({"query": query}),
            }],
            tokens: Default::default(),
        }
    }

    fn comment_action(content: &str) -> serde_json::Value {
        json!([{"type": "post_comment", "content": content}])
    }

    #[tokio::test]
    async fn valid_batch_returned_on_first_attempt() {
        let llm = Arc::new(ScriptedLlm::new(vec![submit_turn("c1", comment_action("hi"), "r")]));
        let driver = PlannerDriver::new(llm, Arc::new(FakeExplorer), EngagementConfig::default());
        let outcome = driver
            .run_cycle(vec![], &ValidationContext::default(), &CallContext::background())
            .await
            .unwrap();
        let batch = outcome.batch.expect("batch present");
        assert_eq!(batch.actions.len(), 1);
        assert!(matches!(batch.actions[0], Action::PostComment { .. }));
    }

    #[tokio::test]
    async fn invalid_batch_retries_then_succeeds() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            submit_turn("c1", comment_action(""), "r1"),
            submit_turn("c2", comment_action("now with content"), "r2"),
        ]));
        let driver = PlannerDriver::new(llm, Arc::new(FakeExplorer), EngagementConfig::default());
        let outcome = driver
            .run_cycle(vec![], &ValidationContext::default(), &CallContext::background())
            .await
            .unwrap();
        assert!(outcome.batch.is_some());
    }

    #[tokio::test]
    async fn zero_actions_on_retry_ends_cycle_successfully() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            submit_turn("c1", comment_action(""), "r1"),
            submit_turn("c2", json!([]), "giving up"),
        ]));
        let driver = PlannerDriver::new(llm, Arc::new(FakeExplorer), EngagementConfig::default());
        let outcome = driver
            .run_cycle(vec![], &ValidationContext::default(), &CallContext::background())
            .await
            .unwrap();
        assert!(outcome.batch.is_none());
    }

    #[tokio::test]
    async fn validation_exhausted_is_fatal() {
        let mut cfg = EngagementConfig::default();
        cfg.max_validation_retries = 1;
        let llm = Arc::new(ScriptedLlm::new(vec![
            submit_turn("c1", comment_action(""), "r1"),
            submit_turn("c2", comment_action(""), "r2"),
        ]));
        let driver = PlannerDriver::new(llm, Arc::new(FakeExplorer), cfg);
        let err = driver
            .run_cycle(vec![], &ValidationContext::default(), &CallContext::background())
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Fatal(FatalError::ValidationExhausted(_))));
    }

    #[tokio::test]
    async fn explore_round_trip_feeds_result_back_before_submit() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            explore_turn("e1", "how is auth handled"),
            submit_turn("c1", comment_action("found it"), "r"),
        ]));
        let driver = PlannerDriver::new(llm, Arc::new(FakeExplorer), EngagementConfig::default());
        let outcome = driver
            .run_cycle(vec![], &ValidationContext::default(), &CallContext::background())
            .await
            .unwrap();
        assert!(outcome.batch.is_some());
    }

    #[tokio::test]
    async fn no_tool_calls_is_a_no_op_cycle() {
        let llm = Arc::new(ScriptedLlm::new(vec![LlmTurn {
            content: Some("nothing to do here".into()),
            tool_calls: vec![],
            tokens: Default::default(),
        }]));
        let driver = PlannerDriver::new(llm, Arc::new(FakeExplorer), EngagementConfig::default());
        let outcome = driver
            .run_cycle(vec![], &ValidationContext::default(), &CallContext::background())
            .await
            .unwrap();
        assert!(outcome.batch.is_none());
    }

    #[tokio::test]
    async fn unparsable_submit_actions_is_fatal() {
        let llm = Arc::new(ScriptedLlm::new(vec![LlmTurn {
            content: None,
            tool_calls: vec![ToolCall {
                id: "c1".into(),
                name: SUBMIT_ACTIONS_TOOL.to_string(),
                arguments: json!({"not_actions_at_all": true}),
            }],
            tokens: Default::default(),
        }]));
        let driver = PlannerDriver::new(llm, Arc::new(FakeExplorer), EngagementConfig::default());
        let err = driver
            .run_cycle(vec![], &ValidationContext::default(), &CallContext::background())
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Fatal(FatalError::UnparsableOutput(_))));
    }

    #[tokio::test]
    async fn exhausting_explore_rounds_without_submit_is_retryable() {
        let mut cfg = EngagementConfig::default();
        cfg.max_explore_rounds = 2;
        let llm = Arc::new(ScriptedLlm::new(vec![
            explore_turn("e1", "q1"),
            explore_turn("e2", "q2"),
        ]));
        let driver = PlannerDriver::new(llm, Arc::new(FakeExplorer), cfg);
        let err = driver
            .run_cycle(vec![], &ValidationContext::default(), &CallContext::background())
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Retryable(RetryableError::Other(_))));
    }

    #[test]
    fn describe_errors_joins_display_forms() {
        let errors = vec![ValidationError::EmptyBatch];
        assert_eq!(describe_errors(&errors), "batch has zero actions");
    }
}
