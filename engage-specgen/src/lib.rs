#![deny(missing_docs)]
//! The spec-generator driver: a second bounded LLM loop, restricted to
//! `locate`/`submit_spec`, that turns resolved gaps and findings into a
//! single markdown implementation spec.
//!
//! Shares the teacher-grounded loop shape with `engage-planner`
//! (`neuron-op-react::ReactOperator::execute`: call model, dispatch tools,
//! feed results back, repeat) but with its own budget: `maxLocateCalls` is
//! session-wide rather than per-turn, and an exhausted `maxSpecIterations`
//! budget degrades to a partial spec rather than a hard failure — there is
//! always something worth posting back to the tracker.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::json;
use tokio::sync::Semaphore;

use engage_core::{CallContext, EngagementConfig, Locator, SpecGenRequest, SpecGenResult, SpecGenerator};
use engage_types::{LlmError, LlmTurn, Message, ToolCall, ToolSpec};

const LOCATE_TOOL: &str = "locate";
const SUBMIT_SPEC_TOOL: &str = "submit_spec";
const LOCATE_LIMIT_NUDGE: &str = "⚠️ LOCATE LIMIT REACHED — submit now";

/// Drives the bounded spec-generation loop to completion (or a documented
/// partial-result fallback).
pub struct SpecGenDriver {
    llm: Arc<dyn engage_core::LlmClient>,
    locator: Arc<dyn Locator>,
    config: EngagementConfig,
}

impl SpecGenDriver {
    /// Build a driver over the given LLM client and locator.
    pub fn new(
        llm: Arc<dyn engage_core::LlmClient>,
        locator: Arc<dyn Locator>,
        config: EngagementConfig,
    ) -> Self {
        Self { llm, locator, config }
    }

    fn tool_specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: LOCATE_TOOL.to_string(),
                description: "Verify the exact file location of something already explored."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"],
                }),
            },
            ToolSpec {
                name: SUBMIT_SPEC_TOOL.to_string(),
                description: "Submit the final implementation spec as markdown.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {"spec": {"type": "string"}},
                    "required": ["spec"],
                }),
            },
        ]
    }

    async fn dispatch_locates(&self, calls: &[ToolCall], ctx: &CallContext) -> Vec<Message> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_spec_explorers.max(1)));
        let futures = calls.iter().map(|call| {
            let semaphore = semaphore.clone();
            let locator = self.locator.clone();
            let ctx = ctx.clone();
            let call = call.clone();
            async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                let query = call.arguments.get("query").and_then(|v| v.as_str()).unwrap_or("");
                let content = match locator.locate(query, &ctx).await {
                    Ok(text) => text,
                    Err(e) => format!("locate failed: {e}"),
                };
                Message::tool_result(call.id, content)
            }
        });
        join_all(futures).await
    }
}

#[async_trait::async_trait]
impl SpecGenerator for SpecGenDriver {
    #[tracing::instrument(skip(self, request, ctx), fields(issue_id = request.issue.id))]
    async fn generate(
        &self,
        request: SpecGenRequest,
        ctx: &CallContext,
    ) -> Result<SpecGenResult, LlmError> {
        let mut messages = build_messages(&request);
        let mut locate_calls_used = 0usize;
        let mut last_text: Option<String> = None;

        for _iteration in 0..self.config.max_spec_iterations {
            let turn: LlmTurn = self.llm.complete(&messages, &Self::tool_specs(), ctx).await?;
            if let Some(text) = &turn.content {
                if !text.trim().is_empty() {
                    last_text = Some(text.clone());
                }
            }

            if let Some(call) = turn.tool_calls.iter().find(|c| c.name == SUBMIT_SPEC_TOOL) {
                let spec_text = call
                    .arguments
                    .get("spec")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| LlmError::UnparsableOutput("submit_spec: missing spec field".into()))?;
                return Ok(SpecGenResult { spec_text });
            }

            let locate_calls: Vec<ToolCall> = turn
                .tool_calls
                .iter()
                .filter(|c| c.name == LOCATE_TOOL)
                .cloned()
                .collect();

            if locate_calls.is_empty() {
                // Model produced neither locate nor submit_spec; nudge it
                // to finish rather than spinning on a message-less turn.
                messages.push(Message::user(
                    "No tool call recognized. Call locate or submit_spec.",
                    None,
                ));
                continue;
            }

            messages.push(Message::assistant_tool_calls(turn.tool_calls.clone()));

            if locate_calls_used + locate_calls.len() > self.config.max_locate_calls {
                messages.push(Message::user(LOCATE_LIMIT_NUDGE, None));
                continue;
            }

            locate_calls_used += locate_calls.len();
            let results = self.dispatch_locates(&locate_calls, ctx).await;
            messages.extend(results);
        }

        tracing::warn!(
            issue_id = request.issue.id,
            "spec generation exhausted its iteration budget; posting a partial draft"
        );
        let draft = last_text.unwrap_or_else(|| {
            format!(
                "## Implementation approach for: {}\n\n(no draft content was produced)",
                request.issue.title
            )
        });
        Ok(SpecGenResult {
            spec_text: format!(
                "{draft}\n\n---\n_Note: this draft is partial — spec generation hit its iteration budget before submitting a final spec._"
            ),
        })
    }
}

fn build_messages(request: &SpecGenRequest) -> Vec<Message> {
    let mut out = vec![Message::system(
        "You produce a single markdown implementation spec from resolved issue context. \
         Use locate only to verify exact file locations already found during exploration; \
         call submit_spec with the final markdown when ready.",
    )];

    let mut dump = String::new();
    dump.push_str(&format!("# Issue: {}\n\n{}\n\n", request.issue.title, request.issue.description));
    dump.push_str(&format!("## Planner Summary\n{}\n\n", request.context_summary));
    dump.push_str(&format!("## Proceed Signal\n{}\n\n", request.proceed_signal));

    dump.push_str("## Resolved Gaps\n");
    if request.gaps.is_empty() {
        dump.push_str("(none)\n");
    } else {
        for gap in &request.gaps {
            let reason = gap.closed_reason.map(|r| format!("{r:?}")).unwrap_or_else(|| "-".into());
            let note = gap.closed_note.as_deref().unwrap_or("-");
            dump.push_str(&format!("- {} — reason: {reason}, note: {note}\n", gap.question));
        }
    }
    dump.push('\n');

    dump.push_str("## Code Findings\n");
    if request.findings.is_empty() {
        dump.push_str("(none)\n");
    } else {
        for finding in &request.findings {
            dump.push_str(&format!("- {}\n", finding.synthesis));
            for source in &finding.sources {
                dump.push_str(&format!("  - {}\n", source.location));
            }
        }
    }
    dump.push('\n');

    dump.push_str("## Workspace Learnings\n");
    if request.learnings.is_empty() {
        dump.push_str("(none)\n");
    } else {
        for learning in &request.learnings {
            dump.push_str(&format!("- [{:?}] {}\n", learning.learning_type, learning.content));
        }
    }

    out.push(Message::user(dump, None));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engage_core::CallContext;
    use engage_types::{CodeFinding, ExploreError, Issue, IssueState, Participant, Source, TrackerProvider};
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
    impl engage_core::LlmClient for ScriptedLlm {
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

    struct FakeLocator;

    #[async_trait]
    impl Locator for FakeLocator {
        async fn locate(&self, query: &str, _ctx: &CallContext) -> Result<String, ExploreError> {
            Ok(format!("located: {query}"))
        }
    }

    fn bare_request() -> SpecGenRequest {
        SpecGenRequest {
            issue: Issue {
                id: 1,
                integration_id: 1,
                external_issue_id: "1".into(),
                state: IssueState::Processing,
                title: "add retries".into(),
                description: "d".into(),
                reporter: Participant { user_id: "u1".into(), username: "alice".into() },
                assignees: vec![],
                members: vec![],
                discussions: vec![],
                code_findings: vec![CodeFinding {
                    id: 1,
                    synthesis: "uses tokio::time::sleep for backoff".into(),
                    sources: vec![Source { location: "retry.rs".into(), snippet: "sleep".into(), kind: None }],
                }],
                spec: None,
                spec_status: None,
                provider: TrackerProvider::GitHub,
            },
            context_summary: "ready to spec".into(),
            gaps: vec![],
            findings: vec![],
            learnings: vec![],
            proceed_signal: "go".into(),
        }
    }

    fn submit_spec_turn(id: &str, spec: &str) -> LlmTurn {
        LlmTurn {
            content: None,
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                name: SUBMIT_SPEC_TOOL.to_string(),
                arguments: json!({"spec": spec}),
            }],
            tokens: Default::default(),
        }
    }

    fn locate_turn(id: &str, query: &str) -> LlmTurn {
        LlmTurn {
            content: None,
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                name: LOCATE_TOOL.to_string(),
                arguments: json!({"query": query}),
            }],
            tokens: Default::default(),
        }
    }

    #[tokio::test]
    async fn returns_submitted_spec_verbatim() {
        let llm = Arc::new(ScriptedLlm::new(vec![submit_spec_turn("s1", "# Spec\n\nDo the thing.")]));
        let driver = SpecGenDriver::new(llm, Arc::new(FakeLocator), EngagementConfig::default());
        let result = driver.generate(bare_request(), &CallContext::background()).await.unwrap();
        assert_eq!(result.spec_text, "# Spec\n\nDo the thing.");
    }

    #[tokio::test]
    async fn locate_round_trip_precedes_submit() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            locate_turn("l1", "where is retry.rs"),
            submit_spec_turn("s1", "# Spec\n\nSee retry.rs."),
        ]));
        let driver = SpecGenDriver::new(llm, Arc::new(FakeLocator), EngagementConfig::default());
        let result = driver.generate(bare_request(), &CallContext::background()).await.unwrap();
        assert_eq!(result.spec_text, "# Spec\n\nSee retry.rs.");
    }

    #[tokio::test]
    async fn locate_budget_exceeded_nudges_instead_of_dispatching() {
        let mut cfg = EngagementConfig::default();
        cfg.max_locate_calls = 1;
        let llm = Arc::new(ScriptedLlm::new(vec![
            locate_turn("l1", "q1"),
            locate_turn("l2", "q2"),
            submit_spec_turn("s1", "# Spec\n\ndone."),
        ]));
        let driver = SpecGenDriver::new(llm, Arc::new(FakeLocator), cfg);
        let result = driver.generate(bare_request(), &CallContext::background()).await.unwrap();
        assert_eq!(result.spec_text, "# Spec\n\ndone.");
    }

    #[tokio::test]
    async fn exhausted_iterations_produce_partial_spec_with_note() {
        let mut cfg = EngagementConfig::default();
        cfg.max_spec_iterations = 2;
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmTurn { content: Some("draft: use exponential backoff".into()), tool_calls: vec![], tokens: Default::default() },
            LlmTurn { content: Some("still drafting".into()), tool_calls: vec![], tokens: Default::default() },
        ]));
        let driver = SpecGenDriver::new(llm, Arc::new(FakeLocator), cfg);
        let result = driver.generate(bare_request(), &CallContext::background()).await.unwrap();
        assert!(result.spec_text.contains("still drafting"));
        assert!(result.spec_text.contains("partial"));
    }
}
