#![deny(missing_docs)]
//! The engagement orchestrator: the top-level state machine that claims an
//! issue, posts a first-contact acknowledgment, drains pending events
//! through bounded planner cycles, and always releases the claim.
//!
//! Grounded on the claim/dispatch/release shape of
//! `neuron-orch-local::LocalOrch::dispatch` generalized from a single
//! request-response call into a multi-cycle drain loop with its own
//! deferred-release discipline — the one piece of control flow this
//! workspace's teacher has no direct analogue for, since `LocalOrch` never
//! owns a claim across calls.

use std::sync::Arc;

use rand::seq::SliceRandom;

use engage_context::{build_planner_messages, ContextInput, ReplyHint};
use engage_core::{
    CallContext, DiscussionRef, EngagementConfig, EventLogStore, FollowUpEvent, GapStore,
    IntegrationStore, IssueStore, LearningStore, QueueProducer, TrackerAdapter,
};
use engage_exec::Executor;
use engage_planner::{PlannerDriver, PlannerError};
use engage_types::{FatalError, Gap, Issue, RetryableError, StoreError};
use engage_validate::{GapView, ValidationContext};

const ACK_MESSAGES: &[&str] = &[
    "On it, taking a look now.",
    "Thanks for the ping, exploring the repository now.",
    "Got it, digging into this.",
    "Looking into this, back shortly.",
];

/// Input to one engagement invocation.
#[derive(Debug, Clone)]
pub struct EngagementInput {
    /// The issue to engage on.
    pub issue_id: i64,
    /// The event log entry that triggered this invocation.
    pub event_log_id: i64,
    /// The kind of event that triggered this invocation.
    pub event_type: String,
    /// The discussion thread this event replied within, if any.
    pub trigger_thread_id: Option<String>,
}

/// Every capability the orchestrator needs, bundled the same way
/// [`engage_exec::ExecutorDeps`] bundles the executor's.
#[derive(Clone)]
pub struct OrchestratorDeps {
    /// Issue lifecycle and claim operations.
    pub issues: Arc<dyn IssueStore>,
    /// Gap lookups feeding context and validation.
    pub gaps: Arc<dyn GapStore>,
    /// Workspace learnings feeding context.
    pub learnings: Arc<dyn LearningStore>,
    /// Workspace/integration lookups.
    pub integrations: Arc<dyn IntegrationStore>,
    /// Per-issue event audit log.
    pub events: Arc<dyn EventLogStore>,
    /// Follow-up event producer.
    pub queue: Arc<dyn QueueProducer>,
    /// Tracker comment/reply operations.
    pub tracker: Arc<dyn TrackerAdapter>,
    /// Bounded planner-turn driver.
    pub planner: Arc<PlannerDriver>,
    /// Action executor.
    pub executor: Arc<Executor>,
    /// The bot's stable account ID, for first-contact detection.
    pub bot_user_id: String,
    /// The bot's display username, used in the context builder and for
    /// first-contact detection.
    pub bot_username: String,
    /// Engagement budgets.
    pub config: EngagementConfig,
}

/// Failure from [`Orchestrator::handle_engagement`], mirroring the two-kind
/// taxonomy the rest of the workspace uses for control flow.
#[derive(Debug, thiserror::Error)]
pub enum EngagementError {
    /// Transient; the outer queue retries with its own backoff.
    #[error(transparent)]
    Retryable(#[from] RetryableError),
    /// Semantic; logged and not retried.
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

impl From<PlannerError> for EngagementError {
    fn from(e: PlannerError) -> Self {
        match e {
            PlannerError::Retryable(r) => Self::Retryable(r),
            PlannerError::Fatal(f) => Self::Fatal(f),
        }
    }
}

struct FollowUpInfo {
    reason: String,
}

/// Drives one full engagement: claim, optional first-contact ack, drain
/// loop up to `config.max_cycles`, deferred release.
pub struct Orchestrator {
    deps: OrchestratorDeps,
}

impl Orchestrator {
    /// Build an orchestrator over the given dependencies.
    pub fn new(deps: OrchestratorDeps) -> Self {
        Self { deps }
    }

    /// Handle one engagement invocation to completion. Returns `Ok(())`
    /// both when the work succeeded and when another worker already held
    /// the claim — the caller only needs to distinguish "nothing left to
    /// do" from an actual failure.
    #[tracing::instrument(skip(self, ctx), fields(issue_id = input.issue_id, event_type = %input.event_type))]
    pub async fn handle_engagement(
        &self,
        input: EngagementInput,
        ctx: &CallContext,
    ) -> Result<(), EngagementError> {
        let issue_id = input.issue_id;

        let issue = self.deps.issues.get_by_id(issue_id, ctx).await.map_err(|e| {
            if matches!(e, StoreError::NotFound(_)) {
                EngagementError::Fatal(FatalError::IssueNotFound(issue_id))
            } else {
                EngagementError::Retryable(RetryableError::Store(e))
            }
        })?;

        let claimed = self
            .deps
            .issues
            .claim_queued(issue_id, ctx)
            .await
            .map_err(|e| EngagementError::Retryable(RetryableError::Store(e)))?;
        if !claimed {
            return Ok(());
        }

        if !issue.has_bot_contact(&self.deps.bot_user_id, &self.deps.bot_username) {
            self.post_first_contact_ack(&issue, input.trigger_thread_id.as_deref(), ctx).await;
        }

        let outcome = self.drain(issue_id, input.trigger_thread_id.as_deref(), ctx).await;

        let follow_up = match &outcome {
            Ok(info) => info.as_ref().map(|i| FollowUpInfo { reason: i.reason.clone() }),
            Err(_) => None,
        };
        self.release(issue_id, follow_up, ctx).await;

        outcome.map(|_| ())
    }

    async fn drain(
        &self,
        issue_id: i64,
        trigger_thread_id: Option<&str>,
        ctx: &CallContext,
    ) -> Result<Option<FollowUpInfo>, EngagementError> {
        for cycle in 0..self.deps.config.max_cycles {
            let unprocessed = self
                .deps
                .events
                .list_unprocessed_by_issue(issue_id, ctx)
                .await
                .map_err(|e| EngagementError::Retryable(RetryableError::Store(e)))?;

            self.run_planner_cycle(issue_id, trigger_thread_id, ctx).await?;

            let ids: Vec<i64> = unprocessed.iter().map(|e| e.id).collect();
            if !ids.is_empty() {
                if let Err(e) = self.deps.events.mark_batch_processed(&ids, ctx).await {
                    tracing::warn!(issue_id, error = %e, "marking events processed failed");
                }
            }

            let remaining = self
                .deps
                .events
                .list_unprocessed_by_issue(issue_id, ctx)
                .await
                .map_err(|e| EngagementError::Retryable(RetryableError::Store(e)))?;
            if remaining.is_empty() {
                return Ok(None);
            }

            if cycle + 1 == self.deps.config.max_cycles {
                let first = &remaining[0];
                return Ok(Some(FollowUpInfo {
                    reason: format!("{}:{}", first.id, first.event_type),
                }));
            }
        }
        Ok(None)
    }

    async fn run_planner_cycle(
        &self,
        issue_id: i64,
        trigger_thread_id: Option<&str>,
        ctx: &CallContext,
    ) -> Result<(), EngagementError> {
        let issue = self
            .deps
            .issues
            .get_by_id(issue_id, ctx)
            .await
            .map_err(|e| EngagementError::Retryable(RetryableError::Store(e)))?;

        let open_gaps = self
            .deps
            .gaps
            .list_open_by_issue(issue_id, ctx)
            .await
            .map_err(|e| EngagementError::Retryable(RetryableError::Store(e)))?;
        let pending_gaps = self
            .deps
            .gaps
            .list_pending_by_issue(issue_id, ctx)
            .await
            .map_err(|e| EngagementError::Retryable(RetryableError::Store(e)))?;
        let closed_gaps = self
            .deps
            .gaps
            .list_closed_by_issue(issue_id, usize::MAX, ctx)
            .await
            .map_err(|e| EngagementError::Retryable(RetryableError::Store(e)))?;

        let workspace = issue.integration_id.to_string();
        let learnings = match self
            .deps
            .integrations
            .get(&workspace, ctx)
            .await
            .map_err(|e| EngagementError::Retryable(RetryableError::Store(e)))?
        {
            Some(integration) => self
                .deps
                .learnings
                .list_by_workspace(&integration.workspace, ctx)
                .await
                .map_err(|e| EngagementError::Retryable(RetryableError::Store(e)))?,
            None => Vec::new(),
        };

        let reply_hint = trigger_thread_id.map(|t| ReplyHint { thread_id: t.to_string() });
        let context_input = ContextInput {
            learnings,
            open_gaps: open_gaps.clone(),
            pending_gaps: pending_gaps.clone(),
            recently_closed_gaps: closed_gaps.iter().take(10).cloned().collect(),
            reply_hint,
        };

        let messages = build_planner_messages(
            &self.deps.bot_username,
            &issue,
            &context_input,
            self.deps.config.max_discussions,
        );

        let validation_ctx = ValidationContext {
            gaps: open_gaps
                .iter()
                .chain(pending_gaps.iter())
                .chain(closed_gaps.iter())
                .map(to_gap_view)
                .collect(),
        };

        let outcome = self.deps.planner.run_cycle(messages, &validation_ctx, ctx).await?;

        let Some(batch) = outcome.batch else {
            return Ok(());
        };

        let errors = self.deps.executor.execute_batch(issue_id, &batch, ctx).await;
        if !errors.is_empty() {
            return Err(EngagementError::Retryable(RetryableError::ExecutorErrors(errors.len())));
        }
        Ok(())
    }

    async fn post_first_contact_ack(
        &self,
        issue: &Issue,
        trigger_thread_id: Option<&str>,
        ctx: &CallContext,
    ) {
        let message = *ACK_MESSAGES.choose(&mut rand::thread_rng()).unwrap_or(&ACK_MESSAGES[0]);
        let result = match trigger_thread_id {
            Some(thread_id) => self
                .deps
                .tracker
                .reply_in_thread(issue.id, &DiscussionRef { id: thread_id.to_string() }, message, ctx)
                .await
                .map(|_| ()),
            None => self.deps.tracker.post_comment(issue.id, message, ctx).await.map(|_| ()),
        };
        if let Err(e) = result {
            tracing::warn!(issue_id = issue.id, error = %e, "first-contact acknowledgment failed to post");
        }
    }

    async fn release(&self, issue_id: i64, follow_up: Option<FollowUpInfo>, ctx: &CallContext) {
        if let Err(e) = self.deps.issues.set_idle(issue_id, ctx).await {
            tracing::warn!(issue_id, error = %e, "failed to set issue idle on release");
        }

        let Some(info) = follow_up else { return };
        match self.deps.issues.queue_if_idle(issue_id, ctx).await {
            Ok(true) => {
                if let Err(e) = self
                    .deps
                    .queue
                    .enqueue(FollowUpEvent { issue_id, reason: info.reason }, ctx)
                    .await
                {
                    tracing::warn!(issue_id, error = %e, "follow-up enqueue failed, resetting to idle");
                    if let Err(e2) = self.deps.issues.reset_queued_to_idle(issue_id, ctx).await {
                        tracing::warn!(issue_id, error = %e2, "failed to reset queued issue to idle");
                    }
                }
            }
            Ok(false) => {
                tracing::warn!(issue_id, "queue_if_idle found issue not idle; skipping follow-up enqueue");
            }
            Err(e) => tracing::warn!(issue_id, error = %e, "queue_if_idle failed"),
        }
    }
}

fn to_gap_view(gap: &Gap) -> GapView {
    GapView { id: gap.id, short_id: gap.short_id, severity: gap.severity, status: gap.status }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engage_core::{CommentRef, Explorer, LlmClient, SpecGenRequest, SpecGenResult, SpecGenerator};
    use engage_exec::ExecutorDeps;
    use engage_store_memory::{
        MemoryEventLogStore, MemoryGapStore, MemoryIntegrationStore, MemoryIssueStore,
        MemoryLearningStore, MemoryQueueProducer,
    };
    use engage_types::{
        Discussion, EventLogEntry, Issue, IssueState, LlmError, LlmTurn, Message, Participant,
        Thoroughness, ToolSpec, TrackerError, TrackerProvider,
    };

    struct FakeTracker {
        posted: std::sync::Mutex<Vec<String>>,
    }

    impl FakeTracker {
        fn new() -> Self {
            Self { posted: std::sync::Mutex::new(Vec::new()) }
        }

        fn posted(&self) -> Vec<String> {
            self.posted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TrackerAdapter for FakeTracker {
        async fn post_comment(
            &self,
            _issue_id: i64,
            content: &str,
            _ctx: &CallContext,
        ) -> Result<CommentRef, TrackerError> {
            self.posted.lock().unwrap().push(content.to_string());
            Ok(CommentRef { id: "c1".into() })
        }

        async fn reply_in_thread(
            &self,
            _issue_id: i64,
            _thread: &DiscussionRef,
            content: &str,
            _ctx: &CallContext,
        ) -> Result<CommentRef, TrackerError> {
            self.posted.lock().unwrap().push(content.to_string());
            Ok(CommentRef { id: "c2".into() })
        }

        async fn list_discussions(
            &self,
            _issue_id: i64,
            _ctx: &CallContext,
        ) -> Result<Vec<Discussion>, TrackerError> {
            Ok(vec![])
        }

        async fn bot_has_participated(&self, _issue_id: i64, _ctx: &CallContext) -> Result<bool, TrackerError> {
            Ok(false)
        }
    }

    struct NoOpLlm;

    #[async_trait]
    impl LlmClient for NoOpLlm {
        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolSpec],
            _ctx: &CallContext,
        ) -> Result<LlmTurn, LlmError> {
            Ok(LlmTurn { content: Some("nothing to do".into()), tool_calls: vec![], tokens: Default::default() })
        }
    }

    struct NoOpExplorer;

    #[async_trait]
    impl Explorer for NoOpExplorer {
        async fn explore(
            &self,
            _query: &str,
            _thoroughness: Thoroughness,
            _ctx: &CallContext,
        ) -> Result<String, engage_types::ExploreError> {
            Ok(String::new())
        }
    }

    struct NoOpSpecGenerator;

    #[async_trait]
    impl SpecGenerator for NoOpSpecGenerator {
        async fn generate(&self, _request: SpecGenRequest, _ctx: &CallContext) -> Result<SpecGenResult, LlmError> {
            Ok(SpecGenResult { spec_text: String::new() })
        }
    }

    fn bare_issue(id: i64) -> Issue {
        Issue {
            id,
            integration_id: 1,
            external_issue_id: id.to_string(),
            state: IssueState::Queued,
            title: "fix the thing".into(),
            description: "d".into(),
            reporter: Participant { user_id: "u1".into(), username: "alice".into() },
            assignees: vec![],
            members: vec![],
            discussions: vec![],
            code_findings: vec![],
            spec: None,
            spec_status: None,
            provider: TrackerProvider::GitHub,
        }
    }

    async fn build_orchestrator(
        max_cycles: usize,
    ) -> (Orchestrator, Arc<MemoryIssueStore>, Arc<FakeTracker>, Arc<MemoryEventLogStore>, Arc<MemoryQueueProducer>) {
        let issues = Arc::new(MemoryIssueStore::new());
        issues.seed(bare_issue(1)).await;
        let gaps = Arc::new(MemoryGapStore::new());
        let learnings = Arc::new(MemoryLearningStore::new());
        let integrations = Arc::new(MemoryIntegrationStore::new());
        integrations
            .seed(engage_core::Integration { workspace: "1".into(), display_name: "acme".into() })
            .await;
        let events = Arc::new(MemoryEventLogStore::new());
        let queue = Arc::new(MemoryQueueProducer::new());
        let tracker = Arc::new(FakeTracker::new());

        let mut config = EngagementConfig::default();
        config.max_cycles = max_cycles;

        let planner = Arc::new(PlannerDriver::new(Arc::new(NoOpLlm), Arc::new(NoOpExplorer), config));
        let executor = Arc::new(Executor::new(ExecutorDeps {
            issues: issues.clone(),
            findings: issues.clone(),
            gaps: gaps.clone(),
            learnings: learnings.clone(),
            integrations: integrations.clone(),
            tracker: tracker.clone(),
            spec_generator: Arc::new(NoOpSpecGenerator),
        }));

        let deps = OrchestratorDeps {
            issues: issues.clone(),
            gaps,
            learnings,
            integrations,
            events: events.clone(),
            queue: queue.clone(),
            tracker: tracker.clone(),
            planner,
            executor,
            bot_user_id: "bot-1".into(),
            bot_username: "enginebot".into(),
            config,
        };
        (Orchestrator::new(deps), issues, tracker, events, queue)
    }

    #[tokio::test]
    async fn first_contact_posts_ack_before_anything_else() {
        let (orch, _issues, tracker, _events, _queue) = build_orchestrator(8).await;
        let input = EngagementInput {
            issue_id: 1,
            event_log_id: 1,
            event_type: "mention".into(),
            trigger_thread_id: Some("t-1".into()),
        };
        orch.handle_engagement(input, &CallContext::background()).await.unwrap();
        let posted = tracker.posted();
        assert_eq!(posted.len(), 1);
        assert!(ACK_MESSAGES.contains(&posted[0].as_str()));
    }

    #[tokio::test]
    async fn unclaimed_issue_returns_success_with_no_ack() {
        let (orch, issues, tracker, _events, _queue) = build_orchestrator(8).await;
        issues.claim_queued(1, &CallContext::background()).await.unwrap();
        let input = EngagementInput {
            issue_id: 1,
            event_log_id: 1,
            event_type: "mention".into(),
            trigger_thread_id: None,
        };
        orch.handle_engagement(input, &CallContext::background()).await.unwrap();
        assert!(tracker.posted().is_empty());
    }

    #[tokio::test]
    async fn engagement_releases_issue_to_idle_on_success() {
        let (orch, issues, _tracker, _events, _queue) = build_orchestrator(8).await;
        let input = EngagementInput {
            issue_id: 1,
            event_log_id: 1,
            event_type: "mention".into(),
            trigger_thread_id: None,
        };
        orch.handle_engagement(input, &CallContext::background()).await.unwrap();
        let issue = issues.get_by_id(1, &CallContext::background()).await.unwrap();
        assert_eq!(issue.state, IssueState::Idle);
    }

    #[tokio::test]
    async fn unknown_issue_is_fatal() {
        let (orch, _issues, _tracker, _events, _queue) = build_orchestrator(8).await;
        let input = EngagementInput {
            issue_id: 999,
            event_log_id: 1,
            event_type: "mention".into(),
            trigger_thread_id: None,
        };
        let err = orch.handle_engagement(input, &CallContext::background()).await.unwrap_err();
        assert!(matches!(err, EngagementError::Fatal(FatalError::IssueNotFound(999))));
    }

    #[tokio::test]
    async fn drain_requeues_follow_up_when_events_remain_past_max_cycles() {
        let (orch, issues, _tracker, events, queue) = build_orchestrator(1).await;
        events
            .append(
                EventLogEntry { id: 1, issue_id: 1, event_type: "discussion".into(), processed_at: None },
                &CallContext::background(),
            )
            .await
            .unwrap();
        events
            .append(
                EventLogEntry { id: 2, issue_id: 1, event_type: "discussion".into(), processed_at: None },
                &CallContext::background(),
            )
            .await
            .unwrap();

        let input = EngagementInput {
            issue_id: 1,
            event_log_id: 1,
            event_type: "discussion".into(),
            trigger_thread_id: None,
        };
        orch.handle_engagement(input, &CallContext::background()).await.unwrap();

        let issue = issues.get_by_id(1, &CallContext::background()).await.unwrap();
        assert_ne!(issue.state, IssueState::Processing);
        assert_eq!(queue.events().await.len(), 1);
    }
}
