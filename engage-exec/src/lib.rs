#![deny(missing_docs)]
//! The action executor: applies a validated [`ActionBatch`] against the
//! stores and tracker adapter.
//!
//! Actions execute in order. Each failure is recorded as a per-action
//! [`ActionError`] rather than aborting the batch — a later `post_comment`
//! still runs even if an earlier `update_gaps` failed, mirroring
//! `neuron-orch-local::LocalOrch::dispatch_many`'s per-task error
//! collection rather than fail-fast.

mod sanitize;
mod splitter;

use std::sync::Arc;

use engage_core::{
    CallContext, DiscussionRef, FindingsTransaction, GapStore, IntegrationStore, IssueStore,
    LearningStore, NewFinding, NewGap, NewLearning, SpecGenRequest, SpecGenerator, TrackerAdapter,
};
use engage_types::{
    Action, ActionBatch, CloseReason, GapRef, LearningType, Respondent, Severity, Source,
    SpecStatus,
};

pub use sanitize::strip_gap_markers;
pub use splitter::split_for_provider;

const RECENT_CLOSED_GAPS_LIMIT: usize = 100;

/// A single action's failure, collected rather than raised so the rest of
/// the batch still executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionError {
    /// Index of the failed action within the batch.
    pub index: usize,
    /// Whether the engagement should be retried because of this failure.
    /// Every failure surfaced today is recoverable; the field exists so a
    /// future non-recoverable class (e.g. a semantic invariant violation)
    /// doesn't need a breaking change to add.
    pub recoverable: bool,
    /// Human-readable detail, safe to log.
    pub message: String,
}

fn recoverable(index: usize, message: String) -> ActionError {
    ActionError { index, recoverable: true, message }
}

/// Every capability the executor needs, bundled so callers construct it
/// once per engagement rather than threading five `Arc`s through every
/// call site.
#[derive(Clone)]
pub struct ExecutorDeps {
    /// Issue lifecycle and spec persistence.
    pub issues: Arc<dyn IssueStore>,
    /// Transactional findings mutation.
    pub findings: Arc<dyn FindingsTransaction>,
    /// Gap lifecycle.
    pub gaps: Arc<dyn GapStore>,
    /// Idempotent learning inserts.
    pub learnings: Arc<dyn LearningStore>,
    /// Workspace/integration lookups.
    pub integrations: Arc<dyn IntegrationStore>,
    /// Posts comments and replies.
    pub tracker: Arc<dyn TrackerAdapter>,
    /// Produces the implementation spec during the handoff.
    pub spec_generator: Arc<dyn SpecGenerator>,
}

/// Executes one validated [`ActionBatch`] against [`ExecutorDeps`].
pub struct Executor {
    deps: ExecutorDeps,
}

impl Executor {
    /// Build an executor over the given dependencies.
    pub fn new(deps: ExecutorDeps) -> Self {
        Self { deps }
    }

    /// Execute every action in `batch` against `issue_id`, in order,
    /// returning every per-action failure encountered. An empty result
    /// means the whole batch applied cleanly.
    #[tracing::instrument(skip(self, batch, ctx), fields(issue_id, actions = batch.actions.len()))]
    pub async fn execute_batch(
        &self,
        issue_id: i64,
        batch: &ActionBatch,
        ctx: &CallContext,
    ) -> Vec<ActionError> {
        let mut errors = Vec::new();
        for (index, action) in batch.actions.iter().enumerate() {
            if let Err(err) = self.execute_one(issue_id, index, action, ctx).await {
                tracing::warn!(
                    issue_id,
                    index,
                    recoverable = err.recoverable,
                    message = %err.message,
                    "action execution failed"
                );
                errors.push(err);
            }
        }
        errors
    }

    async fn execute_one(
        &self,
        issue_id: i64,
        index: usize,
        action: &Action,
        ctx: &CallContext,
    ) -> Result<(), ActionError> {
        match action {
            Action::PostComment { content, reply_to_id } => {
                self.exec_post_comment(issue_id, index, content, reply_to_id.as_deref(), ctx)
                    .await
            }
            Action::UpdateFindings { add, remove } => {
                self.exec_update_findings(issue_id, index, add, remove, ctx).await
            }
            Action::UpdateGaps { add, close, ask } => {
                self.exec_update_gaps(issue_id, index, add, close, ask, ctx).await
            }
            Action::UpdateLearnings { propose } => {
                self.exec_update_learnings(issue_id, index, propose, ctx).await
            }
            Action::ReadyForSpecGeneration { .. } => {
                self.exec_ready_for_spec_generation(issue_id, index, action, ctx).await
            }
            Action::SetSpecStatus { status } => {
                self.exec_set_spec_status(issue_id, index, status, ctx).await
            }
        }
    }

    async fn exec_post_comment(
        &self,
        issue_id: i64,
        index: usize,
        content: &str,
        reply_to_id: Option<&str>,
        ctx: &CallContext,
    ) -> Result<(), ActionError> {
        let (clean, stripped) = strip_gap_markers(content);
        if stripped > 0 {
            tracing::debug!(issue_id, stripped, "stripped gap markers from comment");
        }
        let result = match reply_to_id {
            Some(thread_id) => {
                self.deps
                    .tracker
                    .reply_in_thread(issue_id, &DiscussionRef { id: thread_id.to_string() }, &clean, ctx)
                    .await
            }
            None => self.deps.tracker.post_comment(issue_id, &clean, ctx).await,
        };
        result
            .map(|_| ())
            .map_err(|e| recoverable(index, format!("post_comment failed: {e}")))
    }

    async fn exec_update_findings(
        &self,
        issue_id: i64,
        index: usize,
        add: &[engage_types::FindingAdd],
        remove: &[i64],
        ctx: &CallContext,
    ) -> Result<(), ActionError> {
        if add.is_empty() && remove.is_empty() {
            return Ok(());
        }
        // ID assignment happens inside apply_findings_delta, under the same
        // lock that reads the issue's current findings, so two concurrent
        // batches against the same issue can't assign the same ID.
        let to_add: Vec<NewFinding> = add
            .iter()
            .map(|finding| NewFinding {
                synthesis: finding.synthesis.clone(),
                sources: finding
                    .sources
                    .iter()
                    .map(|s| Source {
                        location: s.location.clone(),
                        snippet: s.snippet.clone(),
                        kind: s.kind.clone(),
                    })
                    .collect(),
            })
            .collect();

        self.deps
            .findings
            .apply_findings_delta(issue_id, to_add, remove.to_vec(), ctx)
            .await
            .map(|_| ())
            .map_err(|e| recoverable(index, format!("update_findings failed: {e}")))
    }

    async fn exec_update_gaps(
        &self,
        issue_id: i64,
        index: usize,
        add: &[engage_types::GapAdd],
        close: &[engage_types::GapClose],
        ask: &[GapRef],
        ctx: &CallContext,
    ) -> Result<(), ActionError> {
        if !add.is_empty() {
            let new_gaps = add
                .iter()
                .map(|g| NewGap {
                    question: g.question.clone(),
                    evidence: g.evidence.clone(),
                    severity: Severity::parse(&g.severity)
                        .expect("validator rejects unparsable severity before execution"),
                    respondent: Respondent::parse(&g.respondent)
                        .expect("validator rejects unparsable respondent before execution"),
                    pending: g.pending,
                })
                .collect();
            self.deps
                .gaps
                .add_gaps(issue_id, new_gaps, ctx)
                .await
                .map_err(|e| recoverable(index, format!("update_gaps.add failed: {e}")))?;
        }

        for c in close {
            let reason = CloseReason::parse(&c.reason)
                .expect("validator rejects unparsable close reason before execution");
            let gap_id = self.resolve_gap(issue_id, &c.gap_id, index, ctx).await?;
            self.deps
                .gaps
                .close_gap(issue_id, gap_id, reason, c.note.clone(), ctx)
                .await
                .map_err(|e| recoverable(index, format!("update_gaps.close failed: {e}")))?;
        }

        for gap_ref in ask {
            let gap_id = self.resolve_gap(issue_id, gap_ref, index, ctx).await?;
            self.deps
                .gaps
                .ask_gap(issue_id, gap_id, ctx)
                .await
                .map_err(|e| recoverable(index, format!("update_gaps.ask failed: {e}")))?;
        }

        Ok(())
    }

    async fn resolve_gap(
        &self,
        issue_id: i64,
        gap_ref: &GapRef,
        index: usize,
        ctx: &CallContext,
    ) -> Result<i64, ActionError> {
        self.deps
            .gaps
            .resolve_gap_id(issue_id, gap_ref, ctx)
            .await
            .map_err(|e| recoverable(index, format!("gap resolution failed: {e}")))?
            .ok_or_else(|| recoverable(index, format!("gap {gap_ref} no longer resolves")))
    }

    async fn exec_update_learnings(
        &self,
        issue_id: i64,
        index: usize,
        propose: &[engage_types::LearningPropose],
        ctx: &CallContext,
    ) -> Result<(), ActionError> {
        if propose.is_empty() {
            return Ok(());
        }
        let issue = self
            .deps
            .issues
            .get_by_id(issue_id, ctx)
            .await
            .map_err(|e| recoverable(index, format!("update_learnings: could not read issue: {e}")))?;
        let workspace = issue.integration_id.to_string();
        let integration = self
            .deps
            .integrations
            .get(&workspace, ctx)
            .await
            .map_err(|e| recoverable(index, format!("update_learnings: could not read integration: {e}")))?
            .ok_or_else(|| {
                recoverable(index, format!("update_learnings: no integration configured for workspace {workspace}"))
            })?;

        for learning in propose {
            let learning_type = LearningType::parse(&learning.learning_type)
                .expect("validator rejects unparsable learning type before execution");
            self.deps
                .learnings
                .propose(
                    NewLearning {
                        workspace: integration.workspace.clone(),
                        learning_type,
                        content: learning.content.clone(),
                    },
                    ctx,
                )
                .await
                .map_err(|e| recoverable(index, format!("update_learnings failed: {e}")))?;
        }
        Ok(())
    }

    async fn exec_set_spec_status(
        &self,
        issue_id: i64,
        index: usize,
        status: &str,
        ctx: &CallContext,
    ) -> Result<(), ActionError> {
        let parsed =
            SpecStatus::parse(status).expect("validator rejects unparsable spec status before execution");
        self.deps
            .issues
            .update_spec_status(issue_id, parsed, ctx)
            .await
            .map_err(|e| recoverable(index, format!("set_spec_status failed: {e}")))
    }

    async fn exec_ready_for_spec_generation(
        &self,
        issue_id: i64,
        index: usize,
        action: &Action,
        ctx: &CallContext,
    ) -> Result<(), ActionError> {
        let (context_summary, relevant_finding_ids, learning_ids, proceed_signal) = match action {
            Action::ReadyForSpecGeneration {
                context_summary,
                relevant_finding_ids,
                learning_ids,
                proceed_signal,
                ..
            } => (
                context_summary.clone(),
                relevant_finding_ids.clone(),
                learning_ids.clone(),
                proceed_signal.clone(),
            ),
            _ => unreachable!("dispatched only for Action::ReadyForSpecGeneration"),
        };

        // Step 1: re-fetch the issue so a concurrent update_findings isn't
        // clobbered by a stale in-memory copy.
        let issue = self
            .deps
            .issues
            .get_by_id(issue_id, ctx)
            .await
            .map_err(|e| recoverable(index, format!("ready_for_spec_generation: could not re-fetch issue: {e}")))?;

        // Step 2: post the acknowledgment. If this fails, the user never
        // learned the engagement started, so stay silent rather than
        // posting a second, confusing failure comment.
        let ack_posted = self
            .deps
            .tracker
            .post_comment(
                issue_id,
                "Got it — drafting the implementation approach now.",
                ctx,
            )
            .await
            .is_ok();
        if !ack_posted {
            return Err(recoverable(
                index,
                "ready_for_spec_generation: acknowledgment comment failed to post".to_string(),
            ));
        }

        let outcome = self
            .run_spec_handoff(
                &issue,
                &context_summary,
                &relevant_finding_ids,
                &learning_ids,
                &proceed_signal,
                ctx,
            )
            .await;

        if let Err(phase) = outcome {
            let _ = self
                .deps
                .tracker
                .post_comment(issue_id, &format!("{phase} 😕. Should I retry?"), ctx)
                .await;
            return Err(recoverable(
                index,
                format!("ready_for_spec_generation failed at: {phase}"),
            ));
        }
        Ok(())
    }

    async fn run_spec_handoff(
        &self,
        issue: &engage_types::Issue,
        context_summary: &str,
        relevant_finding_ids: &[i64],
        learning_ids: &[String],
        proceed_signal: &str,
        ctx: &CallContext,
    ) -> Result<(), &'static str> {
        // Step 3.
        let gaps = self
            .deps
            .gaps
            .list_closed_by_issue(issue.id, RECENT_CLOSED_GAPS_LIMIT, ctx)
            .await
            .map_err(|e| {
                tracing::warn!(issue_id = issue.id, error = %e, "fetching closed gaps failed");
                "fetching the issue's gap history"
            })?;

        // Step 4. `relevant_finding_ids` narrows which findings the spec
        // generator is pointed at, when the model named any.
        let findings = if relevant_finding_ids.is_empty() {
            issue.code_findings.clone()
        } else {
            issue
                .code_findings
                .iter()
                .filter(|f| relevant_finding_ids.contains(&f.id))
                .cloned()
                .collect()
        };

        let learnings = self
            .deps
            .learnings
            .get_many(learning_ids, ctx)
            .await
            .map_err(|e| {
                tracing::warn!(issue_id = issue.id, error = %e, "fetching learnings failed");
                "fetching workspace learnings"
            })?;

        // Step 5.
        let spec_result = self
            .deps
            .spec_generator
            .generate(
                SpecGenRequest {
                    issue: issue.clone(),
                    context_summary: context_summary.to_string(),
                    gaps,
                    findings,
                    learnings,
                    proceed_signal: proceed_signal.to_string(),
                },
                ctx,
            )
            .await
            .map_err(|e| {
                tracing::warn!(issue_id = issue.id, error = %e, "spec generation failed");
                "generating the implementation spec"
            })?;

        // Step 6.
        let limit = issue.provider.comment_limit();
        let parts = split_for_provider(&spec_result.spec_text, limit);
        for part in &parts {
            self.deps.tracker.post_comment(issue.id, part, ctx).await.map_err(|e| {
                tracing::warn!(issue_id = issue.id, error = %e, "posting the spec failed");
                "posting the implementation spec"
            })?;
        }

        // Step 7.
        self.deps
            .issues
            .update_spec(issue.id, spec_result.spec_text, ctx)
            .await
            .map_err(|e| {
                tracing::warn!(issue_id = issue.id, error = %e, "persisting the spec failed");
                "saving the implementation spec"
            })?;

        Ok(())
    }
}
