//! Capability-interface traits for durable state.
//!
//! One narrow trait per aggregate rather than a single repository god-trait,
//! so `engage-exec` and `engage-orchestrator` depend only on the slice of
//! state they actually touch. `update_findings` is the one operation that
//! needs read-then-write atomicity, so it is isolated into its own
//! [`FindingsTransaction`] trait rather than baked into [`IssueStore`].

use async_trait::async_trait;

use engage_types::{Issue, Learning, LearningType, Severity, Source, SpecStatus, StoreError};

use crate::ctx::CallContext;

/// Issue lifecycle and claim operations.
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Fetch an issue by ID.
    async fn get_by_id(&self, id: i64, ctx: &CallContext) -> Result<Issue, StoreError>;

    /// Atomically move the issue from `queued` to `processing`. Returns
    /// `false` if another worker already holds the claim.
    async fn claim_queued(&self, id: i64, ctx: &CallContext) -> Result<bool, StoreError>;

    /// Atomically move the issue from `idle` to `queued`. Returns `false`
    /// if the issue was not `idle` (already queued or processing).
    async fn queue_if_idle(&self, id: i64, ctx: &CallContext) -> Result<bool, StoreError>;

    /// Revert a claim that could not be serviced, returning the issue to
    /// `queued` so another worker can pick it up.
    async fn reset_queued_to_idle(&self, id: i64, ctx: &CallContext) -> Result<(), StoreError>;

    /// Release a processed issue back to `idle`.
    async fn set_idle(&self, id: i64, ctx: &CallContext) -> Result<(), StoreError>;

    /// Persist the generated implementation spec text.
    async fn update_spec(&self, id: i64, spec: String, ctx: &CallContext)
        -> Result<(), StoreError>;

    /// Record a human review outcome on the posted spec.
    async fn update_spec_status(
        &self,
        id: i64,
        status: SpecStatus,
        ctx: &CallContext,
    ) -> Result<(), StoreError>;
}

/// A code finding to add, prior to ID assignment.
#[derive(Debug, Clone)]
pub struct NewFinding {
    /// Synthesis text describing what was learned.
    pub synthesis: String,
    /// Supporting sources.
    pub sources: Vec<Source>,
}

/// Read-then-write mutation of an issue's code findings.
///
/// Kept separate from [`IssueStore`] because it is the one place the
/// executor needs a transaction: the bound eviction (oldest-first, capped
/// at [`engage_types::MAX_CODE_FINDINGS`]) must see additions and removals
/// from the same batch applied against a single consistent snapshot. IDs
/// for `add` are assigned here, under the same lock that reads the current
/// max, rather than by the caller — a caller-assigned ID read via a plain
/// `get_by_id` can race with a concurrent batch on the same issue, as
/// [`engage_types::CodeFinding`] assumes a final, collision-free ID.
#[async_trait]
pub trait FindingsTransaction: Send + Sync {
    /// Apply an additive/subtractive delta to an issue's findings and
    /// return the issue as it stands after the write.
    async fn apply_findings_delta(
        &self,
        issue_id: i64,
        add: Vec<NewFinding>,
        remove: Vec<i64>,
        ctx: &CallContext,
    ) -> Result<Issue, StoreError>;
}

/// A gap to create, prior to ID assignment.
#[derive(Debug, Clone)]
pub struct NewGap {
    /// The question text.
    pub question: String,
    /// Supporting evidence, if any.
    pub evidence: Option<String>,
    /// Urgency.
    pub severity: Severity,
    /// Who should answer.
    pub respondent: engage_types::Respondent,
    /// Create as `pending` rather than `open`.
    pub pending: bool,
}

/// Gap lifecycle: create, close, promote.
#[async_trait]
pub trait GapStore: Send + Sync {
    /// Create new gaps on an issue, returning their assigned IDs in order.
    async fn add_gaps(
        &self,
        issue_id: i64,
        gaps: Vec<NewGap>,
        ctx: &CallContext,
    ) -> Result<Vec<i64>, StoreError>;

    /// Fetch a single gap by its primary ID.
    async fn get_by_id(
        &self,
        issue_id: i64,
        gap_id: i64,
        ctx: &CallContext,
    ) -> Result<engage_types::Gap, StoreError>;

    /// Fetch a single gap by its short ID.
    async fn get_by_short_id(
        &self,
        issue_id: i64,
        short_id: i64,
        ctx: &CallContext,
    ) -> Result<engage_types::Gap, StoreError>;

    /// Resolve a gap reference (primary ID tried first, then short ID)
    /// against this issue's gaps, returning the resolved primary ID.
    async fn resolve_gap_id(
        &self,
        issue_id: i64,
        gap_ref: &engage_types::GapRef,
        ctx: &CallContext,
    ) -> Result<Option<i64>, StoreError>;

    /// Close a gap, recording the reason and optional note.
    async fn close_gap(
        &self,
        issue_id: i64,
        gap_id: i64,
        reason: engage_types::CloseReason,
        note: Option<String>,
        ctx: &CallContext,
    ) -> Result<(), StoreError>;

    /// Promote a `pending` gap to `open`.
    async fn ask_gap(&self, issue_id: i64, gap_id: i64, ctx: &CallContext)
        -> Result<(), StoreError>;

    /// Count this issue's currently-open gaps, split by whether they are
    /// `blocking` severity.
    async fn open_gap_counts(
        &self,
        issue_id: i64,
        ctx: &CallContext,
    ) -> Result<OpenGapCounts, StoreError>;

    /// List this issue's gaps currently `open`, in no particular order.
    async fn list_open_by_issue(
        &self,
        issue_id: i64,
        ctx: &CallContext,
    ) -> Result<Vec<engage_types::Gap>, StoreError>;

    /// List this issue's gaps currently `pending`, in no particular order.
    async fn list_pending_by_issue(
        &self,
        issue_id: i64,
        ctx: &CallContext,
    ) -> Result<Vec<engage_types::Gap>, StoreError>;

    /// List this issue's `resolved`/`skipped` gaps, newest-closed first,
    /// capped at `limit`.
    async fn list_closed_by_issue(
        &self,
        issue_id: i64,
        limit: usize,
        ctx: &CallContext,
    ) -> Result<Vec<engage_types::Gap>, StoreError>;
}

/// Counts used by the `ready_for_spec_generation` gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenGapCounts {
    /// Total open gaps (any severity).
    pub total: usize,
    /// Open gaps at `blocking` severity.
    pub blocking: usize,
}

/// A learning to propose, prior to idempotent-insert resolution.
#[derive(Debug, Clone)]
pub struct NewLearning {
    /// Workspace the learning applies to.
    pub workspace: String,
    /// Category of learning.
    pub learning_type: LearningType,
    /// Free-text content.
    pub content: String,
}

/// Idempotent learning insert, keyed by `(workspace, content)`.
#[async_trait]
pub trait LearningStore: Send + Sync {
    /// Insert a learning if no learning with the same `(workspace,
    /// content)` exists; otherwise a no-op. Returns the learning's ID
    /// either way.
    async fn propose(&self, new: NewLearning, ctx: &CallContext) -> Result<String, StoreError>;

    /// Fetch learnings by ID, silently dropping IDs that don't resolve.
    async fn get_many(
        &self,
        ids: &[String],
        ctx: &CallContext,
    ) -> Result<Vec<Learning>, StoreError>;

    /// List every learning recorded for a workspace, in no particular
    /// order. Backs the context builder's "what we already know" section,
    /// shown to the model before it can reference specific learning IDs.
    async fn list_by_workspace(
        &self,
        workspace: &str,
        ctx: &CallContext,
    ) -> Result<Vec<Learning>, StoreError>;
}

/// An external integration/workspace record consulted during context
/// building (e.g. the repository this issue's workspace maps to).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integration {
    /// Workspace identifier.
    pub workspace: String,
    /// Human-readable display name.
    pub display_name: String,
}

/// Lookup of the integration/workspace backing an issue.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// Fetch the integration for a workspace, if configured.
    async fn get(
        &self,
        workspace: &str,
        ctx: &CallContext,
    ) -> Result<Option<Integration>, StoreError>;
}

/// Append-only audit log of engagement activity.
#[async_trait]
pub trait EventLogStore: Send + Sync {
    /// Append an entry. Never fails the caller's operation: log errors are
    /// swallowed by the orchestrator, not propagated as [`StoreError`] to
    /// callers that can't usefully react to them.
    async fn append(
        &self,
        entry: engage_types::EventLogEntry,
        ctx: &CallContext,
    ) -> Result<(), StoreError>;

    /// List entries for an issue that have not yet been marked processed,
    /// oldest first. The drain loop snapshots this list before running a
    /// planner cycle, and marks exactly that snapshot processed afterward.
    async fn list_unprocessed_by_issue(
        &self,
        issue_id: i64,
        ctx: &CallContext,
    ) -> Result<Vec<engage_types::EventLogEntry>, StoreError>;

    /// Mark a batch of entries (by ID) processed. Best-effort from the
    /// orchestrator's point of view: a failure here is logged, not
    /// propagated as a retryable engagement error.
    async fn mark_batch_processed(
        &self,
        ids: &[i64],
        ctx: &CallContext,
    ) -> Result<(), StoreError>;
}

/// A follow-up processing event to enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpEvent {
    /// Issue this event concerns.
    pub issue_id: i64,
    /// Opaque reason recorded for observability (e.g. `"new_discussion"`,
    /// `"cycle_continuation"`).
    pub reason: String,
}

/// Enqueue follow-up work for a later drain cycle.
#[async_trait]
pub trait QueueProducer: Send + Sync {
    /// Enqueue a follow-up event. Distinct from [`StoreError`] because a
    /// queue backend (SQS, a DB-backed queue, etc.) has its own failure
    /// surface that callers translate into [`crate::RetryableError::EnqueueFailed`].
    async fn enqueue(
        &self,
        event: FollowUpEvent,
        ctx: &CallContext,
    ) -> Result<(), QueueError>;
}

/// Errors from [`QueueProducer`].
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The enqueue call failed.
    #[error("enqueue failed: {0}")]
    Failed(String),
    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
