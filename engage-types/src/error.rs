//! Error taxonomy.
//!
//! Three kinds of failure drive the orchestrator's control flow: transient
//! ([`RetryableError`]), semantic ([`FatalError`]), and model-output faults
//! ([`ValidationError`], recovered locally by `engage-planner` before ever
//! becoming a [`FatalError`]).

use thiserror::Error;

/// Errors from a store capability trait (`engage-core`).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint was violated (e.g. learning `(workspace,
    /// content)`). Distinguishable so callers can treat it as a no-op.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    /// The claim compare-and-set lost the race; another worker holds it.
    #[error("already claimed")]
    AlreadyClaimed,
    /// No transaction runner is configured for an operation that requires
    /// one (e.g. `update_findings`).
    #[error("no transaction runner configured")]
    NoTransactionRunner,
    /// Catch-all for backend-specific failures.
    #[error("store error: {0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the tracker adapter capability trait.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The adapter call failed (network, auth, rate limit — all opaque to
    /// the core, which only needs to know whether to retry).
    #[error("tracker call failed: {0}")]
    CallFailed(String),
    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the LLM client capability trait.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// The call failed at the transport/provider level.
    #[error("llm call failed: {0}")]
    CallFailed(String),
    /// The model's `submit_actions`/`submit_spec` arguments could not be
    /// parsed as the expected shape.
    #[error("could not parse model output: {0}")]
    UnparsableOutput(String),
    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the `explore`/`locate` capability traits (repository
/// interrogation tools backing the planner and spec-generator drivers).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ExploreError {
    /// The underlying search/read call failed.
    #[error("explore call failed: {0}")]
    CallFailed(String),
    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A single fault found by the action validator.
///
/// Validation errors are data, not exceptions: the planner driver turns a
/// `Vec<ValidationError>` into one formatted critique message and retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The batch had zero actions.
    #[error("batch has zero actions")]
    EmptyBatch,
    /// An action type was not in the closed set (should not occur given
    /// typed deserialization, but kept for defense-in-depth at the batch
    /// boundary).
    #[error("unknown action type: {0}")]
    UnknownActionType(String),
    /// `post_comment` content length outside `[1, 65000]`.
    #[error("post_comment content length {0} outside [1, 65000]")]
    CommentLength(usize),
    /// `update_findings.add[n]` had an empty synthesis.
    #[error("update_findings.add[{0}] has empty synthesis")]
    EmptySynthesis(usize),
    /// `update_findings.add[n]` had no sources, or a source with an empty
    /// location.
    #[error("update_findings.add[{0}] has no sources or a source with empty location")]
    InvalidSources(usize),
    /// `update_gaps.add[n]` had an empty question.
    #[error("update_gaps.add[{0}] has empty question")]
    EmptyQuestion(usize),
    /// `update_gaps.add[n]` had an invalid severity.
    #[error("update_gaps.add[{0}] has invalid severity: {1}")]
    InvalidSeverity(usize, String),
    /// `update_gaps.add[n]` had an invalid respondent.
    #[error("update_gaps.add[{0}] has invalid respondent: {1}")]
    InvalidRespondent(usize, String),
    /// `update_gaps.close[n]` referenced a gap id that doesn't resolve
    /// (tried both primary and short ID).
    #[error("update_gaps.close[{0}] references unknown gap id: {1}")]
    UnknownGapId(usize, String),
    /// `update_gaps.close[n]` had an invalid reason.
    #[error("update_gaps.close[{0}] has invalid reason: {1}")]
    InvalidCloseReason(usize, String),
    /// `update_gaps.close[n]` was missing a required note.
    #[error("update_gaps.close[{0}] requires a note for reason {1}")]
    MissingCloseNote(usize, String),
    /// `update_gaps.ask[n]` referenced a gap that doesn't exist or isn't
    /// `pending`.
    #[error("update_gaps.ask[{0}] references gap {1} which is not pending")]
    AskOnNonPendingGap(usize, String),
    /// `update_learnings.propose[n]` had empty content.
    #[error("update_learnings.propose[{0}] has empty content")]
    EmptyLearningContent(usize),
    /// `update_learnings.propose[n]` had an invalid type.
    #[error("update_learnings.propose[{0}] has invalid type: {1}")]
    InvalidLearningType(usize, String),
    /// `set_spec_status` had a status outside `{approved, rejected}`.
    #[error("set_spec_status has invalid status: {0}")]
    InvalidSpecStatus(String),
    /// `ready_for_spec_generation` had an empty (after trim) `proceed_signal`.
    #[error("ready_for_spec_generation requires a non-empty proceed_signal")]
    EmptyProceedSignal,
    /// `ready_for_spec_generation` left open gaps uncovered by a same-batch
    /// close.
    #[error("ready_for_spec_generation: {0} open gap(s) remain uncovered, including {1} blocking")]
    OpenGapsRemain(usize, usize),
    /// `ready_for_spec_generation` had neither `closed_gap_ids` nor
    /// `relevant_finding_ids` populated.
    #[error(
        "ready_for_spec_generation requires at least one of closed_gap_ids or relevant_finding_ids"
    )]
    NoEvidenceForHandoff,
}

/// Transient failure; the queue retries later with its own backoff.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RetryableError {
    /// A store operation failed transiently.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// A tracker adapter call failed transiently.
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),
    /// An LLM call failed transiently.
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),
    /// An `explore`/`locate` call failed transiently.
    #[error("explore error: {0}")]
    Explore(#[from] ExploreError),
    /// The action executor reported one or more recoverable per-action
    /// failures.
    #[error("{0} action(s) failed during execution")]
    ExecutorErrors(usize),
    /// Enqueuing a follow-up event failed.
    #[error("enqueue failed: {0}")]
    EnqueueFailed(String),
    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Semantic failure; logged with full action context and not retried.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FatalError {
    /// The issue does not exist.
    #[error("issue not found: {0}")]
    IssueNotFound(i64),
    /// The issue carries a provider tag the orchestrator doesn't recognize.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    /// Model output could not be parsed even as a generic tool call.
    #[error("could not parse model output: {0}")]
    UnparsableOutput(String),
    /// The planner exhausted its validation retries and still produced an
    /// invalid batch.
    #[error("validation failed after retries: {0:?}")]
    ValidationExhausted(Vec<ValidationError>),
    /// `set_spec_status` or another semantic invariant was violated outside
    /// the validator's reach.
    #[error("{0}")]
    Semantic(String),
}
