//! The closed Action schema exchanged with the LLM via `submit_actions`.
//!
//! Every variant here is a structural match of the `submit_actions` tool's
//! JSON schema. Fields carry raw strings where case-insensitive or
//! otherwise-normalized parsing applies (`severity`, `respondent`, close
//! `reason`, learning `type`, spec `status`) — parsing and validity checks
//! live in `engage-validate`, not here, so this crate stays a pure data
//! definition.

use serde::{Deserialize, Serialize};

use crate::gap::GapRef;

/// One source citation supplied when adding a code finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAdd {
    /// File/location the finding cites.
    pub location: String,
    /// Supporting snippet.
    pub snippet: String,
    /// Optional free-form kind.
    #[serde(default)]
    pub kind: Option<String>,
}

/// A code finding to add via `update_findings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingAdd {
    /// Synthesis text.
    pub synthesis: String,
    /// Supporting sources. Must be non-empty once validated.
    #[serde(default)]
    pub sources: Vec<SourceAdd>,
}

/// A gap to create via `update_gaps.add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapAdd {
    /// The question text.
    pub question: String,
    /// Supporting evidence, if any.
    #[serde(default)]
    pub evidence: Option<String>,
    /// Raw severity string; normalized by the validator (case-insensitive).
    pub severity: String,
    /// Raw respondent string; normalized by the validator.
    pub respondent: String,
    /// Whether to create as `pending` instead of `open`.
    #[serde(default)]
    pub pending: bool,
}

/// A gap to close via `update_gaps.close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapClose {
    /// Gap reference, resolved against primary or short ID.
    pub gap_id: GapRef,
    /// Raw close reason string; normalized by the validator.
    pub reason: String,
    /// Required when `reason` is `answered` or `inferred`.
    #[serde(default)]
    pub note: Option<String>,
}

/// A learning to propose via `update_learnings.propose`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPropose {
    /// Raw learning-type string; normalized by the validator.
    #[serde(rename = "type")]
    pub learning_type: String,
    /// Free-text content.
    pub content: String,
}

/// One instruction from the planner to the orchestrator.
///
/// A closed, tagged-enum sum type — dispatch in the validator and executor
/// is a single `match`, never inheritance or a type-erased handler map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Post a new comment, or reply to an existing thread.
    PostComment {
        /// Comment content. Sanitized (strip `[gap N]` markers) before send.
        content: String,
        /// Thread to reply within, if replying rather than starting fresh.
        #[serde(default)]
        reply_to_id: Option<String>,
    },
    /// Transactional edit of the issue's code findings.
    UpdateFindings {
        /// Findings to append.
        #[serde(default)]
        add: Vec<FindingAdd>,
        /// Finding IDs to remove.
        #[serde(default)]
        remove: Vec<i64>,
    },
    /// Create, close, or promote gaps.
    UpdateGaps {
        /// Gaps to create.
        #[serde(default)]
        add: Vec<GapAdd>,
        /// Gaps to close.
        #[serde(default)]
        close: Vec<GapClose>,
        /// Pending gaps to promote to `open`.
        #[serde(default)]
        ask: Vec<GapRef>,
    },
    /// Idempotently insert workspace learnings.
    UpdateLearnings {
        /// Learnings to propose.
        #[serde(default)]
        propose: Vec<LearningPropose>,
    },
    /// Transition the engagement into spec generation.
    ReadyForSpecGeneration {
        /// Free-text summary of context handed to the spec generator.
        context_summary: String,
        /// Finding IDs the spec generator should consider relevant.
        #[serde(default)]
        relevant_finding_ids: Vec<i64>,
        /// Gap references the model considers closed (including ones closed
        /// earlier in the same batch).
        #[serde(default)]
        closed_gap_ids: Vec<GapRef>,
        /// Learning IDs the model considers relevant.
        #[serde(default)]
        learning_ids: Vec<String>,
        /// Free-text confirmation that the model intends to proceed.
        proceed_signal: String,
    },
    /// Record a human review outcome on the posted spec.
    SetSpecStatus {
        /// Raw status string; normalized by the validator.
        status: String,
    },
}

/// The transient payload returned by one planner turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionBatch {
    /// Ordered actions to execute.
    pub actions: Vec<Action>,
    /// Free-text justification from the model. Not executed, just recorded.
    #[serde(default)]
    pub reasoning: String,
}
