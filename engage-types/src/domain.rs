//! Durable entities: Issue, Discussion, Gap, CodeFinding, Learning.
//!
//! These are the in-memory shapes stores round-trip. Storage representation
//! is a store's own decision — these types are what the core speaks, not a
//! schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gap::{CloseReason, GapStatus, Respondent, Severity};

/// Maximum number of code findings an issue retains. Oldest evicted first.
pub const MAX_CODE_FINDINGS: usize = 20;

/// Which issue tracker an issue lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerProvider {
    /// GitHub issues.
    GitHub,
    /// GitLab issues.
    GitLab,
    /// Linear issues.
    Linear,
}

impl TrackerProvider {
    /// The provider's comment-length limit in characters.
    pub fn comment_limit(self) -> usize {
        match self {
            Self::GitLab => 1_000_000,
            Self::GitHub | Self::Linear => 65_536,
        }
    }
}

/// Lifecycle state of an [`Issue`] with respect to engagement claiming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    /// No engagement is queued or running.
    Idle,
    /// Queued for an engagement worker to claim.
    Queued,
    /// Claimed by exactly one worker.
    Processing,
}

/// Human review outcome on a posted spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecStatus {
    /// The human approved the spec.
    Approved,
    /// The human rejected the spec.
    Rejected,
}

impl SpecStatus {
    /// Parse from the exact lowercase forms the Action schema accepts.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A participant referenced on an issue (reporter, assignee, member).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable user ID from the tracker.
    pub user_id: String,
    /// Display/login name.
    pub username: String,
}

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
    /// Stable discussion ID.
    pub id: i64,
    /// Author's user ID, or the bot's own ID if bot-authored.
    pub author_user_id: String,
    /// Author's display name.
    pub author_username: String,
    /// Whether the bot itself authored this discussion.
    pub authored_by_bot: bool,
    /// Comment body.
    pub body: String,
    /// Thread this comment replies within, if any.
    pub thread_id: Option<String>,
    /// Creation timestamp, used for ordering.
    pub created_at: DateTime<Utc>,
}

/// A source citation backing a [`CodeFinding`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// File/location the finding cites.
    pub location: String,
    /// Supporting snippet.
    pub snippet: String,
    /// Optional free-form kind (e.g. "definition", "usage").
    pub kind: Option<String>,
}

/// A durable fact the bot learned about the codebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFinding {
    /// ID assigned on creation.
    pub id: i64,
    /// Synthesis text describing what was learned.
    pub synthesis: String,
    /// At least one supporting source.
    pub sources: Vec<Source>,
}

/// A tracked open question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    /// Primary 64-bit ID.
    pub id: i64,
    /// Shorter numeric ID, also valid in model references.
    pub short_id: i64,
    /// The question text.
    pub question: String,
    /// Free-text supporting evidence/citation.
    pub evidence: Option<String>,
    /// Severity.
    pub severity: Severity,
    /// Who should answer it.
    pub respondent: Respondent,
    /// Current lifecycle status.
    pub status: GapStatus,
    /// Reason it was closed, if closed.
    pub closed_reason: Option<CloseReason>,
    /// Free-text note attached at close time.
    pub closed_note: Option<String>,
    /// When it was closed, if closed.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Type of workspace-scoped [`Learning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningType {
    /// A domain-level insight (business rules, terminology).
    DomainLearnings,
    /// A code-level insight (architecture, conventions).
    CodeLearnings,
}

impl LearningType {
    /// Parse from the exact snake_case forms the Action schema accepts.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "domain_learnings" => Some(Self::DomainLearnings),
            "code_learnings" => Some(Self::CodeLearnings),
            _ => None,
        }
    }
}

/// A workspace-scoped durable insight, linked to the issue that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Learning {
    /// ID assigned on creation.
    pub id: i64,
    /// Owning workspace.
    pub workspace_id: i64,
    /// Learning kind.
    pub learning_type: LearningType,
    /// Free-text content. Unique per `(workspace_id, content)`.
    pub content: String,
    /// Issue that produced this learning.
    pub issue_id: i64,
}

/// The unit of work the orchestrator drives to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable 64-bit ID.
    pub id: i64,
    /// Owning integration.
    pub integration_id: i64,
    /// ID in the external tracker.
    pub external_issue_id: String,
    /// Current claim state.
    pub state: IssueState,
    /// Issue title.
    pub title: String,
    /// Issue description/body.
    pub description: String,
    /// Who filed the issue.
    pub reporter: Participant,
    /// Assigned participants.
    pub assignees: Vec<Participant>,
    /// Other participants (e.g. watchers) worth addressing.
    pub members: Vec<Participant>,
    /// Comments, any order (render oldest-first).
    pub discussions: Vec<Discussion>,
    /// Durable code findings, bounded by [`MAX_CODE_FINDINGS`].
    pub code_findings: Vec<CodeFinding>,
    /// The generated implementation spec, if any.
    pub spec: Option<String>,
    /// Human review outcome on the spec, if recorded.
    pub spec_status: Option<SpecStatus>,
    /// Which tracker this issue lives in.
    pub provider: TrackerProvider,
}

impl Issue {
    /// Append new findings and remove retired ones, then truncate from the
    /// head so at most [`MAX_CODE_FINDINGS`] remain (newest wins).
    ///
    /// `add` should already carry assigned IDs; `remove` is a set of IDs to
    /// drop before appending.
    pub fn apply_findings_delta(&mut self, add: Vec<CodeFinding>, remove: &[i64]) {
        self.code_findings.retain(|f| !remove.contains(&f.id));
        self.code_findings.extend(add);
        let len = self.code_findings.len();
        if len > MAX_CODE_FINDINGS {
            self.code_findings.drain(0..len - MAX_CODE_FINDINGS);
        }
    }

    /// Whether any discussion was authored by the bot (by user ID or by the
    /// `id:<user_id>` form some adapters use in place of a username).
    pub fn has_bot_contact(&self, bot_user_id: &str, bot_username: &str) -> bool {
        self.discussions.iter().any(|d| {
            d.authored_by_bot
                || d.author_user_id == bot_user_id
                || d.author_user_id == format!("id:{bot_user_id}")
                || d.author_username.eq_ignore_ascii_case(bot_username)
        })
    }
}

/// How deeply an `explore`/`locate` tool call should search the
/// repository. Higher thoroughness costs more time per call; the driver
/// doesn't enforce that cost itself, it only threads the model's choice
/// through to whatever backs the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Thoroughness {
    /// A fast, shallow pass.
    Quick,
    /// The default depth.
    Medium,
    /// An exhaustive pass.
    Thorough,
}

impl Thoroughness {
    /// Parse case-insensitively, trimming surrounding whitespace. Defaults
    /// are the caller's responsibility; this returns `None` for anything
    /// that isn't one of the three recognized forms.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "quick" => Some(Self::Quick),
            "medium" => Some(Self::Medium),
            "thorough" => Some(Self::Thorough),
            _ => None,
        }
    }
}

/// A per-issue record of an inbound event awaiting processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Stable ID.
    pub id: i64,
    /// Owning issue.
    pub issue_id: i64,
    /// Event kind (adapter-defined string).
    pub event_type: String,
    /// Set once the orchestrator has folded this event into a cycle.
    pub processed_at: Option<DateTime<Utc>>,
}
