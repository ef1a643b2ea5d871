#![deny(missing_docs)]
//! The action-batch validator.
//!
//! Rejects ill-formed `Action` batches before any side effect reaches a
//! store or the tracker. Validation errors are plain data — a `Vec` of
//! [`ValidationError`] — never thrown, mirroring the teacher's
//! `HookAction`/`ToolError` data-first error modeling (`neuron-hooks`,
//! `neuron-tool`). The one cross-action rule, `ready_for_spec_generation`'s
//! open-gap gate, treats every gap mentioned in a same-batch
//! `update_gaps.close` as already closed before counting what remains open.

use engage_types::{
    Action, ActionBatch, CloseReason, GapRef, GapStatus, LearningType, Respondent, Severity,
    SpecStatus, ValidationError,
};

/// Minimal view of a gap the validator needs: enough to resolve a
/// [`GapRef`] and to evaluate the `ready_for_spec_generation` gate,
/// without depending on any store trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapView {
    /// Primary ID.
    pub id: i64,
    /// Short ID.
    pub short_id: i64,
    /// Severity.
    pub severity: Severity,
    /// Current status.
    pub status: GapStatus,
}

/// Everything the validator needs about the issue's existing gaps.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Every known gap on the issue, any status.
    pub gaps: Vec<GapView>,
}

impl ValidationContext {
    /// Resolve a [`GapRef`] against known gaps: primary ID first, then
    /// short ID (Open Question #1's documented tiebreaker).
    pub fn resolve(&self, gap_ref: &GapRef) -> Option<&GapView> {
        let candidate = gap_ref.as_i64();
        self.gaps
            .iter()
            .find(|g| g.id == candidate)
            .or_else(|| self.gaps.iter().find(|g| g.short_id == candidate))
    }
}

const MIN_COMMENT_LEN: usize = 1;
const MAX_COMMENT_LEN: usize = 65_000;

/// Validate a full action batch, returning every fault found (empty means
/// valid). The batch is evaluated as a whole so cross-action rules (the
/// `ready_for_spec_generation` gate) see same-batch effects.
pub fn validate(batch: &ActionBatch, ctx: &ValidationContext) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if batch.actions.is_empty() {
        errors.push(ValidationError::EmptyBatch);
        return errors;
    }

    let will_be_closed = same_batch_closures(batch, ctx);

    for action in &batch.actions {
        match action {
            Action::PostComment { content, .. } => {
                let len = content.chars().count();
                if !(MIN_COMMENT_LEN..=MAX_COMMENT_LEN).contains(&len) {
                    errors.push(ValidationError::CommentLength(len));
                }
            }
            Action::UpdateFindings { add, .. } => {
                for (idx, finding) in add.iter().enumerate() {
                    if finding.synthesis.trim().is_empty() {
                        errors.push(ValidationError::EmptySynthesis(idx));
                    }
                    if finding.sources.is_empty()
                        || finding.sources.iter().any(|s| s.location.trim().is_empty())
                    {
                        errors.push(ValidationError::InvalidSources(idx));
                    }
                }
            }
            Action::UpdateGaps { add, close, ask } => {
                for (idx, gap) in add.iter().enumerate() {
                    if gap.question.trim().is_empty() {
                        errors.push(ValidationError::EmptyQuestion(idx));
                    }
                    if Severity::parse(&gap.severity).is_none() {
                        errors.push(ValidationError::InvalidSeverity(idx, gap.severity.clone()));
                    }
                    if Respondent::parse(&gap.respondent).is_none() {
                        errors.push(ValidationError::InvalidRespondent(idx, gap.respondent.clone()));
                    }
                }
                for (idx, c) in close.iter().enumerate() {
                    let resolved = ctx.resolve(&c.gap_id);
                    if resolved.is_none() {
                        errors.push(ValidationError::UnknownGapId(idx, c.gap_id.to_string()));
                    }
                    match CloseReason::parse(&c.reason) {
                        Some(reason) => {
                            if reason.requires_note()
                                && c.note.as_ref().map(|n| n.trim().is_empty()).unwrap_or(true)
                            {
                                errors.push(ValidationError::MissingCloseNote(idx, c.reason.clone()));
                            }
                        }
                        None => errors.push(ValidationError::InvalidCloseReason(idx, c.reason.clone())),
                    }
                }
                for (idx, gap_ref) in ask.iter().enumerate() {
                    let ok = ctx
                        .resolve(gap_ref)
                        .map(|g| g.status == GapStatus::Pending)
                        .unwrap_or(false);
                    if !ok {
                        errors.push(ValidationError::AskOnNonPendingGap(idx, gap_ref.to_string()));
                    }
                }
            }
            Action::UpdateLearnings { propose } => {
                for (idx, learning) in propose.iter().enumerate() {
                    if learning.content.trim().is_empty() {
                        errors.push(ValidationError::EmptyLearningContent(idx));
                    }
                    if LearningType::parse(&learning.learning_type).is_none() {
                        errors.push(ValidationError::InvalidLearningType(
                            idx,
                            learning.learning_type.clone(),
                        ));
                    }
                }
            }
            Action::SetSpecStatus { status } => {
                if SpecStatus::parse(status).is_none() {
                    errors.push(ValidationError::InvalidSpecStatus(status.clone()));
                }
            }
            Action::ReadyForSpecGeneration {
                relevant_finding_ids,
                closed_gap_ids,
                proceed_signal,
                ..
            } => {
                if proceed_signal.trim().is_empty() {
                    errors.push(ValidationError::EmptyProceedSignal);
                }
                if relevant_finding_ids.is_empty() && closed_gap_ids.is_empty() {
                    errors.push(ValidationError::NoEvidenceForHandoff);
                }

                let mut remaining_total = 0usize;
                let mut remaining_blocking = 0usize;
                for gap in &ctx.gaps {
                    if gap.status != GapStatus::Open {
                        continue;
                    }
                    if will_be_closed.contains(&gap.id) {
                        continue;
                    }
                    remaining_total += 1;
                    if gap.severity == Severity::Blocking {
                        remaining_blocking += 1;
                    }
                }
                if remaining_total > 0 {
                    errors.push(ValidationError::OpenGapsRemain(remaining_total, remaining_blocking));
                }
            }
        }
    }

    errors
}

/// Build the set of gap primary IDs that every `update_gaps.close` in this
/// batch will close, resolved against `ctx`. Unresolvable references are
/// skipped here — they are reported separately as `UnknownGapId`.
fn same_batch_closures(
    batch: &ActionBatch,
    ctx: &ValidationContext,
) -> std::collections::HashSet<i64> {
    let mut set = std::collections::HashSet::new();
    for action in &batch.actions {
        if let Action::UpdateGaps { close, .. } = action {
            for c in close {
                if let Some(gap) = ctx.resolve(&c.gap_id) {
                    set.insert(gap.id);
                }
            }
        }
    }
    set
}

/// Format a human-readable critique message for [`engage_types::LlmError`]
/// feedback, with hints keyed off recognizable fault substrings. Fed back
/// to the planner as a tool-result message referring to the model's last
/// `submit_actions` call (the planner driver owns message threading; this
/// only builds the text).
pub fn format_critique(errors: &[ValidationError]) -> String {
    let mut out = String::from(
        "Your last `submit_actions` call was rejected. Fix the following and resubmit:\n",
    );
    for err in errors {
        out.push_str(&format!("- {err}\n"));
        let text = err.to_string();
        if text.contains("invalid gap id") || matches!(err, ValidationError::UnknownGapId(..)) {
            out.push_str(
                "  hint: gap ids must be numeric, without a \"gap \" prefix in the stored \
                 form (the prefix is stripped automatically, but the digits must match an \
                 existing gap's primary or short id).\n",
            );
        }
        if matches!(err, ValidationError::OpenGapsRemain(..)) {
            out.push_str(
                "  hint: close every remaining open gap (including this batch's own \
                 update_gaps.close entries count) before calling ready_for_spec_generation.\n",
            );
        }
    }
    out
}
