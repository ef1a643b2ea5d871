//! The spec-generator capability trait.
//!
//! `engage-exec`'s `ready_for_spec_generation` handoff calls through this
//! trait rather than depending on `engage-specgen` directly, the same way
//! it depends on `LlmClient` rather than a concrete provider — keeps the
//! executor ignorant of the bounded-loop driver that produces the spec.

use async_trait::async_trait;

use engage_types::{CodeFinding, Gap, Issue, LlmError, Learning};

use crate::ctx::CallContext;

/// Everything the spec generator needs to produce an implementation spec.
#[derive(Debug, Clone)]
pub struct SpecGenRequest {
    /// The issue being specced.
    pub issue: Issue,
    /// The planner's free-text summary of why it's ready.
    pub context_summary: String,
    /// The most recent closed gaps (latest 100).
    pub gaps: Vec<Gap>,
    /// The issue's current code findings.
    pub findings: Vec<CodeFinding>,
    /// Workspace learnings relevant to this issue.
    pub learnings: Vec<Learning>,
    /// The planner's confirmation that it intends to proceed.
    pub proceed_signal: String,
}

/// The generated spec text, not yet split or posted.
#[derive(Debug, Clone)]
pub struct SpecGenResult {
    /// Full spec body.
    pub spec_text: String,
}

/// Drives the bounded spec-generation loop to completion.
#[async_trait]
pub trait SpecGenerator: Send + Sync {
    /// Produce a spec for the given request.
    async fn generate(
        &self,
        request: SpecGenRequest,
        ctx: &CallContext,
    ) -> Result<SpecGenResult, LlmError>;
}
