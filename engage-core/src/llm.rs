//! The LLM client capability trait.
//!
//! `#[async_trait]` rather than a plain `async fn` in a trait: this trait is
//! held as `Arc<dyn LlmClient>` across the planner and spec-generator
//! drivers, so it must stay object-safe.

use async_trait::async_trait;

use engage_types::{LlmError, LlmTurn, Message, ToolSpec};

use crate::ctx::CallContext;

/// One call to an LLM backend: a message thread plus the tools on offer.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the thread and available tools, returning the model's next
    /// turn (text and/or tool calls).
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        ctx: &CallContext,
    ) -> Result<LlmTurn, LlmError>;
}
