//! Repository-interrogation capability traits backing the `explore` tool
//! (planner driver) and the `locate` tool (spec-generator driver).
//!
//! Both are read-only, both return a text summary for the model to read,
//! and both share [`ExploreError`] — the two drivers differ in loop shape
//! and budget, not in what the underlying call looks like.

use async_trait::async_trait;

use engage_types::{ExploreError, Thoroughness};

use crate::ctx::CallContext;

/// Backs the planner driver's `explore(query, thoroughness)` tool.
#[async_trait]
pub trait Explorer: Send + Sync {
    /// Search the repository for `query` at the requested depth, returning
    /// a text summary for the model to read.
    async fn explore(
        &self,
        query: &str,
        thoroughness: Thoroughness,
        ctx: &CallContext,
    ) -> Result<String, ExploreError>;
}

/// Backs the spec-generator driver's `locate(query)` tool.
#[async_trait]
pub trait Locator: Send + Sync {
    /// Search the repository for `query`, returning a text summary for the
    /// model to read.
    async fn locate(&self, query: &str, ctx: &CallContext) -> Result<String, ExploreError>;
}
