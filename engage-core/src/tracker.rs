//! The tracker-adapter capability trait.
//!
//! One implementation per provider (GitHub, GitLab, Linear) lives outside
//! this workspace; `engage-exec` and `engage-orchestrator` only ever see
//! this trait, never a provider SDK type.

use async_trait::async_trait;

use engage_types::{Discussion, TrackerError};

use crate::ctx::CallContext;

/// A reference to a specific comment/discussion thread just posted, used to
/// thread subsequent replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRef {
    /// Provider-native comment/note ID.
    pub id: String,
}

/// A reference to a discussion thread to reply within.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionRef {
    /// Provider-native discussion/thread ID.
    pub id: String,
}

/// Tracker-facing operations the executor and orchestrator need.
#[async_trait]
pub trait TrackerAdapter: Send + Sync {
    /// Post a new top-level comment, returning its ID.
    async fn post_comment(
        &self,
        issue_id: i64,
        content: &str,
        ctx: &CallContext,
    ) -> Result<CommentRef, TrackerError>;

    /// Reply within an existing discussion thread.
    async fn reply_in_thread(
        &self,
        issue_id: i64,
        thread: &DiscussionRef,
        content: &str,
        ctx: &CallContext,
    ) -> Result<CommentRef, TrackerError>;

    /// Fetch discussions/comments posted on the issue since it was last
    /// read, newest-last, truncated upstream by the context builder rather
    /// than here.
    async fn list_discussions(
        &self,
        issue_id: i64,
        ctx: &CallContext,
    ) -> Result<Vec<Discussion>, TrackerError>;

    /// Whether the bot account has participated in the issue at all
    /// (used to decide whether this is a first contact).
    async fn bot_has_participated(
        &self,
        issue_id: i64,
        ctx: &CallContext,
    ) -> Result<bool, TrackerError>;
}
