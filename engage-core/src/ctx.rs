//! The cancellation/deadline context threaded through every I/O call.
//!
//! Every external call — LLM, store, tracker, tool execution — accepts a
//! cancellation token and a deadline. A single [`CallContext`] carries both,
//! propagated top-down from the engagement entry point. No thread-local
//! state is used anywhere in this workspace.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Cancellation token plus an optional deadline, passed by reference into
/// every capability-trait method.
#[derive(Clone)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context with no deadline, cancellable via the returned token's
    /// clone kept by the caller (typically the orchestrator).
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Attach a deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the deadline, if any, has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Whether the call should stop: cancelled or past its deadline.
    pub fn should_stop(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// The underlying cancellation token, for `select!`-style races.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// A fresh, never-cancelled context with no deadline. Convenient for
    /// tests and for callers that don't need cooperative cancellation.
    pub fn background() -> Self {
        Self::new(CancellationToken::new())
    }
}
