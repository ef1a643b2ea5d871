#![deny(missing_docs)]
//! Capability-interface traits the issue-engagement orchestrator depends
//! on: durable stores, the tracker adapter, and the LLM client.
//!
//! No implementation lives here — `engage-store-memory` backs the store
//! traits for tests, and production tracker/LLM adapters live outside this
//! workspace. This crate is the seam everything else is written against.

pub mod config;
pub mod ctx;
pub mod explore;
pub mod llm;
pub mod specgen;
pub mod stores;
pub mod tracker;

pub use config::EngagementConfig;
pub use ctx::CallContext;
pub use explore::{Explorer, Locator};
pub use llm::LlmClient;
pub use specgen::{SpecGenRequest, SpecGenResult, SpecGenerator};
pub use stores::{
    EventLogStore, FindingsTransaction, FollowUpEvent, GapStore, Integration, IntegrationStore,
    IssueStore, LearningStore, NewFinding, NewGap, NewLearning, OpenGapCounts, QueueError,
    QueueProducer,
};
pub use tracker::{CommentRef, DiscussionRef, TrackerAdapter};
