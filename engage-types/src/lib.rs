#![deny(missing_docs)]
//! Domain types, Action schema, and error taxonomy for the issue-engagement
//! orchestrator.
//!
//! This crate has no I/O and no async — it is the shared vocabulary that
//! `engage-core`'s store traits, `engage-validate`, `engage-exec`, and the
//! drivers in `engage-planner`/`engage-specgen` all speak.

pub mod action;
pub mod domain;
pub mod error;
pub mod gap;
pub mod llm;

pub use action::*;
pub use domain::*;
pub use error::*;
pub use gap::*;
pub use llm::*;
