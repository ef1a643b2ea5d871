//! Workspace root crate.
//!
//! Carries no code of its own — every capability lives in its own
//! `engage-*` crate under this workspace. This crate exists only to host
//! `tests/`, which exercise those crates wired together the way a real
//! deployment wires them, rather than each in isolation.
