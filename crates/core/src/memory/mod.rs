//! # Memory Module
//!
//! Shared context of a single run.
//!
//! ```text
//! Controller ──record/publish──► ContextStore ──snapshot──► ContextSnapshot ──► Specialists
//! ```
//!
//! The controller is the only writer. Specialists read a frozen snapshot
//! taken before the dispatch wave.

pub mod context_store;

pub use context_store::{ContextSnapshot, ContextStore, TraceAction, TraceEntry};
