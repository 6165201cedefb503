//! # State Module
//!
//! Persistence of analyst weights and run history behind [`KeyValueStore`].

pub mod db;
pub mod history;
pub mod io;
pub mod kv;
pub mod weights;

pub use db::BoardroomDb;
pub use history::{HistoryEntry, RunHistory};
pub use kv::{InMemoryStore, KeyValueStore};
pub use weights::WeightVector;
