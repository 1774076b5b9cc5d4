//! `loopwork` keeps the local state of an iterative agent execution loop:
//! the dependency graph of a parent issue's sub-tasks, a durable per-issue
//! store, reconciliation against a remote tracker, and parsing of the
//! structured reports each execution session emits.

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod model;
pub mod outcome;
pub mod storage;
pub mod sync;

pub use error::{LoopError, Result, StructuredError, ValidationError};
pub use graph::{GraphItem, StatusOverrides, TaskGraph};
pub use outcome::{Outcome, OutcomeKind};
pub use storage::StateStore;
