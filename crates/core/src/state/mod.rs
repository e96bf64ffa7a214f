//! State management for workflow executions.
//!
//! This module provides:
//! - Execution state machine logic
//! - ExecutionManager for coordinating multiple executions
//! - Snapshot storage for suspended executions

pub mod execution;
pub mod manager;
pub mod store;

pub use execution::ExecutionState;
pub use manager::ExecutionManager;
pub use store::{InMemorySnapshotStore, SnapshotStore};
