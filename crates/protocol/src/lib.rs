//! # fk-protocol
//!
//! Shared data models for flowkit.
//!
//! This crate defines the data structures exchanged between the workflow
//! engine and anything that consumes it:
//! - Terminal execution results and suspension snapshots
//! - Ordered stream events emitted during execution
//! - The external `{type, data}` event-protocol frame
//!
//! ## Modules
//!
//! - [`execution_models`]: Execution status, usage, snapshots and results
//! - [`stream_models`]: Stream events and external protocol frames
//!
//! ## Design Principles
//!
//! - Minimal dependencies: only serde, ts-rs, uuid and chrono
//! - TypeScript generation: all types derive `TS` for client compatibility
//! - Independent compilation: no dependencies on other flowkit crates

pub mod execution_models;
pub mod stream_models;

// Re-export all public types for convenience
pub use execution_models::*;
pub use stream_models::*;
