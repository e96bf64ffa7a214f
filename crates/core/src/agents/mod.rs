//! Agent abstraction.
//!
//! This module provides the `Agent` trait (Adapter Pattern) that agent
//! steps drive, plus the adapters shipped with the crate.

pub mod adapters;
pub mod base;

pub use adapters::MockAgent;
pub use base::{Agent, AgentContext, AgentError, AgentEvent, AgentStream};
