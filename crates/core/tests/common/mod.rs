//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality across all integration tests:
//! - Test fixtures (sample workflows, input data)
//! - Custom assertions over event sequences
//! - Mock steps

pub mod assertions;
pub mod fixtures;
pub mod mock_steps;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mock_steps::*;
