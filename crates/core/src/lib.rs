//! # fk-core
//!
//! Workflow execution engine for flowkit.
//!
//! This crate provides:
//! - Workflow definitions built from function, agent, branch and parallel steps
//! - A step-execution state machine with cooperative suspend and cancel
//! - Live event streaming and an external event-protocol adapter
//! - Resumption of suspended executions from their snapshot
//! - A workflow registry and a background execution manager
//!
//! ## Modules
//!
//! - [`workflow`]: Workflow definitions, steps and schemas
//! - [`controller`]: Suspend/cancel controller and its abort signal
//! - [`engine`]: Workflow execution engine
//! - [`state`]: Execution state machine, manager and snapshot storage
//! - [`stream`]: Event fan-out and protocol framing
//! - [`registry`]: Workflow registry
//! - [`agents`]: Agent trait and adapter implementations
//! - [`config`]: Configuration loading and management
//!
//! ## Example
//!
//! ```rust,no_run
//! use fk_core::engine::{RunOptions, WorkflowEngine};
//! use fk_core::workflow::{Data, Step, StepOutput, Workflow};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let workflow = Arc::new(
//!     Workflow::builder("greeting")
//!         .step(Step::func("greet", |data: Data, _ctx| async move {
//!             let name = data.get("name").and_then(|v| v.as_str()).unwrap_or("world");
//!             StepOutput::from_value(json!({ "greeting": format!("hello {name}") }))
//!         }))
//!         .build()?,
//! );
//!
//! let result = WorkflowEngine::default()
//!     .run(&workflow, json!({"name": "ada"}), RunOptions::new())
//!     .await?;
//! println!("{:?}", result.result);
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod registry;
pub mod state;
pub mod stream;
pub mod workflow;

pub use controller::{AbortSignal, ControllerStatus, SignalKind, SignalPayload, SuspendController};
pub use engine::{MergeStrategy, RunOptions, WorkflowEngine};
pub use error::{WorkflowError, WorkflowResult};
pub use registry::WorkflowRegistry;
pub use state::{ExecutionManager, InMemorySnapshotStore, SnapshotStore};
pub use stream::{StreamController, WorkflowStream};
pub use workflow::{Step, StepContext, StepError, StepOutput, Workflow};
