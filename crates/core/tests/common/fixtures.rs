//! Test fixtures for creating sample workflows and data.

use super::mock_steps::{append_step, suspending_step};
use fk_core::error::WorkflowResult;
use fk_core::workflow::{Data, RequiredFields, Step, Workflow};
use fk_core::WorkflowStream;
use fk_protocol::{ExecutionResult, StreamEvent};
use serde_json::Value;
use std::sync::Arc;
use tokio_stream::StreamExt;

/// Unwrap a JSON object literal into workflow data.
#[allow(dead_code)]
pub fn object(value: Value) -> Data {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

#[allow(dead_code)]
pub fn workflow(id: &str, steps: Vec<Step>) -> Arc<Workflow> {
    Arc::new(
        Workflow::builder(id)
            .steps(steps)
            .build()
            .expect("valid workflow"),
    )
}

/// Two steps appending " john" then " doe" to `name`.
#[allow(dead_code)]
pub fn greeting_workflow() -> Arc<Workflow> {
    Arc::new(
        Workflow::builder("greeting")
            .input_schema(RequiredFields::new(["name"]))
            .result_schema(RequiredFields::new(["name"]))
            .step(append_step("step1", "name", " john"))
            .step(append_step("step2", "name", " doe"))
            .build()
            .expect("valid workflow"),
    )
}

/// Three steps; the middle one suspends until resumed.
#[allow(dead_code)]
pub fn approval_workflow() -> Arc<Workflow> {
    workflow(
        "approval",
        vec![
            append_step("prepare", "log", "prepared;"),
            suspending_step("approve", "awaiting approval"),
            append_step("finish", "log", "finished;"),
        ],
    )
}

/// Drain a workflow stream and return its events with the terminal outcome.
#[allow(dead_code)]
pub async fn collect(
    mut stream: WorkflowStream,
) -> (Vec<StreamEvent>, WorkflowResult<ExecutionResult>) {
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    (events, stream.result().await)
}
