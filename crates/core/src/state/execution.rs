//! Execution state machine implementation.
//!
//! This module provides functions for managing the lifecycle of one
//! execution, including state transitions and event emission. Every
//! terminal transition returns the caller-facing [`ExecutionResult`].

use crate::engine::merge::MergeStrategy;
use crate::stream::StreamController;
use crate::workflow::{Data, Step, StepOutput};
use chrono::{DateTime, Utc};
use fk_protocol::{
    EventStatus, ExecutionError, ExecutionResult, ExecutionStatus, StreamEvent, StreamEventType,
    SuspensionSnapshot, Usage,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Mutable state of one execution, owned by the executor driving it.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub execution_id: Uuid,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub current_step_index: usize,
    pub data: Data,
    pub usage: Usage,
    pub result: Option<Value>,
    pub error: Option<ExecutionError>,
    pub suspension: Option<SuspensionSnapshot>,
    pub cancel_reason: Option<String>,
    /// Input handed to `resume`, delivered to the first step that runs.
    pub(crate) resume_data: Option<Value>,
}

impl ExecutionState {
    /// The caller-facing view of this state.
    pub fn to_result(&self) -> ExecutionResult {
        ExecutionResult {
            execution_id: self.execution_id,
            workflow_id: self.workflow_id.clone(),
            status: self.status,
            start_at: self.start_at,
            end_at: self.end_at.unwrap_or_else(Utc::now),
            usage: self.usage,
            result: self.result.clone(),
            error: self.error.clone(),
            suspension: self.suspension.clone(),
            cancel_reason: self.cancel_reason.clone(),
        }
    }

    pub(crate) fn take_resume_data(&mut self) -> Option<Value> {
        self.resume_data.take()
    }
}

/// Create a new execution in Running status at step 0.
pub fn create_execution(execution_id: Uuid, workflow_id: &str, data: Data) -> ExecutionState {
    ExecutionState {
        execution_id,
        workflow_id: workflow_id.to_string(),
        status: ExecutionStatus::Running,
        start_at: Utc::now(),
        end_at: None,
        current_step_index: 0,
        data,
        usage: Usage::default(),
        result: None,
        error: None,
        suspension: None,
        cancel_reason: None,
        resume_data: None,
    }
}

/// Rebuild a Running execution from a suspension snapshot.
///
/// The snapshot's data and `new_input` are merged with `strategy`; the
/// execution keeps the snapshot's id and restarts at its step index.
pub fn restore_execution(
    snapshot: &SuspensionSnapshot,
    new_input: Data,
    strategy: MergeStrategy,
) -> ExecutionState {
    let mut data = match &snapshot.data {
        Value::Object(map) => map.clone(),
        _ => Data::new(),
    };
    let resume_data = Value::Object(new_input.clone());
    strategy.merge(&mut data, new_input);

    let mut state = create_execution(snapshot.execution_id, &snapshot.workflow_id, data);
    state.current_step_index = snapshot.step_index;
    state.resume_data = Some(resume_data);
    state
}

/// Emit the workflow-start event.
pub fn start_execution(state: &ExecutionState, streams: &StreamController) {
    info!(
        execution_id = %state.execution_id,
        workflow_id = %state.workflow_id,
        step_index = state.current_step_index,
        "workflow execution started"
    );

    let mut event = StreamEvent::new(
        StreamEventType::WorkflowStart,
        state.execution_id,
        state.workflow_id.as_str(),
        EventStatus::Running,
    )
    .with_input(Value::Object(state.data.clone()));

    if state.current_step_index > 0 {
        event = event.with_metadata(json!({
            "resumed": true,
            "stepIndex": state.current_step_index,
        }));
    }
    streams.publish(event);
}

/// Emit step-start for the step at the current index.
pub fn start_step(state: &ExecutionState, step: &Step, streams: &StreamController) {
    debug!(
        execution_id = %state.execution_id,
        step_id = step.id(),
        step_index = state.current_step_index,
        "step started"
    );

    streams.publish(
        StreamEvent::new(
            StreamEventType::StepStart,
            state.execution_id,
            step.id(),
            EventStatus::Running,
        )
        .with_step(state.current_step_index, step.step_type())
        .with_input(Value::Object(state.data.clone())),
    );
}

/// Fold a step's output into the accumulated data and emit step-complete.
pub fn complete_step(
    state: &mut ExecutionState,
    step: &Step,
    output: StepOutput,
    strategy: MergeStrategy,
    streams: &StreamController,
) {
    if let Some(usage) = &output.usage {
        state.usage.accumulate(usage);
    }

    let event = StreamEvent::new(
        StreamEventType::StepComplete,
        state.execution_id,
        step.id(),
        EventStatus::Success,
    )
    .with_step(state.current_step_index, step.step_type())
    .with_output(Value::Object(output.data.clone()));

    strategy.merge(&mut state.data, output.data);
    streams.publish(event);
}

/// Move to the next step.
pub fn advance_step(state: &mut ExecutionState) {
    state.current_step_index += 1;
}

/// Finish successfully with the accumulated data as result.
pub fn complete_execution(state: &mut ExecutionState, streams: &StreamController) -> ExecutionResult {
    let result = Value::Object(state.data.clone());
    state.status = ExecutionStatus::Completed;
    state.result = Some(result.clone());
    state.end_at = Some(Utc::now());

    info!(
        execution_id = %state.execution_id,
        workflow_id = %state.workflow_id,
        total_tokens = state.usage.total_tokens,
        "workflow execution completed"
    );

    streams.publish(
        StreamEvent::new(
            StreamEventType::WorkflowComplete,
            state.execution_id,
            state.workflow_id.as_str(),
            EventStatus::Success,
        )
        .with_output(result)
        .with_metadata(json!({ "usage": state.usage })),
    );
    state.to_result()
}

/// Freeze the execution at the current step index.
pub fn suspend_execution(
    state: &mut ExecutionState,
    reason: Option<String>,
    streams: &StreamController,
) -> ExecutionResult {
    let now = Utc::now();
    let snapshot = SuspensionSnapshot {
        execution_id: state.execution_id,
        workflow_id: state.workflow_id.clone(),
        step_index: state.current_step_index,
        data: Value::Object(state.data.clone()),
        reason: reason.clone(),
        suspended_at: now,
    };
    state.status = ExecutionStatus::Suspended;
    state.suspension = Some(snapshot);
    state.end_at = Some(now);

    info!(
        execution_id = %state.execution_id,
        step_index = state.current_step_index,
        reason = reason.as_deref().unwrap_or(""),
        "workflow execution suspended"
    );

    streams.publish(
        StreamEvent::new(
            StreamEventType::WorkflowSuspend,
            state.execution_id,
            state.workflow_id.as_str(),
            EventStatus::Suspended,
        )
        .with_output(Value::Object(state.data.clone()))
        .with_metadata(json!({
            "reason": reason,
            "stepIndex": state.current_step_index,
        })),
    );
    state.to_result()
}

/// Abort irrecoverably.
///
/// Reported on the stream as a workflow-error event with status
/// `cancelled`; `error` stays unset.
pub fn cancel_execution(
    state: &mut ExecutionState,
    reason: Option<String>,
    streams: &StreamController,
) -> ExecutionResult {
    state.status = ExecutionStatus::Cancelled;
    state.cancel_reason = reason.clone();
    state.end_at = Some(Utc::now());

    info!(
        execution_id = %state.execution_id,
        step_index = state.current_step_index,
        reason = reason.as_deref().unwrap_or(""),
        "workflow execution cancelled"
    );

    streams.publish(
        StreamEvent::new(
            StreamEventType::WorkflowError,
            state.execution_id,
            state.workflow_id.as_str(),
            EventStatus::Cancelled,
        )
        .with_metadata(json!({
            "reason": reason,
            "stepIndex": state.current_step_index,
        })),
    );
    state.to_result()
}

/// Emit workflow-error for a run that was dropped before it finalized.
///
/// Only the ids survive at that point, so nothing is recorded; the event
/// closes the execution's streams.
pub fn abandon_execution(execution_id: Uuid, workflow_id: &str, streams: &StreamController) {
    warn!(%execution_id, %workflow_id, "execution dropped before reaching a terminal state");

    streams.publish(
        StreamEvent::new(
            StreamEventType::WorkflowError,
            execution_id,
            workflow_id,
            EventStatus::Error,
        )
        .with_output(json!({
            "message": "execution dropped before reaching a terminal state",
            "stepId": null,
        })),
    );
}

/// Record a failure and emit workflow-error.
pub fn fail_execution(
    state: &mut ExecutionState,
    step_id: Option<&str>,
    message: String,
    streams: &StreamController,
) -> ExecutionResult {
    let error = ExecutionError {
        message,
        step_id: step_id.map(str::to_string),
    };
    state.status = ExecutionStatus::Error;
    state.error = Some(error.clone());
    state.end_at = Some(Utc::now());

    warn!(
        execution_id = %state.execution_id,
        workflow_id = %state.workflow_id,
        step_id = step_id.unwrap_or(""),
        error = %error.message,
        "workflow execution failed"
    );

    streams.publish(
        StreamEvent::new(
            StreamEventType::WorkflowError,
            state.execution_id,
            state.workflow_id.as_str(),
            EventStatus::Error,
        )
        .with_output(json!({
            "message": error.message,
            "stepId": error.step_id,
        })),
    );
    state.to_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn data(value: Value) -> Data {
        match value {
            Value::Object(map) => map,
            _ => Data::new(),
        }
    }

    fn noop(id: &str) -> Step {
        Step::func(id, |_d, _c| async { Ok(StepOutput::empty()) })
    }

    #[test]
    fn test_create_execution() {
        let id = Uuid::new_v4();
        let state = create_execution(id, "wf", data(json!({"a": 1})));

        assert_eq!(state.execution_id, id);
        assert_eq!(state.status, ExecutionStatus::Running);
        assert_eq!(state.current_step_index, 0);
        assert_eq!(state.usage, Usage::default());
        assert!(state.result.is_none());
        assert!(state.end_at.is_none());
    }

    #[test]
    fn test_advance_step() {
        let mut state = create_execution(Uuid::new_v4(), "wf", Data::new());
        advance_step(&mut state);
        advance_step(&mut state);
        assert_eq!(state.current_step_index, 2);
    }

    #[test]
    fn test_complete_step_merges_and_accumulates() {
        let streams = StreamController::new();
        let mut state = create_execution(Uuid::new_v4(), "wf", data(json!({"a": 1, "b": 1})));

        let output = StepOutput::new(data(json!({"b": 2, "c": 3}))).with_usage(Usage::new(2, 1));
        complete_step(&mut state, &noop("s"), output, MergeStrategy::Shallow, &streams);
        complete_step(
            &mut state,
            &noop("t"),
            StepOutput::empty(),
            MergeStrategy::Shallow,
            &streams,
        );

        assert_eq!(Value::Object(state.data.clone()), json!({"a": 1, "b": 2, "c": 3}));
        assert_eq!(state.usage, Usage::new(2, 1));
    }

    #[tokio::test]
    async fn test_complete_execution_emits_terminal_event() {
        let streams = StreamController::new();
        let mut state = create_execution(Uuid::new_v4(), "wf", data(json!({"x": 1})));
        streams.open(state.execution_id);
        let events = streams.get_stream(state.execution_id);

        let result = complete_execution(&mut state, &streams);
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.result, Some(json!({"x": 1})));

        let events: Vec<_> = events.collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, StreamEventType::WorkflowComplete);
    }

    #[test]
    fn test_suspend_execution_records_snapshot() {
        let streams = StreamController::new();
        let mut state = create_execution(Uuid::new_v4(), "wf", data(json!({"x": 1})));
        state.current_step_index = 2;

        let result = suspend_execution(&mut state, Some("approval".to_string()), &streams);

        assert_eq!(result.status, ExecutionStatus::Suspended);
        assert!(result.error.is_none());
        let snapshot = result.suspension.unwrap();
        assert_eq!(snapshot.step_index, 2);
        assert_eq!(snapshot.reason.as_deref(), Some("approval"));
        assert_eq!(snapshot.data, json!({"x": 1}));
    }

    #[test]
    fn test_cancel_execution_is_not_an_error() {
        let streams = StreamController::new();
        let mut state = create_execution(Uuid::new_v4(), "wf", Data::new());

        let result = cancel_execution(&mut state, Some("user".to_string()), &streams);

        assert_eq!(result.status, ExecutionStatus::Cancelled);
        assert_eq!(result.cancel_reason.as_deref(), Some("user"));
        assert!(result.error.is_none());
        assert!(result.result.is_none());
    }

    #[test]
    fn test_fail_execution_records_step() {
        let streams = StreamController::new();
        let mut state = create_execution(Uuid::new_v4(), "wf", Data::new());

        let result = fail_execution(&mut state, Some("step-2"), "boom".to_string(), &streams);

        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(
            result.error,
            Some(ExecutionError {
                message: "boom".to_string(),
                step_id: Some("step-2".to_string()),
            })
        );
    }

    #[test]
    fn test_restore_execution_merges_new_input() {
        let snapshot = SuspensionSnapshot {
            execution_id: Uuid::new_v4(),
            workflow_id: "wf".to_string(),
            step_index: 1,
            data: json!({"amount": 500, "approved": false}),
            reason: None,
            suspended_at: Utc::now(),
        };

        let mut state = restore_execution(
            &snapshot,
            data(json!({"approved": true})),
            MergeStrategy::Shallow,
        );

        assert_eq!(state.execution_id, snapshot.execution_id);
        assert_eq!(state.current_step_index, 1);
        assert_eq!(state.status, ExecutionStatus::Running);
        assert_eq!(
            Value::Object(state.data.clone()),
            json!({"amount": 500, "approved": true})
        );
        assert_eq!(state.take_resume_data(), Some(json!({"approved": true})));
        assert_eq!(state.take_resume_data(), None);
    }
}
