//! Workflow execution engine.
//!
//! The WorkflowEngine validates input, drives a workflow's steps in order,
//! checks the suspend controller at every step boundary, and publishes
//! lifecycle events through its [`StreamController`].

pub mod merge;
pub mod options;

use crate::config::EngineConfig;
use crate::controller::SuspendController;
use crate::error::{WorkflowError, WorkflowResult};
use crate::state::execution::{
    abandon_execution, advance_step, cancel_execution, complete_execution, complete_step,
    create_execution, fail_execution, restore_execution, start_execution, start_step,
    suspend_execution, ExecutionState,
};
use crate::stream::{StreamController, WorkflowStream};
use crate::workflow::schema::{value_kind, SchemaError};
use crate::workflow::{Data, StepContext, StepError, Workflow};
use fk_protocol::{ExecutionResult, SuspensionSnapshot};
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

pub use merge::MergeStrategy;
pub use options::RunOptions;

/// The main workflow execution engine.
///
/// Cheap to clone; clones share the same stream controller, so a consumer
/// attached through [`WorkflowEngine::streams`] sees events from every run
/// started by any clone.
#[derive(Clone, Default)]
pub struct WorkflowEngine {
    streams: StreamController,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            streams: StreamController::new(),
            config,
        }
    }

    pub fn streams(&self) -> &StreamController {
        &self.streams
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Check `input` against the workflow's input schema.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InputValidation`] if the input is not a JSON
    /// object or the schema rejects it.
    pub fn validate_input(&self, workflow: &Workflow, input: Value) -> WorkflowResult<Data> {
        let invalid = |source: SchemaError| WorkflowError::InputValidation {
            workflow_id: workflow.id().to_string(),
            source,
        };

        if !input.is_object() {
            return Err(invalid(SchemaError::NotAnObject(value_kind(&input))));
        }
        workflow.input_schema().validate(&input).map_err(invalid)?;
        match input {
            Value::Object(data) => Ok(data),
            other => Err(invalid(SchemaError::NotAnObject(value_kind(&other)))),
        }
    }

    /// Execute a workflow to its terminal state.
    ///
    /// # Arguments
    ///
    /// * `workflow` - The workflow definition to execute
    /// * `input` - Initial data, a JSON object
    /// * `options` - Controller, caller identity and timeout for this run
    ///
    /// # Returns
    ///
    /// The terminal `ExecutionResult`. Suspended and cancelled executions are
    /// returned as `Ok` with the matching status.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input fails validation (no execution is created)
    /// - A step fails
    /// - The accumulated data fails the result schema
    pub async fn run(
        &self,
        workflow: &Arc<Workflow>,
        input: Value,
        options: RunOptions,
    ) -> WorkflowResult<ExecutionResult> {
        let data = self.validate_input(workflow, input)?;
        let execution_id = options.execution_id.unwrap_or_else(Uuid::new_v4);
        let state = create_execution(execution_id, workflow.id(), data);

        self.streams.open(execution_id);
        self.execute(Arc::clone(workflow), state, options).await
    }

    /// Execute a workflow in the background and observe it live.
    ///
    /// Input is validated before anything is spawned, so a validation error
    /// is returned here rather than through [`WorkflowStream::result`]. The
    /// returned stream is attached before the first event is published.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stream(
        &self,
        workflow: &Arc<Workflow>,
        input: Value,
        options: RunOptions,
    ) -> WorkflowResult<WorkflowStream> {
        let data = self.validate_input(workflow, input)?;
        let execution_id = options.execution_id.unwrap_or_else(Uuid::new_v4);
        let state = create_execution(execution_id, workflow.id(), data);

        Ok(self.spawn(Arc::clone(workflow), state, options))
    }

    /// Continue a suspended execution from its snapshot.
    ///
    /// The snapshot's data is merged with `new_input` and the loop restarts
    /// at the snapshot's step index, so completed steps are not re-run. The
    /// execution keeps the snapshot's id.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidSnapshot`] if the snapshot belongs to
    /// another workflow or points past its last step, and
    /// [`WorkflowError::InputValidation`] if `new_input` is neither an object
    /// nor null. Otherwise fails like [`WorkflowEngine::run`].
    pub async fn resume(
        &self,
        workflow: &Arc<Workflow>,
        snapshot: &SuspensionSnapshot,
        new_input: Value,
        options: RunOptions,
    ) -> WorkflowResult<ExecutionResult> {
        let state = self.restore(workflow, snapshot, new_input)?;

        self.streams.open(state.execution_id);
        self.execute(Arc::clone(workflow), state, options).await
    }

    /// Streaming form of [`WorkflowEngine::resume`].
    pub fn resume_stream(
        &self,
        workflow: &Arc<Workflow>,
        snapshot: &SuspensionSnapshot,
        new_input: Value,
        options: RunOptions,
    ) -> WorkflowResult<WorkflowStream> {
        let state = self.restore(workflow, snapshot, new_input)?;
        Ok(self.spawn(Arc::clone(workflow), state, options))
    }

    fn restore(
        &self,
        workflow: &Workflow,
        snapshot: &SuspensionSnapshot,
        new_input: Value,
    ) -> WorkflowResult<ExecutionState> {
        if snapshot.workflow_id != workflow.id() {
            return Err(WorkflowError::InvalidSnapshot(format!(
                "snapshot of workflow '{}' cannot resume workflow '{}'",
                snapshot.workflow_id,
                workflow.id()
            )));
        }
        if snapshot.step_index > workflow.steps().len() {
            return Err(WorkflowError::InvalidSnapshot(format!(
                "step index {} is out of range for {} steps",
                snapshot.step_index,
                workflow.steps().len()
            )));
        }
        if !snapshot.data.is_object() {
            return Err(WorkflowError::InvalidSnapshot(format!(
                "snapshot data must be an object, got {}",
                value_kind(&snapshot.data)
            )));
        }

        let new_input = match new_input {
            Value::Object(data) => data,
            Value::Null => Data::new(),
            other => {
                return Err(WorkflowError::InputValidation {
                    workflow_id: workflow.id().to_string(),
                    source: SchemaError::NotAnObject(value_kind(&other)),
                })
            }
        };

        info!(
            execution_id = %snapshot.execution_id,
            workflow_id = %snapshot.workflow_id,
            step_index = snapshot.step_index,
            "resuming suspended execution"
        );
        Ok(restore_execution(
            snapshot,
            new_input,
            self.config.merge_strategy,
        ))
    }

    fn spawn(
        &self,
        workflow: Arc<Workflow>,
        state: ExecutionState,
        options: RunOptions,
    ) -> WorkflowStream {
        let execution_id = state.execution_id;
        self.streams.open(execution_id);
        let events = self.streams.get_stream(execution_id);

        let engine = self.clone();
        let task = tokio::spawn(async move { engine.execute(workflow, state, options).await });
        WorkflowStream::new(execution_id, events, task)
    }

    async fn execute(
        &self,
        workflow: Arc<Workflow>,
        mut state: ExecutionState,
        options: RunOptions,
    ) -> WorkflowResult<ExecutionResult> {
        let controller = options.controller.clone().unwrap_or_default();
        let mut guard = RunGuard {
            streams: self.streams.clone(),
            execution_id: state.execution_id,
            workflow_id: state.workflow_id.clone(),
            timer: self.arm_timeout(&controller, options.timeout, state.execution_id),
            settled: false,
        };

        let outcome = self
            .drive(&workflow, &mut state, &controller, &options)
            .await;

        guard.settled = true;
        outcome
    }

    /// Cancel the run with reason `"timeout"` once the deadline passes.
    fn arm_timeout(
        &self,
        controller: &SuspendController,
        timeout: Option<Duration>,
        execution_id: Uuid,
    ) -> Option<JoinHandle<()>> {
        let timeout = timeout.or_else(|| self.config.default_timeout())?;
        let controller = controller.clone();

        Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if controller.cancel(Some("timeout")) {
                info!(%execution_id, ?timeout, "execution timed out");
            }
        }))
    }

    async fn drive(
        &self,
        workflow: &Workflow,
        state: &mut ExecutionState,
        controller: &SuspendController,
        options: &RunOptions,
    ) -> WorkflowResult<ExecutionResult> {
        start_execution(state, &self.streams);

        while let Some(step) = workflow.step(state.current_step_index) {
            if let Some(result) = self.interrupted(state, controller) {
                return Ok(result);
            }

            start_step(state, step, &self.streams);

            let ctx = StepContext {
                execution_id: state.execution_id,
                workflow_id: state.workflow_id.clone(),
                step_id: step.id().to_string(),
                step_index: state.current_step_index,
                user_id: options.user_id.clone(),
                conversation_id: options.conversation_id.clone(),
                controller: controller.clone(),
                resume_data: state.take_resume_data(),
            };
            let outcome = AssertUnwindSafe(step.execute(state.data.clone(), &ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(StepError::from_panic(panic)));

            // A step interrupted mid-flight loses its output.
            if let Some(result) = self.interrupted(state, controller) {
                debug!(
                    execution_id = %state.execution_id,
                    step_id = step.id(),
                    "discarding output of interrupted step"
                );
                return Ok(result);
            }

            match outcome {
                Ok(output) => complete_step(
                    state,
                    step,
                    output,
                    self.config.merge_strategy,
                    &self.streams,
                ),
                Err(e) => {
                    let message = e.to_string();
                    let result =
                        fail_execution(state, Some(step.id()), message.clone(), &self.streams);
                    return Err(WorkflowError::StepFailed {
                        step_id: step.id().to_string(),
                        message,
                        result: Box::new(result),
                    });
                }
            }

            advance_step(state);
        }

        if self.config.validate_result {
            let data = Value::Object(state.data.clone());
            if let Err(e) = workflow.result_schema().validate(&data) {
                let message = e.to_string();
                let result = fail_execution(
                    state,
                    None,
                    format!("result validation failed: {message}"),
                    &self.streams,
                );
                return Err(WorkflowError::ResultValidation {
                    workflow_id: workflow.id().to_string(),
                    message,
                    result: Box::new(result),
                });
            }
        }

        Ok(complete_execution(state, &self.streams))
    }

    /// Finalize the execution if the controller left the active state.
    fn interrupted(
        &self,
        state: &mut ExecutionState,
        controller: &SuspendController,
    ) -> Option<ExecutionResult> {
        if controller.is_cancelled() {
            return Some(cancel_execution(
                state,
                controller.cancel_reason(),
                &self.streams,
            ));
        }
        if controller.is_suspended() {
            return Some(suspend_execution(state, controller.reason(), &self.streams));
        }
        None
    }
}

/// Stops the timeout timer, and closes the execution's streams if the run
/// is dropped before `drive` returns.
struct RunGuard {
    streams: StreamController,
    execution_id: Uuid,
    workflow_id: String,
    timer: Option<JoinHandle<()>>,
    settled: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if !self.settled {
            abandon_execution(self.execution_id, &self.workflow_id, &self.streams);
        }
    }
}
