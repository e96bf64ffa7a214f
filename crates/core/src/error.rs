//! Error types surfaced by the workflow engine.

use crate::workflow::schema::SchemaError;
use fk_protocol::ExecutionResult;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by the engine's caller-facing entry points.
///
/// Suspension and cancellation are not errors: they come back as an
/// `Ok(ExecutionResult)` with the matching status.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Input rejected before any execution was created.
    #[error("Input validation failed for workflow '{workflow_id}': {source}")]
    InputValidation {
        workflow_id: String,
        #[source]
        source: SchemaError,
    },

    /// A step failed. The terminal state is recorded in `result`.
    #[error("Step '{step_id}' failed: {message}")]
    StepFailed {
        step_id: String,
        message: String,
        result: Box<ExecutionResult>,
    },

    /// Accumulated data failed the result schema after the last step.
    #[error("Result validation failed for workflow '{workflow_id}': {message}")]
    ResultValidation {
        workflow_id: String,
        message: String,
        result: Box<ExecutionResult>,
    },

    /// The workflow definition is malformed.
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// A suspension snapshot does not fit the workflow it is resumed on.
    #[error("Invalid suspension snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Workflow '{0}' not found")]
    WorkflowNotFound(String),

    #[error("Execution {0} not found")]
    ExecutionNotFound(Uuid),

    /// The background task driving an execution failed to join.
    #[error("Execution task failed: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// The recorded terminal state, for errors raised inside the step loop.
    pub fn execution_result(&self) -> Option<&ExecutionResult> {
        match self {
            WorkflowError::StepFailed { result, .. }
            | WorkflowError::ResultValidation { result, .. } => Some(result),
            _ => None,
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
