//! Runtime execution state models.
//!
//! This module defines the structures describing a single workflow
//! execution: its status, usage counters, suspension snapshot and the
//! terminal result handed back to callers.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use uuid::Uuid;

/// Lifecycle status of a workflow execution.
///
/// The status progresses through these states during normal execution:
/// Running -> Completed
///
/// Terminal alternatives:
/// - Suspended: paused at a step boundary, resumable from its snapshot
/// - Error: a step or the result validation failed
/// - Cancelled: aborted irrecoverably
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Execution is actively iterating over its steps.
    Running,

    /// Execution stopped at a step boundary and can be resumed.
    Suspended,

    /// All steps ran and the result passed validation.
    Completed,

    /// A step failed or the accumulated data failed the result schema.
    Error,

    /// Execution was cancelled. No further transitions are possible.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns true once the execution can no longer make progress.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

/// Token counters accumulated across the steps of one execution.
///
/// Counters only ever grow. Steps that report nothing contribute zero.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    /// Build a usage record, deriving the total from its parts.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Add another usage record into this one.
    pub fn accumulate(&mut self, other: &Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Resumable snapshot of a suspended execution.
///
/// This is the layout handed to external storage. The core never
/// persists it itself.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct SuspensionSnapshot {
    #[ts(type = "string")]
    pub execution_id: Uuid,

    pub workflow_id: String,

    /// Index of the step the execution resumes at.
    pub step_index: usize,

    /// Accumulated data at the moment of suspension.
    #[ts(type = "Record<string, unknown>")]
    pub data: Value,

    #[serde(default)]
    pub reason: Option<String>,

    #[ts(type = "string")]
    pub suspended_at: DateTime<Utc>,
}

/// Error captured on a failed execution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    pub message: String,

    /// Step that raised the error. `None` for result validation failures.
    #[serde(default)]
    pub step_id: Option<String>,
}

/// Terminal outcome of a workflow execution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[ts(type = "string")]
    pub execution_id: Uuid,

    pub workflow_id: String,

    pub status: ExecutionStatus,

    #[ts(type = "string")]
    pub start_at: DateTime<Utc>,

    #[ts(type = "string")]
    pub end_at: DateTime<Utc>,

    pub usage: Usage,

    /// Accumulated data. Set only when the execution completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "Record<string, unknown> | null")]
    pub result: Option<Value>,

    /// Set only when the execution ended with `status = error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,

    /// Set only when the execution ended with `status = suspended`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension: Option<SuspensionSnapshot>,

    /// Set only when the execution ended with `status = cancelled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl ExecutionResult {
    /// Deserialize the completed result into a caller-provided type.
    ///
    /// A result that is absent (the execution did not complete)
    /// deserializes from `null`.
    pub fn result_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.result.clone().unwrap_or(Value::Null))
    }
}
