//! Stream event protocol.
//!
//! This module defines the ordered lifecycle events emitted while a
//! workflow executes, and the external frame format they are projected
//! into for transports.
//!
//! Internal events serialize with a kebab-case `type` tag:
//! ```json
//! {
//!   "type": "step-start",
//!   "executionId": "uuid-here",
//!   "from": "fetch-user",
//!   "status": "running",
//!   "timestamp": "2026-01-01T00:00:00Z",
//!   "stepIndex": 0,
//!   "stepType": "func"
//! }
//! ```
//!
//! External frames wrap the event fields under `data`:
//! ```json
//! { "type": "data-step-start", "data": { "executionId": "...", ... } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use uuid::Uuid;

/// Kind of lifecycle event.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "kebab-case")]
pub enum StreamEventType {
    WorkflowStart,
    WorkflowSuspend,
    WorkflowComplete,
    WorkflowError,
    StepStart,
    StepComplete,
}

impl StreamEventType {
    /// The kebab-case name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            StreamEventType::WorkflowStart => "workflow-start",
            StreamEventType::WorkflowSuspend => "workflow-suspend",
            StreamEventType::WorkflowComplete => "workflow-complete",
            StreamEventType::WorkflowError => "workflow-error",
            StreamEventType::StepStart => "step-start",
            StreamEventType::StepComplete => "step-complete",
        }
    }

    /// Whether this event closes the execution's stream.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamEventType::WorkflowSuspend
                | StreamEventType::WorkflowComplete
                | StreamEventType::WorkflowError
        )
    }
}

/// Status carried by a single event.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Running,
    Success,
    Suspended,
    Error,
    Cancelled,
}

/// Kind of step an event originates from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub enum StepType {
    Func,
    Agent,
    Conditional,
    Parallel,
}

/// A single ordered, immutable lifecycle notification.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: StreamEventType,

    #[ts(type = "string")]
    pub execution_id: Uuid,

    /// Workflow id for workflow-level events, step id for step events.
    pub from: String,

    pub status: EventStatus,

    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub input: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_type: Option<StepType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "Record<string, unknown> | null")]
    pub metadata: Option<Value>,
}

impl StreamEvent {
    /// Create an event with only the common fields populated.
    pub fn new(
        event_type: StreamEventType,
        execution_id: Uuid,
        from: impl Into<String>,
        status: EventStatus,
    ) -> Self {
        Self {
            event_type,
            execution_id,
            from: from.into(),
            status,
            timestamp: Utc::now(),
            input: None,
            output: None,
            step_index: None,
            step_type: None,
            metadata: None,
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_step(mut self, step_index: usize, step_type: StepType) -> Self {
        self.step_index = Some(step_index);
        self.step_type = Some(step_type);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.event_type.is_terminal()
    }
}

/// External event-protocol record: `{type, data}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct ProtocolFrame {
    #[serde(rename = "type")]
    pub frame_type: String,

    #[ts(type = "Record<string, unknown>")]
    pub data: Value,
}

impl ProtocolFrame {
    /// Frame type used for terminal errors surfaced by the adapter.
    pub const ERROR: &'static str = "error";

    /// Project a stream event into its `data-<event-kind>` frame.
    pub fn from_event(event: &StreamEvent) -> Self {
        let data = match serde_json::to_value(event) {
            Ok(Value::Object(mut fields)) => {
                fields.remove("type");
                Value::Object(fields)
            }
            _ => Value::Object(Map::new()),
        };

        Self {
            frame_type: format!("data-{}", event.event_type.as_str()),
            data,
        }
    }

    /// A protocol-level error frame.
    pub fn error(message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("message".to_string(), Value::String(message.into()));
        Self {
            frame_type: Self::ERROR.to_string(),
            data: Value::Object(data),
        }
    }

    /// Encode as a server-sent-events record (`data: <json>\n\n`).
    pub fn to_sse(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("data: {json}\n\n")
    }
}
