//! Handle returned by the streaming entry points.

use crate::error::WorkflowError;
use crate::stream::EventStream;
use fk_protocol::{ExecutionResult, StreamEvent};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use uuid::Uuid;

/// A running execution viewed as a live event stream.
///
/// Iterate it for [`StreamEvent`]s; the stream ends after the terminal
/// event. Call [`WorkflowStream::result`] for the terminal outcome, which
/// resolves exactly as `run` would.
pub struct WorkflowStream {
    execution_id: Uuid,
    events: EventStream,
    task: JoinHandle<Result<ExecutionResult, WorkflowError>>,
}

impl WorkflowStream {
    pub(crate) fn new(
        execution_id: Uuid,
        events: EventStream,
        task: JoinHandle<Result<ExecutionResult, WorkflowError>>,
    ) -> Self {
        Self {
            execution_id,
            events,
            task,
        }
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Wait for the execution to finish.
    ///
    /// Unconsumed events are dropped.
    pub async fn result(self) -> Result<ExecutionResult, WorkflowError> {
        self.task
            .await
            .map_err(|e| WorkflowError::Internal(e.to_string()))?
    }

    /// Project the execution into SSE-framed external protocol records.
    pub fn to_external_protocol_response(self) -> impl Stream<Item = String> + Send {
        super::protocol::to_sse_response(self)
    }
}

impl Stream for WorkflowStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}
