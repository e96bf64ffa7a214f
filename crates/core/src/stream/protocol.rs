//! Adapters from internal stream events to the external event protocol.
//!
//! Each event becomes a `{type: "data-<event-kind>", data: {...}}` frame.
//! Order is preserved and the output ends exactly when the input does. A
//! terminal error is reported as an `error` frame instead of being raised.

use crate::stream::WorkflowStream;
use fk_protocol::{ProtocolFrame, StreamEvent};
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

/// Frame any event stream, e.g. one attached via `StreamController::get_stream`.
pub fn to_protocol_frames<S>(events: S) -> impl Stream<Item = ProtocolFrame> + Send
where
    S: Stream<Item = StreamEvent> + Send,
{
    events.map(|event| ProtocolFrame::from_event(&event))
}

/// Frame a workflow stream, appending an error frame if it ends in error.
pub fn to_external_protocol(stream: WorkflowStream) -> impl Stream<Item = ProtocolFrame> + Send {
    async_stream::stream! {
        let mut stream = stream;
        let execution_id = stream.execution_id();

        while let Some(event) = stream.next().await {
            yield ProtocolFrame::from_event(&event);
        }

        if let Err(e) = stream.result().await {
            warn!(%execution_id, error = %e, "execution ended with error");
            yield ProtocolFrame::error(e.to_string());
        }
    }
}

/// Frame a workflow stream as server-sent-events records.
pub fn to_sse_response(stream: WorkflowStream) -> impl Stream<Item = String> + Send {
    to_external_protocol(stream).map(|frame| frame.to_sse())
}
