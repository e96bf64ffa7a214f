//! Fan-out of execution events to live consumers.
//!
//! The [`StreamController`] keeps, per open execution, the channel senders of
//! every attached consumer, plus a list of global listener callbacks. Events
//! are delivered to whoever is attached at publish time; nothing is replayed
//! to late subscribers. Publishing a terminal event closes the execution's
//! streams.

pub mod handle;
pub mod protocol;

use anyhow::Result as AnyResult;
use fk_protocol::StreamEvent;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};
use uuid::Uuid;

pub use handle::WorkflowStream;
pub use protocol::{to_external_protocol, to_protocol_frames, to_sse_response};

/// Lazy, finite, non-restartable sequence of one execution's events.
pub type EventStream = UnboundedReceiverStream<StreamEvent>;

/// Callback invoked for every published event of every execution.
pub type Listener = Arc<dyn Fn(&StreamEvent) -> AnyResult<()> + Send + Sync>;

/// Handle for removing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Subscribers {
    channels: HashMap<Uuid, Vec<mpsc::UnboundedSender<StreamEvent>>>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

#[derive(Clone, Default)]
pub struct StreamController {
    inner: Arc<Mutex<Subscribers>>,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an execution as open so consumers can attach before it starts.
    pub fn open(&self, execution_id: Uuid) {
        self.lock().channels.entry(execution_id).or_default();
    }

    /// Whether the execution is open (started or about to start, not finished).
    pub fn is_open(&self, execution_id: Uuid) -> bool {
        self.lock().channels.contains_key(&execution_id)
    }

    /// Attach a consumer to an execution.
    ///
    /// The stream yields every event published from now on and ends once the
    /// execution publishes its terminal event. Attaching to an execution that
    /// is not open yields an already-closed stream.
    pub fn get_stream(&self, execution_id: Uuid) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.lock().channels.get_mut(&execution_id) {
            Some(senders) => senders.push(tx),
            None => debug!(%execution_id, "stream requested for closed execution"),
        }
        UnboundedReceiverStream::new(rx)
    }

    pub fn subscriber_count(&self, execution_id: Uuid) -> usize {
        self.lock()
            .channels
            .get(&execution_id)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StreamEvent) -> AnyResult<()> + Send + Sync + 'static,
    {
        let mut subscribers = self.lock();
        let id = ListenerId(subscribers.next_listener);
        subscribers.next_listener += 1;
        subscribers.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.listeners.len();
        subscribers.listeners.retain(|(existing, _)| *existing != id);
        subscribers.listeners.len() != before
    }

    /// Deliver an event to the current subscribers of its execution.
    ///
    /// Works on a snapshot of subscribers taken under the lock. A listener
    /// that errors or panics is logged and skipped.
    pub fn publish(&self, event: StreamEvent) {
        let (senders, listeners) = {
            let mut subscribers = self.lock();
            let senders = if event.is_terminal() {
                subscribers
                    .channels
                    .remove(&event.execution_id)
                    .unwrap_or_default()
            } else {
                match subscribers.channels.get_mut(&event.execution_id) {
                    Some(senders) => {
                        senders.retain(|tx| !tx.is_closed());
                        senders.clone()
                    }
                    None => Vec::new(),
                }
            };
            (senders, subscribers.listeners.clone())
        };

        for tx in &senders {
            if tx.send(event.clone()).is_err() {
                debug!(execution_id = %event.execution_id, "stream consumer went away");
            }
        }

        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    listener = id.0,
                    event = event.event_type.as_str(),
                    error = %e,
                    "stream listener failed"
                ),
                Err(_) => warn!(
                    listener = id.0,
                    event = event.event_type.as_str(),
                    "stream listener panicked"
                ),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fk_protocol::{EventStatus, StreamEventType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_stream::StreamExt;

    fn event(kind: StreamEventType, execution_id: Uuid) -> StreamEvent {
        StreamEvent::new(kind, execution_id, "wf", EventStatus::Running)
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_events() {
        let streams = StreamController::new();
        let id = Uuid::new_v4();
        streams.open(id);

        let first = streams.get_stream(id);
        let second = streams.get_stream(id);
        assert_eq!(streams.subscriber_count(id), 2);

        streams.publish(event(StreamEventType::WorkflowStart, id));
        streams.publish(event(StreamEventType::WorkflowComplete, id));

        let first: Vec<_> = first.collect().await;
        let second: Vec<_> = second.collect().await;
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert!(!streams.is_open(id));
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_replay() {
        let streams = StreamController::new();
        let id = Uuid::new_v4();
        streams.open(id);

        streams.publish(event(StreamEventType::WorkflowStart, id));
        let late = streams.get_stream(id);
        streams.publish(event(StreamEventType::StepStart, id));
        streams.publish(event(StreamEventType::WorkflowComplete, id));

        let received: Vec<_> = late.map(|e| e.event_type).collect().await;
        assert_eq!(
            received,
            vec![StreamEventType::StepStart, StreamEventType::WorkflowComplete]
        );
    }

    #[tokio::test]
    async fn test_stream_for_closed_execution_ends_immediately() {
        let streams = StreamController::new();
        let events: Vec<_> = streams.get_stream(Uuid::new_v4()).collect().await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_events_are_scoped_to_their_execution() {
        let streams = StreamController::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        streams.open(a);
        streams.open(b);

        let stream_a = streams.get_stream(a);
        streams.publish(event(StreamEventType::WorkflowStart, b));
        streams.publish(event(StreamEventType::WorkflowComplete, a));

        let received: Vec<_> = stream_a.collect().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].execution_id, a);
        assert!(streams.is_open(b));
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let streams = StreamController::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        streams.add_listener(|_| Err(anyhow::anyhow!("listener broke")));
        streams.add_listener(|_| panic!("listener exploded"));
        let counter = Arc::clone(&delivered);
        streams.add_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let id = Uuid::new_v4();
        streams.publish(event(StreamEventType::WorkflowStart, id));
        streams.publish(event(StreamEventType::WorkflowComplete, id));

        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove_listener() {
        let streams = StreamController::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&delivered);
        let id = streams.add_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(streams.remove_listener(id));
        assert!(!streams.remove_listener(id));

        streams.publish(event(StreamEventType::WorkflowStart, Uuid::new_v4()));
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }
}
