//! Custom assertion helpers over stream event sequences.

use fk_protocol::{StreamEvent, StreamEventType};

/// Assert the sequence starts with workflow-start and ends with its only
/// terminal event. Returns that terminal event.
#[allow(dead_code)]
pub fn assert_single_terminal_last(events: &[StreamEvent]) -> &StreamEvent {
    let Some(first) = events.first() else {
        panic!("Event sequence is empty");
    };
    assert_eq!(
        first.event_type,
        StreamEventType::WorkflowStart,
        "First event should be workflow-start, got: {first:?}"
    );

    let terminals: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(
        terminals.len(),
        1,
        "Expected exactly one terminal event, got: {terminals:?}"
    );

    let last = &events[events.len() - 1];
    assert!(
        last.is_terminal(),
        "Last event should be terminal, got: {last:?}"
    );
    last
}

/// Ids of the steps that emitted step-start, in order.
#[allow(dead_code)]
pub fn started_steps(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.event_type == StreamEventType::StepStart)
        .map(|e| e.from.clone())
        .collect()
}

#[allow(dead_code)]
pub fn event_types(events: &[StreamEvent]) -> Vec<StreamEventType> {
    events.iter().map(|e| e.event_type).collect()
}

/// Assert step indices on step events never go backwards.
#[allow(dead_code)]
pub fn assert_step_order(events: &[StreamEvent]) {
    let indices: Vec<_> = events.iter().filter_map(|e| e.step_index).collect();
    assert!(
        indices.windows(2).all(|w| w[0] <= w[1]),
        "Step indices out of order: {indices:?}"
    );
}
