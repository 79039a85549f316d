//! Protocol drift checks between decision kinds and history event kinds.

use cadenza_core::{is_decision_event, DecisionType, EventType};
use std::collections::HashMap;

#[test]
fn test_decision_event_count_tracks_decision_kinds() {
    let decision_events: Vec<EventType> = EventType::ALL
        .iter()
        .copied()
        .filter(|e| is_decision_event(*e))
        .collect();

    assert_eq!(DecisionType::ALL.len(), 12);
    // CancelTimer is recorded as either TimerCanceled or CancelTimerFailed.
    assert_eq!(decision_events.len(), DecisionType::ALL.len() + 1);
}

#[test]
fn test_decision_events_are_not_outcomes() {
    // Results of decisions reported by the service are never decision events.
    for event in [
        EventType::ActivityTaskCompleted,
        EventType::ActivityTaskFailed,
        EventType::ActivityTaskTimedOut,
        EventType::ActivityTaskCanceled,
        EventType::RequestCancelActivityTaskFailed,
        EventType::TimerFired,
        EventType::WorkflowExecutionSignaled,
        EventType::DecisionTaskStarted,
        EventType::ChildWorkflowExecutionCompleted,
    ] {
        assert!(!is_decision_event(event), "{} is not a decision event", event);
    }
}

#[test]
fn test_wire_names_unique() {
    let mut seen = HashMap::new();
    for event in EventType::ALL {
        assert!(seen.insert(event.as_str(), event).is_none());
    }
    let mut seen = HashMap::new();
    for decision in DecisionType::ALL {
        assert!(seen.insert(decision.as_str(), decision).is_none());
    }
}
