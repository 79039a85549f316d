//! Correspondence rules between decisions and the history events that record them
//!
//! A decision sent in one decision task shows up in history as exactly one
//! event kind. Cancel-timer is the single exception: the service records it
//! either as `TimerCanceled` or as `CancelTimerFailed`. Replay uses these rules
//! to check that a re-run of the workflow program produces the decisions the
//! history says it produced before.

use crate::decision::Decision;
use crate::error::NondeterminismError;
use crate::history::{EventAttributes, EventType, HistoryEvent};

/// How closely a decision has to agree with its recorded event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Identities and unqualified type names only
    #[default]
    Lenient,
    /// Also task lists and payloads
    Strict,
}

/// Check if an event kind is the record of a decision
pub fn is_decision_event(event_type: EventType) -> bool {
    matches!(
        event_type,
        EventType::WorkflowExecutionCompleted
            | EventType::WorkflowExecutionFailed
            | EventType::WorkflowExecutionCanceled
            | EventType::WorkflowExecutionContinuedAsNew
            | EventType::ActivityTaskScheduled
            | EventType::ActivityTaskCancelRequested
            | EventType::TimerStarted
            | EventType::TimerCanceled
            | EventType::CancelTimerFailed
            | EventType::MarkerRecorded
            | EventType::StartChildWorkflowExecutionInitiated
            | EventType::RequestCancelExternalWorkflowExecutionInitiated
            | EventType::SignalExternalWorkflowExecutionInitiated
    )
}

/// Unqualified part of a type name: everything after the final `.`
pub fn last_part_of_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Check if `event` is the history record of `decision`
pub fn decision_matches_event(decision: &Decision, event: &HistoryEvent, mode: MatchMode) -> bool {
    let strict = mode == MatchMode::Strict;
    match (decision, &event.attributes) {
        (Decision::ScheduleActivityTask(d), EventAttributes::ActivityTaskScheduled(e)) => {
            d.activity_id == e.activity_id
                && last_part_of_name(&d.activity_type.name)
                    == last_part_of_name(&e.activity_type.name)
                && (!strict || (d.task_list.name == e.task_list.name && d.input == e.input))
        }
        (
            Decision::RequestCancelActivityTask { activity_id },
            EventAttributes::ActivityTaskCancelRequested {
                activity_id: recorded,
                ..
            },
        ) => activity_id == recorded,
        (
            Decision::StartTimer { timer_id, .. },
            EventAttributes::TimerStarted {
                timer_id: recorded,
                ..
            },
        ) => timer_id == recorded,
        (
            Decision::CancelTimer { timer_id },
            EventAttributes::TimerCanceled {
                timer_id: recorded,
                ..
            }
            | EventAttributes::CancelTimerFailed {
                timer_id: recorded,
                ..
            },
        ) => timer_id == recorded,
        (
            Decision::CompleteWorkflowExecution { result },
            EventAttributes::WorkflowExecutionCompleted {
                result: recorded, ..
            },
        ) => !strict || result == recorded,
        (
            Decision::FailWorkflowExecution { reason, details },
            EventAttributes::WorkflowExecutionFailed {
                reason: recorded_reason,
                details: recorded_details,
                ..
            },
        ) => !strict || (reason == recorded_reason && details == recorded_details),
        (
            Decision::CancelWorkflowExecution { details },
            EventAttributes::WorkflowExecutionCanceled {
                details: recorded,
            },
        ) => !strict || details == recorded,
        (
            Decision::RequestCancelExternalWorkflowExecution(d),
            EventAttributes::RequestCancelExternalWorkflowExecutionInitiated {
                domain,
                workflow_execution,
                child_workflow_only,
            },
        ) => {
            d.domain == *domain
                && d.workflow_id == workflow_execution.workflow_id
                && d.run_id.as_deref().unwrap_or("") == workflow_execution.run_id
                && d.child_workflow_only == *child_workflow_only
        }
        (
            Decision::RecordMarker {
                marker_name,
                details,
            },
            EventAttributes::MarkerRecorded {
                marker_name: recorded_name,
                details: recorded_details,
            },
        ) => marker_name == recorded_name && (!strict || details == recorded_details),
        (
            Decision::ContinueAsNewWorkflowExecution(d),
            EventAttributes::WorkflowExecutionContinuedAsNew(e),
        ) => {
            last_part_of_name(&d.workflow_type.name) == last_part_of_name(&e.workflow_type.name)
                && (!strict || (d.task_list.name == e.task_list.name && d.input == e.input))
        }
        (
            Decision::StartChildWorkflowExecution(d),
            EventAttributes::StartChildWorkflowExecutionInitiated(e),
        ) => {
            d.domain == e.domain
                && d.workflow_id == e.workflow_id
                && last_part_of_name(&d.workflow_type.name)
                    == last_part_of_name(&e.workflow_type.name)
                && (!strict || (d.task_list.name == e.task_list.name && d.input == e.input))
        }
        (
            Decision::SignalExternalWorkflowExecution(d),
            EventAttributes::SignalExternalWorkflowExecutionInitiated(e),
        ) => {
            d.domain == e.domain
                && d.execution.workflow_id == e.workflow_execution.workflow_id
                && d.execution.run_id == e.workflow_execution.run_id
                && d.signal_name == e.signal_name
                && d.child_workflow_only == e.child_workflow_only
                && (!strict || d.input == e.input)
        }
        _ => false,
    }
}

/// Compare decisions produced by replay with the decision events recorded in
/// history, pairwise and in order.
pub fn match_replay_with_history(
    replay_decisions: &[Decision],
    history_events: &[HistoryEvent],
    mode: MatchMode,
) -> Result<(), NondeterminismError> {
    let mut decisions = replay_decisions.iter();
    let mut events = history_events
        .iter()
        .filter(|e| is_decision_event(e.event_type()));

    loop {
        match (decisions.next(), events.next()) {
            (None, None) => return Ok(()),
            (Some(decision), None) => {
                return Err(NondeterminismError::ExtraReplayDecision {
                    decision: Box::new(decision.clone()),
                })
            }
            (None, Some(event)) => {
                return Err(NondeterminismError::MissingReplayDecision {
                    event: Box::new(event.clone()),
                })
            }
            (Some(decision), Some(event)) => {
                if !decision_matches_event(decision, event, mode) {
                    return Err(NondeterminismError::Mismatch {
                        event: Box::new(event.clone()),
                        decision: Box::new(decision.clone()),
                    });
                }
            }
        }
    }
}

/// Validates replayed decisions against recorded history
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterminismValidator {
    mode: MatchMode,
}

impl DeterminismValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: MatchMode) -> Self {
        Self { mode }
    }

    pub fn strict() -> Self {
        Self::with_mode(MatchMode::Strict)
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn validate(
        &self,
        replay_decisions: &[Decision],
        history_events: &[HistoryEvent],
    ) -> Result<(), NondeterminismError> {
        match_replay_with_history(replay_decisions, history_events, self.mode)
    }
}
