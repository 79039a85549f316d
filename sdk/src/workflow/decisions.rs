//! Decision state machines of one workflow run.
//!
//! Every activity or timer the program starts gets a state machine keyed by
//! its id. Decisions are emitted in creation order; canceling an activity
//! before its schedule decision was sent removes the decision instead of
//! emitting a cancel request.

use std::collections::HashMap;

use cadenza_core::decision::ScheduleActivityTaskAttributes;
use cadenza_core::{Decision, NondeterminismError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DecisionId {
    Activity(String),
    Timer(String),
}

impl DecisionId {
    fn kind(&self) -> &'static str {
        match self {
            Self::Activity(_) => "activity",
            Self::Timer(_) => "timer",
        }
    }

    fn id(&self) -> &str {
        match self {
            Self::Activity(id) | Self::Timer(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecisionState {
    /// Decision produced but not yet handed to the service
    Created,
    /// Decision handed to the service
    Sent,
    /// History recorded the decision
    Initiated,
    /// Cancel requested after the decision was sent
    CancelRequested,
    /// Canceled while still `Created`; nothing was sent
    CanceledBeforeSent,
    Completed,
}

/// Result of asking to cancel an activity or timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CancelOutcome {
    /// The decision never left the worker and was dropped
    CanceledBeforeSent,
    /// A cancel decision was queued
    CancelRequested,
    /// Already closed or canceled; nothing to do
    Ignored,
}

#[derive(Debug, Default)]
pub(crate) struct DecisionsHelper {
    states: HashMap<DecisionId, DecisionState>,
    pending: Vec<(DecisionId, Decision)>,
    terminal: Option<Decision>,
}

impl DecisionsHelper {
    pub fn schedule_activity(&mut self, attrs: ScheduleActivityTaskAttributes) {
        let id = DecisionId::Activity(attrs.activity_id.clone());
        self.states.insert(id.clone(), DecisionState::Created);
        self.pending.push((id, Decision::ScheduleActivityTask(attrs)));
    }

    pub fn request_cancel_activity(&mut self, activity_id: &str) -> CancelOutcome {
        let id = DecisionId::Activity(activity_id.to_string());
        let decision = Decision::RequestCancelActivityTask {
            activity_id: activity_id.to_string(),
        };
        self.cancel(id, decision)
    }

    pub fn start_timer(&mut self, timer_id: &str, start_to_fire_timeout_seconds: i64) {
        let id = DecisionId::Timer(timer_id.to_string());
        self.states.insert(id.clone(), DecisionState::Created);
        self.pending.push((
            id,
            Decision::StartTimer {
                timer_id: timer_id.to_string(),
                start_to_fire_timeout_seconds,
            },
        ));
    }

    pub fn cancel_timer(&mut self, timer_id: &str) -> CancelOutcome {
        let id = DecisionId::Timer(timer_id.to_string());
        let decision = Decision::CancelTimer {
            timer_id: timer_id.to_string(),
        };
        self.cancel(id, decision)
    }

    fn cancel(&mut self, id: DecisionId, cancel_decision: Decision) -> CancelOutcome {
        match self.states.get(&id).copied() {
            Some(DecisionState::Created) => {
                self.pending.retain(|(pending_id, _)| pending_id != &id);
                self.states.insert(id, DecisionState::CanceledBeforeSent);
                CancelOutcome::CanceledBeforeSent
            }
            Some(DecisionState::Sent) | Some(DecisionState::Initiated) => {
                self.states.insert(id.clone(), DecisionState::CancelRequested);
                self.pending.push((id, cancel_decision));
                CancelOutcome::CancelRequested
            }
            _ => CancelOutcome::Ignored,
        }
    }

    /// Record the decision that closes the run; it is emitted after all others
    pub fn close_workflow(&mut self, decision: Decision) {
        if self.terminal.is_none() {
            self.terminal = Some(decision);
        }
    }

    /// Hand every pending decision to the caller, in creation order
    pub fn take_decisions(&mut self) -> Vec<Decision> {
        let mut decisions = Vec::with_capacity(self.pending.len() + 1);
        for (id, decision) in self.pending.drain(..) {
            if let Some(state) = self.states.get_mut(&id) {
                if *state == DecisionState::Created {
                    *state = DecisionState::Sent;
                }
            }
            decisions.push(decision);
        }
        decisions.extend(self.terminal.take());
        decisions
    }

    pub fn handle_activity_scheduled(&mut self, activity_id: &str) -> Result<(), NondeterminismError> {
        self.handle_initiated(DecisionId::Activity(activity_id.to_string()))
    }

    pub fn handle_activity_closed(&mut self, activity_id: &str) {
        self.states.insert(
            DecisionId::Activity(activity_id.to_string()),
            DecisionState::Completed,
        );
    }

    pub fn handle_timer_started(&mut self, timer_id: &str) -> Result<(), NondeterminismError> {
        self.handle_initiated(DecisionId::Timer(timer_id.to_string()))
    }

    pub fn handle_timer_closed(&mut self, timer_id: &str) {
        self.states
            .insert(DecisionId::Timer(timer_id.to_string()), DecisionState::Completed);
    }

    fn handle_initiated(&mut self, id: DecisionId) -> Result<(), NondeterminismError> {
        match self.states.get_mut(&id) {
            Some(state) => {
                if matches!(*state, DecisionState::Created | DecisionState::Sent) {
                    *state = DecisionState::Initiated;
                }
                Ok(())
            }
            None => Err(NondeterminismError::UnknownDecision {
                kind: id.kind(),
                id: id.id().to_string(),
            }),
        }
    }

    #[cfg(test)]
    pub fn state(&self, id: &DecisionId) -> Option<DecisionState> {
        self.states.get(id).copied()
    }

    #[cfg(test)]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.terminal.is_some()
    }
}
