//! Replay state of one workflow run.
//!
//! A [`WorkflowExecution`] owns the program future and its environment. The
//! decision task handler feeds it history events in order and asks it to
//! advance the program at decision boundaries.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::{json, Value};
use tracing::{debug, warn};

use cadenza_core::client::QueryTaskResult;
use cadenza_core::{Decision, EventAttributes, HistoryEvent, NondeterminismError, WorkflowQuery};

use super::context::{WorkflowContext, WorkflowEnvironment, WorkflowInfo, STACK_TRACE_QUERY};
use crate::converter::DataConverter;
use crate::error::{panic_message, WorkflowError, GENERIC_REASON, PANIC_REASON};
use crate::worker::registry::{RegisteredWorkflow, WorkflowFuture};

/// Why replay of a run could not continue
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExecutionFault {
    /// History does not match what the program does
    Nondeterminism(NondeterminismError),
    /// The program panicked without returning a typed error
    Panic { message: String },
}

impl From<NondeterminismError> for ExecutionFault {
    fn from(err: NondeterminismError) -> Self {
        ExecutionFault::Nondeterminism(err)
    }
}

pub(crate) struct WorkflowExecution {
    workflow: Arc<RegisteredWorkflow>,
    ctx: WorkflowContext,
    root: Option<WorkflowFuture>,
    completed: bool,
    last_event_id: i64,
}

impl WorkflowExecution {
    pub fn new(
        workflow: Arc<RegisteredWorkflow>,
        info: WorkflowInfo,
        converter: Arc<dyn DataConverter>,
    ) -> Self {
        Self {
            workflow,
            ctx: WorkflowContext::new(WorkflowEnvironment::new(info, converter)),
            root: None,
            completed: false,
            last_event_id: 0,
        }
    }

    /// Id of the last history event applied to this run
    pub fn last_event_id(&self) -> i64 {
        self.last_event_id
    }

    pub fn set_last_event_id(&mut self, event_id: i64) {
        self.last_event_id = event_id;
    }

    /// The program returned and its closing decision was produced
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn take_decisions(&mut self) -> Vec<Decision> {
        self.ctx.with_env(|env| env.decisions.take_decisions())
    }

    /// Apply one history event to the run's state
    pub fn handle_event(&mut self, event: &HistoryEvent, replaying: bool) -> Result<(), ExecutionFault> {
        self.ctx.with_env(|env| env.replaying = replaying);

        match &event.attributes {
            EventAttributes::WorkflowExecutionStarted(attrs) => {
                let input = self.ctx.with_env(|env| {
                    let info = &mut env.info;
                    if !attrs.workflow_type.name.is_empty() {
                        info.workflow_type = attrs.workflow_type.clone();
                    }
                    if !attrs.task_list.name.is_empty() {
                        info.task_list_name = attrs.task_list.name.clone();
                    }
                    info.execution_start_to_close_timeout_seconds =
                        attrs.execution_start_to_close_timeout_seconds;
                    info.task_start_to_close_timeout_seconds =
                        attrs.task_start_to_close_timeout_seconds;
                    info.attempt = attrs.attempt;
                    info.continued_execution_run_id = attrs.continued_execution_run_id.clone();
                    info.parent_workflow_domain = attrs.parent_workflow_domain.clone();
                    info.parent_workflow_execution = attrs.parent_workflow_execution.clone();
                    info.cron_schedule = attrs.cron_schedule.clone();
                    info.last_completion_result = attrs.last_completion_result.clone();
                    env.decode(attrs.input.as_deref())
                });
                self.start(input)?;
            }
            EventAttributes::DecisionTaskStarted { .. } => {
                let now = event.time();
                self.ctx.with_env(|env| env.now = now);
                self.run_program()?;
            }
            EventAttributes::ActivityTaskScheduled(attrs) => {
                self.ctx.with_env(|env| {
                    env.decisions.handle_activity_scheduled(&attrs.activity_id)?;
                    env.scheduled_activities
                        .insert(event.event_id, attrs.activity_id.clone());
                    Ok::<(), NondeterminismError>(())
                })?;
            }
            EventAttributes::ActivityTaskCompleted {
                scheduled_event_id,
                result,
                ..
            } => {
                self.resolve_activity(*scheduled_event_id, |_| Ok(result.clone()))?;
            }
            EventAttributes::ActivityTaskFailed {
                scheduled_event_id,
                reason,
                details,
                ..
            } => {
                self.resolve_activity(*scheduled_event_id, |activity_id| {
                    Err(WorkflowError::ActivityFailed {
                        activity_id: activity_id.to_string(),
                        reason: reason.clone(),
                        details: details.clone(),
                    })
                })?;
            }
            EventAttributes::ActivityTaskTimedOut {
                scheduled_event_id,
                timeout_type,
                details,
                ..
            } => {
                self.resolve_activity(*scheduled_event_id, |activity_id| {
                    Err(WorkflowError::ActivityTimedOut {
                        activity_id: activity_id.to_string(),
                        timeout_type: *timeout_type,
                        details: details.clone(),
                    })
                })?;
            }
            EventAttributes::ActivityTaskCanceled {
                scheduled_event_id,
                details,
                ..
            } => {
                self.resolve_activity(*scheduled_event_id, |_| {
                    Err(WorkflowError::Canceled {
                        details: details.clone(),
                    })
                })?;
            }
            EventAttributes::RequestCancelActivityTaskFailed { activity_id, cause } => {
                warn!(activity_id = %activity_id, cause = %cause, "Activity cancel request failed");
            }
            EventAttributes::TimerStarted { timer_id, .. } => {
                self.ctx
                    .with_env(|env| env.decisions.handle_timer_started(timer_id))?;
            }
            EventAttributes::TimerFired { timer_id, .. } => {
                self.ctx.with_env(|env| {
                    env.decisions.handle_timer_closed(timer_id);
                    if let Some(slot) = env.timers.get_mut(timer_id) {
                        slot.resolve(Ok(()));
                    }
                });
            }
            EventAttributes::TimerCanceled { timer_id, .. } => {
                self.ctx
                    .with_env(|env| env.decisions.handle_timer_closed(timer_id));
            }
            EventAttributes::WorkflowExecutionSignaled {
                signal_name, input, ..
            } => {
                self.ctx.with_env(|env| {
                    env.signals
                        .entry(signal_name.clone())
                        .or_default()
                        .push_back(input.clone());
                });
            }
            EventAttributes::WorkflowExecutionCancelRequested { .. } => {
                self.ctx.with_env(|env| env.cancel_requested = true);
            }
            _ => {}
        }
        Ok(())
    }

    fn start(&mut self, input: Result<Value, WorkflowError>) -> Result<(), ExecutionFault> {
        if self.root.is_some() || self.completed {
            return Ok(());
        }
        let root: WorkflowFuture = match input {
            Ok(input) => {
                let workflow = Arc::clone(&self.workflow);
                let ctx = self.ctx.clone();
                catch_unwind(AssertUnwindSafe(|| workflow.start(ctx, input))).map_err(|payload| {
                    ExecutionFault::Panic {
                        message: panic_message(payload.as_ref()),
                    }
                })?
            }
            Err(err) => Box::pin(async move { Err(err) }),
        };
        self.root = Some(root);
        Ok(())
    }

    fn resolve_activity(
        &mut self,
        scheduled_event_id: i64,
        result: impl FnOnce(&str) -> Result<Option<Vec<u8>>, WorkflowError>,
    ) -> Result<(), ExecutionFault> {
        self.ctx.with_env(|env| {
            let Some(activity_id) = env.scheduled_activities.get(&scheduled_event_id).cloned() else {
                return Err(NondeterminismError::UnknownDecision {
                    kind: "activity",
                    id: scheduled_event_id.to_string(),
                });
            };
            env.decisions.handle_activity_closed(&activity_id);
            let outcome = result(&activity_id);
            if let Some(slot) = env.activities.get_mut(&activity_id) {
                if !slot.resolve(outcome) {
                    debug!(activity_id = %activity_id, "Ignoring result of an activity already resolved");
                }
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Advance the program until it blocks or returns
    pub fn run_program(&mut self) -> Result<(), ExecutionFault> {
        if self.completed {
            return Ok(());
        }
        let Some(root) = self.root.as_mut() else {
            return Ok(());
        };

        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        loop {
            self.ctx.with_env(|env| env.progressed = false);
            let polled = catch_unwind(AssertUnwindSafe(|| root.as_mut().poll(&mut cx)));
            match polled {
                Ok(Poll::Ready(result)) => {
                    self.root = None;
                    self.complete(result);
                    return Ok(());
                }
                Ok(Poll::Pending) => {
                    if !self.ctx.with_env(|env| env.progressed) {
                        return Ok(());
                    }
                }
                Err(payload) => {
                    self.root = None;
                    return Err(ExecutionFault::Panic {
                        message: panic_message(payload.as_ref()),
                    });
                }
            }
        }
    }

    fn complete(&mut self, result: Result<Value, WorkflowError>) {
        self.completed = true;
        let decision = self.ctx.with_env(|env| closing_decision(env, result));
        self.ctx.with_env(|env| env.decisions.close_workflow(decision));
    }

    /// Answer a query against the current state
    pub fn query(&self, query: &WorkflowQuery) -> QueryTaskResult {
        let (handler, args, known) = self.ctx.with_env(|env| {
            if query.query_type == STACK_TRACE_QUERY {
                return (None, Ok(Value::Null), Vec::new());
            }
            let mut known: Vec<String> = env.query_handlers.keys().cloned().collect();
            known.push(STACK_TRACE_QUERY.to_string());
            known.sort();
            (
                env.query_handlers.get(&query.query_type).cloned(),
                env.decode(query.query_args.as_deref()),
                known,
            )
        });

        if query.query_type == STACK_TRACE_QUERY {
            let trace = self.stack_trace();
            return self.encode_answer(Ok(Value::String(trace)));
        }
        let Some(handler) = handler else {
            return QueryTaskResult::Failed(format!(
                "unknown queryType {}. KnownQueryTypes=[{}]",
                query.query_type,
                known.join(" ")
            ));
        };
        let args = match args {
            Ok(args) => args,
            Err(err) => return QueryTaskResult::Failed(err.to_string()),
        };
        match catch_unwind(AssertUnwindSafe(|| handler(args))) {
            Ok(answer) => self.encode_answer(answer),
            Err(payload) => QueryTaskResult::Failed(panic_message(payload.as_ref())),
        }
    }

    fn encode_answer(&self, answer: Result<Value, WorkflowError>) -> QueryTaskResult {
        let encoded = answer.and_then(|value| self.ctx.with_env(|env| env.encode(&value)));
        match encoded {
            Ok(bytes) => QueryTaskResult::Answered(bytes),
            Err(err) => QueryTaskResult::Failed(err.to_string()),
        }
    }

    pub fn stack_trace(&self) -> String {
        self.ctx.with_env(|env| env.describe_blocked())
    }
}

/// Decision that closes a run whose program returned `result`
fn closing_decision(env: &WorkflowEnvironment, result: Result<Value, WorkflowError>) -> Decision {
    match result {
        Ok(value) => match env.encode(&value) {
            Ok(bytes) => Decision::CompleteWorkflowExecution {
                result: Some(bytes),
            },
            Err(err) => generic_failure(env, &err),
        },
        Err(WorkflowError::Panic {
            message,
            stack_trace,
        }) => Decision::FailWorkflowExecution {
            reason: PANIC_REASON.to_string(),
            details: env.encode(&json!([message, stack_trace])).ok(),
        },
        Err(WorkflowError::Application { reason, details }) => {
            Decision::FailWorkflowExecution { reason, details }
        }
        Err(WorkflowError::Canceled { details }) => Decision::CancelWorkflowExecution { details },
        Err(WorkflowError::ContinueAsNew(attrs)) => Decision::ContinueAsNewWorkflowExecution(*attrs),
        Err(err) => generic_failure(env, &err),
    }
}

fn generic_failure(env: &WorkflowEnvironment, err: &WorkflowError) -> Decision {
    Decision::FailWorkflowExecution {
        reason: GENERIC_REASON.to_string(),
        details: env.encode(&Value::String(err.to_string())).ok(),
    }
}
