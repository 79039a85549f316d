//! WorkflowContext - the handle a workflow program uses to talk to its run

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cadenza_core::decision::{ContinueAsNewAttributes, ScheduleActivityTaskAttributes};
use cadenza_core::{ActivityType, TaskList, WorkflowExecution, WorkflowType};

use super::decisions::{CancelOutcome, DecisionsHelper};
use super::future::{ActivityFuture, SignalChannel, TimerFuture};
use crate::converter::DataConverter;
use crate::error::WorkflowError;

/// Name of the built-in query describing what a run is blocked on
pub const STACK_TRACE_QUERY: &str = "__stack_trace";

/// Facts about the running workflow, as recorded when it started
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInfo {
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub task_list_name: String,
    pub domain: String,
    pub execution_start_to_close_timeout_seconds: i32,
    pub task_start_to_close_timeout_seconds: i32,
    pub attempt: i32,
    pub continued_execution_run_id: Option<String>,
    pub parent_workflow_domain: Option<String>,
    pub parent_workflow_execution: Option<WorkflowExecution>,
    pub cron_schedule: Option<String>,
    /// Result of the previous run of a cron workflow
    pub last_completion_result: Option<Vec<u8>>,
}

/// Options for scheduling an activity
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    /// Explicit activity id; sequential ids are generated otherwise
    pub activity_id: Option<String>,
    /// Task list override; defaults to the workflow's task list
    pub task_list: Option<String>,
    pub schedule_to_close_timeout: Duration,
    pub schedule_to_start_timeout: Duration,
    pub start_to_close_timeout: Duration,
    /// Zero disables heartbeat timeouts
    pub heartbeat_timeout: Duration,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            activity_id: None,
            task_list: None,
            schedule_to_close_timeout: Duration::from_secs(60),
            schedule_to_start_timeout: Duration::from_secs(10),
            start_to_close_timeout: Duration::from_secs(50),
            heartbeat_timeout: Duration::ZERO,
        }
    }
}

impl ActivityOptions {
    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }

    pub fn with_activity_id(mut self, activity_id: impl Into<String>) -> Self {
        self.activity_id = Some(activity_id.into());
        self
    }

    pub fn with_schedule_to_start_timeout(mut self, timeout: Duration) -> Self {
        self.schedule_to_start_timeout = timeout;
        self
    }

    pub fn with_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout = timeout;
        self
    }

    pub fn with_schedule_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.schedule_to_close_timeout = timeout;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }
}

pub(crate) type QueryHandler =
    Arc<dyn Fn(Value) -> Result<Value, WorkflowError> + Send + Sync>;

/// Result slot of one activity or timer
#[derive(Debug)]
pub(crate) struct Slot<T> {
    pub label: String,
    pub result: Option<Result<T, WorkflowError>>,
    /// A result was stored at some point; later ones are ignored
    pub resolved: bool,
}

impl<T> Slot<T> {
    fn pending(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            result: None,
            resolved: false,
        }
    }

    pub fn resolve(&mut self, result: Result<T, WorkflowError>) -> bool {
        if self.resolved {
            return false;
        }
        self.result = Some(result);
        self.resolved = true;
        true
    }
}

/// Mutable state of one run, shared by the context, its futures and the
/// replay machinery.
pub(crate) struct WorkflowEnvironment {
    pub info: WorkflowInfo,
    pub decisions: DecisionsHelper,
    pub activities: HashMap<String, Slot<Option<Vec<u8>>>>,
    pub scheduled_activities: HashMap<i64, String>,
    pub timers: HashMap<String, Slot<()>>,
    pub signals: HashMap<String, VecDeque<Option<Vec<u8>>>>,
    pub awaited_signals: BTreeSet<String>,
    pub query_handlers: HashMap<String, QueryHandler>,
    pub next_sequence: u64,
    pub now: DateTime<Utc>,
    pub replaying: bool,
    pub cancel_requested: bool,
    pub converter: Arc<dyn DataConverter>,
    /// Set by every mutation; the scheduler re-polls while it is set
    pub progressed: bool,
}

impl WorkflowEnvironment {
    pub fn new(info: WorkflowInfo, converter: Arc<dyn DataConverter>) -> Self {
        Self {
            info,
            decisions: DecisionsHelper::default(),
            activities: HashMap::new(),
            scheduled_activities: HashMap::new(),
            timers: HashMap::new(),
            signals: HashMap::new(),
            awaited_signals: BTreeSet::new(),
            query_handlers: HashMap::new(),
            next_sequence: 0,
            now: DateTime::<Utc>::default(),
            replaying: false,
            cancel_requested: false,
            converter,
            progressed: false,
        }
    }

    fn next_id(&mut self) -> String {
        let id = self.next_sequence.to_string();
        self.next_sequence += 1;
        id
    }

    pub fn decode(&self, data: Option<&[u8]>) -> Result<Value, WorkflowError> {
        self.converter
            .from_optional(data)
            .map_err(|e| WorkflowError::Serialization(e.to_string()))
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, WorkflowError> {
        self.converter
            .to_data(value)
            .map_err(|e| WorkflowError::Serialization(e.to_string()))
    }

    /// Encode a payload; `null` is sent as no payload at all
    fn encode_optional(&self, value: &Value) -> Result<Option<Vec<u8>>, WorkflowError> {
        if value.is_null() {
            return Ok(None);
        }
        self.encode(value).map(Some)
    }

    pub fn take_activity_result(&mut self, activity_id: &str) -> Option<Result<Value, WorkflowError>> {
        let result = self.activities.get_mut(activity_id)?.result.take()?;
        self.progressed = true;
        Some(result.and_then(|bytes| self.decode(bytes.as_deref())))
    }

    pub fn take_timer_result(&mut self, timer_id: &str) -> Option<Result<(), WorkflowError>> {
        let result = self.timers.get_mut(timer_id)?.result.take()?;
        self.progressed = true;
        Some(result)
    }

    pub fn take_signal(&mut self, name: &str) -> Option<Result<Value, WorkflowError>> {
        let input = self.signals.get_mut(name)?.pop_front()?;
        self.awaited_signals.remove(name);
        self.progressed = true;
        Some(self.decode(input.as_deref()))
    }

    pub fn cancel_activity(&mut self, activity_id: &str) {
        let outcome = self.decisions.request_cancel_activity(activity_id);
        if outcome == CancelOutcome::Ignored {
            return;
        }
        if let Some(slot) = self.activities.get_mut(activity_id) {
            slot.resolve(Err(WorkflowError::Canceled { details: None }));
        }
        self.progressed = true;
    }

    pub fn cancel_timer(&mut self, timer_id: &str) {
        let outcome = self.decisions.cancel_timer(timer_id);
        if outcome == CancelOutcome::Ignored {
            return;
        }
        if let Some(slot) = self.timers.get_mut(timer_id) {
            slot.resolve(Err(WorkflowError::Canceled { details: None }));
        }
        self.progressed = true;
    }

    /// Human-readable list of what the program is waiting for
    pub fn describe_blocked(&self) -> String {
        let mut waits: Vec<String> = Vec::new();

        let mut activities: Vec<_> = self
            .activities
            .iter()
            .filter(|(_, slot)| !slot.resolved)
            .collect();
        activities.sort_by(|a, b| a.0.cmp(b.0));
        for (id, slot) in activities {
            waits.push(format!("activity {} ({})", id, slot.label));
        }

        let mut timers: Vec<_> = self
            .timers
            .iter()
            .filter(|(_, slot)| !slot.resolved)
            .collect();
        timers.sort_by(|a, b| a.0.cmp(b.0));
        for (id, slot) in timers {
            waits.push(format!("timer {} ({})", id, slot.label));
        }

        for name in &self.awaited_signals {
            waits.push(format!("signal channel {}", name));
        }

        let header = format!(
            "workflow {} (WorkflowId: {}, RunId: {})",
            self.info.workflow_type.name,
            self.info.workflow_execution.workflow_id,
            self.info.workflow_execution.run_id
        );
        if waits.is_empty() {
            format!("{} is not blocked", header)
        } else {
            format!("{} blocked on:\n  {}", header, waits.join("\n  "))
        }
    }
}

/// Handle a workflow program uses to schedule work and read run state.
///
/// All operations are deterministic: time is the time of the decision task
/// being replayed, and ids are generated sequentially.
#[derive(Clone)]
pub struct WorkflowContext {
    env: Arc<Mutex<WorkflowEnvironment>>,
}

impl std::fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env = self.env.lock();
        f.debug_struct("WorkflowContext")
            .field("workflow_execution", &env.info.workflow_execution)
            .field("workflow_type", &env.info.workflow_type.name)
            .finish()
    }
}

impl WorkflowContext {
    pub(crate) fn new(env: WorkflowEnvironment) -> Self {
        Self {
            env: Arc::new(Mutex::new(env)),
        }
    }

    pub(crate) fn with_env<R>(&self, f: impl FnOnce(&mut WorkflowEnvironment) -> R) -> R {
        let mut env = self.env.lock();
        f(&mut env)
    }

    pub fn workflow_info(&self) -> WorkflowInfo {
        self.env.lock().info.clone()
    }

    /// Time of the decision task currently being processed
    pub fn now(&self) -> DateTime<Utc> {
        self.env.lock().now
    }

    /// Whether the code is re-executing already recorded history
    pub fn is_replaying(&self) -> bool {
        self.env.lock().replaying
    }

    /// Whether someone asked for this run to be canceled
    pub fn is_cancel_requested(&self) -> bool {
        self.env.lock().cancel_requested
    }

    /// Schedule an activity; the future resolves with its decoded result
    pub fn execute_activity(
        &self,
        activity_type: &str,
        input: Value,
        options: ActivityOptions,
    ) -> ActivityFuture {
        let mut env = self.env.lock();
        let activity_id = match options.activity_id {
            Some(id) => id,
            None => env.next_id(),
        };
        let mut slot = Slot::pending(activity_type);
        env.progressed = true;

        match env.encode_optional(&input) {
            Ok(input) => {
                let task_list = options
                    .task_list
                    .unwrap_or_else(|| env.info.task_list_name.clone());
                env.decisions.schedule_activity(ScheduleActivityTaskAttributes {
                    activity_id: activity_id.clone(),
                    activity_type: ActivityType::new(activity_type),
                    domain: None,
                    task_list: TaskList::new(task_list),
                    input,
                    schedule_to_close_timeout_seconds: seconds(options.schedule_to_close_timeout),
                    schedule_to_start_timeout_seconds: seconds(options.schedule_to_start_timeout),
                    start_to_close_timeout_seconds: seconds(options.start_to_close_timeout),
                    heartbeat_timeout_seconds: seconds(options.heartbeat_timeout),
                });
            }
            Err(err) => {
                slot.resolve(Err(err));
            }
        }
        env.activities.insert(activity_id.clone(), slot);
        drop(env);

        ActivityFuture::new(self.clone(), activity_id)
    }

    /// Cancel a scheduled activity; its future resolves with `Canceled`
    pub fn request_cancel_activity(&self, activity_id: &str) {
        self.env.lock().cancel_activity(activity_id);
    }

    /// Durable timer; a zero duration resolves immediately
    pub fn new_timer(&self, duration: Duration) -> TimerFuture {
        let mut env = self.env.lock();
        let timer_id = env.next_id();
        let mut slot = Slot::pending(format!("{:?}", duration));
        env.progressed = true;

        if duration.is_zero() {
            slot.resolve(Ok(()));
        } else {
            let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
            let secs = i64::try_from(secs).unwrap_or(i64::MAX);
            env.decisions.start_timer(&timer_id, secs);
        }
        env.timers.insert(timer_id.clone(), slot);
        drop(env);

        TimerFuture::new(self.clone(), timer_id)
    }

    pub fn cancel_timer(&self, timer_id: &str) {
        self.env.lock().cancel_timer(timer_id);
    }

    /// Receiving end of the named signal
    pub fn signal_channel(&self, name: &str) -> SignalChannel {
        SignalChannel::new(self.clone(), name)
    }

    /// Answer queries of `query_type` with `handler`; replaces any earlier handler
    pub fn set_query_handler<F>(&self, query_type: &str, handler: F) -> Result<(), WorkflowError>
    where
        F: Fn(Value) -> Result<Value, WorkflowError> + Send + Sync + 'static,
    {
        if query_type == STACK_TRACE_QUERY {
            return Err(WorkflowError::application(format!(
                "queryType {} is reserved",
                STACK_TRACE_QUERY
            )));
        }
        self.env
            .lock()
            .query_handlers
            .insert(query_type.to_string(), Arc::new(handler));
        Ok(())
    }

    /// Error that closes this run and starts a fresh one with `input`.
    ///
    /// ```ignore
    /// return Err(ctx.continue_as_new(json!({ "cursor": next })));
    /// ```
    pub fn continue_as_new(&self, input: Value) -> WorkflowError {
        let env = self.env.lock();
        let input = match env.encode_optional(&input) {
            Ok(input) => input,
            Err(err) => return err,
        };
        WorkflowError::ContinueAsNew(Box::new(ContinueAsNewAttributes {
            workflow_type: env.info.workflow_type.clone(),
            task_list: TaskList::new(env.info.task_list_name.clone()),
            input,
            execution_start_to_close_timeout_seconds: env.info.execution_start_to_close_timeout_seconds,
            task_start_to_close_timeout_seconds: env.info.task_start_to_close_timeout_seconds,
        }))
    }
}

fn seconds(duration: Duration) -> i32 {
    i32::try_from(duration.as_secs()).unwrap_or(i32::MAX)
}
