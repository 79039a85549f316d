//! Decision task processing: replay, sticky execution and queries

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use cadenza_core::client::{
    QueryTaskResult, RespondDecisionTaskCompletedRequest, RespondDecisionTaskFailedRequest,
    RespondQueryTaskCompletedRequest, StickyExecutionAttributes,
};
use cadenza_core::{
    is_decision_event, Decision, DecisionTaskFailedCause, DeterminismValidator, EventType,
    HistoryEvent, HistoryIterator, NondeterminismError, TaskList, WorkflowQuery, WorkflowService,
    WorkflowTask,
};

use super::cache::{CachedSlot, CachedWorkflow, WorkflowCache};
use super::history::TaskHistory;
use super::registry::{RegisteredWorkflow, WorkflowRegistry};
use crate::config::{NonDeterministicWorkflowPolicy, WorkerOptions};
use crate::error::{CadenzaError, Result};
use crate::workflow::context::WorkflowInfo;
use crate::workflow::execution::{ExecutionFault, WorkflowExecution};

/// What the worker sends back for one decision task
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowTaskResponse {
    Completed(RespondDecisionTaskCompletedRequest),
    Failed(RespondDecisionTaskFailedRequest),
    QueryCompleted(RespondQueryTaskCompletedRequest),
}

impl WorkflowTaskResponse {
    /// Deliver the response to the service
    pub async fn send(self, service: &dyn WorkflowService) -> Result<()> {
        match self {
            Self::Completed(request) => service.respond_decision_task_completed(request).await?,
            Self::Failed(request) => service.respond_decision_task_failed(request).await?,
            Self::QueryCompleted(request) => service.respond_query_task_completed(request).await?,
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Replayed {
    /// Decisions produced while re-executing recorded history
    replay_decisions: Vec<Decision>,
    /// Decision events recorded in history, in order
    recorded: Vec<HistoryEvent>,
}

enum TaskFailure {
    Fault(ExecutionFault),
    Error(CadenzaError),
}

impl From<ExecutionFault> for TaskFailure {
    fn from(fault: ExecutionFault) -> Self {
        TaskFailure::Fault(fault)
    }
}

impl From<CadenzaError> for TaskFailure {
    fn from(err: CadenzaError) -> Self {
        TaskFailure::Error(err)
    }
}

/// Processes decision tasks against cached or rebuilt workflow state.
///
/// Tasks for the same run are serialized on the run's cache entry; tasks for
/// different runs may be processed concurrently.
pub struct WorkflowTaskHandler {
    options: WorkerOptions,
    registry: Arc<WorkflowRegistry>,
    cache: Arc<WorkflowCache>,
    validator: DeterminismValidator,
    sticky_task_list: String,
}

impl std::fmt::Debug for WorkflowTaskHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowTaskHandler")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("sticky_task_list", &self.sticky_task_list)
            .finish()
    }
}

impl WorkflowTaskHandler {
    pub fn new(
        options: WorkerOptions,
        registry: Arc<WorkflowRegistry>,
        cache: Arc<WorkflowCache>,
    ) -> Self {
        let sticky_task_list = options.sticky_task_list_name();
        let validator = DeterminismValidator::with_mode(options.workflow.match_mode);
        Self {
            options,
            registry,
            cache,
            validator,
            sticky_task_list,
        }
    }

    /// Handler with a cache of its own, sized by `max_cached_workflows`
    pub fn from_options(options: WorkerOptions, registry: Arc<WorkflowRegistry>) -> Self {
        let cache = Arc::new(WorkflowCache::new(options.workflow.max_cached_workflows));
        Self::new(options, registry, cache)
    }

    pub fn cache(&self) -> &Arc<WorkflowCache> {
        &self.cache
    }

    pub fn sticky_task_list(&self) -> &str {
        &self.sticky_task_list
    }

    /// Process one decision task.
    ///
    /// `history_iterator` fetches further history pages when the task carries
    /// a next page token.
    #[instrument(
        skip_all,
        fields(
            workflow_id = %task.workflow_execution.workflow_id,
            run_id = %task.workflow_execution.run_id,
            workflow_type = %task.workflow_type.name,
            query = task.is_query()
        )
    )]
    pub async fn process_workflow_task(
        &self,
        task: WorkflowTask,
        history_iterator: Option<Box<dyn HistoryIterator>>,
    ) -> Result<WorkflowTaskResponse> {
        if task.run_id().is_empty() {
            return Err(CadenzaError::InvalidTask("missing workflow run id".to_string()));
        }
        if task.history.is_empty() && !task.is_query() {
            return Err(CadenzaError::InvalidTask("nil or empty history".to_string()));
        }

        let Some(workflow) = self.registry.get(&task.workflow_type.name) else {
            warn!("Workflow type is not registered");
            return Ok(self.failed(
                &task,
                DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure,
                format!(
                    "unable to find workflow type: {}. Supported types: [{}]",
                    task.workflow_type.name,
                    self.registry.registered_names().join(", ")
                ),
            ));
        };

        let full_history = task.has_full_history();
        if let Some(query) = &task.query {
            if full_history {
                return self
                    .query_from_history(&task, query, &workflow, history_iterator)
                    .await;
            }
        }

        let run_id = task.run_id().to_string();
        let (entry, mut slot) = self.checkout(&run_id).await;

        if let Some(execution) = &*slot {
            let first_event_id = task.history.first().map(|e| e.event_id);
            let resumable =
                task.is_query() || first_event_id == Some(execution.last_event_id() + 1);
            if !resumable {
                debug!(
                    cached_last_event_id = execution.last_event_id(),
                    first_event_id = ?first_event_id,
                    "Cached state does not line up with task history; rebuilding"
                );
                *slot = None;
            }
        }

        if slot.is_none() && !full_history {
            self.discard(&run_id, &entry, slot);
            info!("Partial history without cached state; asking service to reset sticky execution");
            return Ok(self.failed(
                &task,
                DecisionTaskFailedCause::ResetStickyTaskList,
                "workflow state is not cached on this worker".to_string(),
            ));
        }

        let execution = slot.get_or_insert_with(|| self.new_execution(&task, &workflow));
        let check_determinism = !task.is_query() && full_history;
        let replayed = match replay(execution, &task, history_iterator, check_determinism).await {
            Ok(replayed) => replayed,
            Err(TaskFailure::Error(err)) => {
                self.discard(&run_id, &entry, slot);
                error!(error = %err, "Failed to replay workflow history");
                return Err(err);
            }
            Err(TaskFailure::Fault(ExecutionFault::Panic { message })) => {
                self.discard(&run_id, &entry, slot);
                error!(panic = %message, "Workflow program panicked");
                return Ok(match &task.query {
                    Some(_) => self.query_response(&task, QueryTaskResult::Failed(message)),
                    None => self.failed(
                        &task,
                        DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure,
                        message,
                    ),
                });
            }
            Err(TaskFailure::Fault(ExecutionFault::Nondeterminism(err))) => {
                let pending = execution.take_decisions();
                self.discard(&run_id, &entry, slot);
                if task.is_query() {
                    return Ok(self.query_response(&task, QueryTaskResult::Failed(err.to_string())));
                }
                return self.nondeterministic(&task, err, pending);
            }
        };

        if let Some(query) = &task.query {
            let result = execution.query(query);
            drop(slot);
            debug!("Answered query from cached state");
            return Ok(self.query_response(&task, result));
        }

        let decisions = execution.take_decisions();
        if check_determinism {
            if let Err(err) = self
                .validator
                .validate(&replayed.replay_decisions, &replayed.recorded)
            {
                self.discard(&run_id, &entry, slot);
                return self.nondeterministic(&task, err, decisions);
            }
        }

        let completed = execution.is_completed();
        let sticky_attributes = if completed {
            self.discard(&run_id, &entry, slot);
            None
        } else {
            self.cache.put(&run_id, Arc::clone(&entry));
            drop(slot);
            self.sticky_attributes()
        };

        debug!(decisions = decisions.len(), completed, "Decision task processed");
        Ok(WorkflowTaskResponse::Completed(RespondDecisionTaskCompletedRequest {
            task_token: task.task_token,
            decisions,
            identity: self.options.identity.clone(),
            sticky_attributes,
        }))
    }

    /// Lock the run's cache entry, starting over if the entry left the cache
    /// while this task waited for it.
    async fn checkout(&self, run_id: &str) -> (Arc<CachedWorkflow>, CachedSlot) {
        loop {
            let (entry, found) = self.cache.get_or_insert(run_id);
            let slot = entry.lock().await;
            if self.cache.is_current(run_id, &entry) {
                debug!(cache_hit = found, "Acquired workflow cache entry");
                return (entry, slot);
            }
            debug!("Workflow cache entry was replaced while waiting; retrying");
        }
    }

    /// Forget the run and drop it from the cache before releasing its lock
    fn discard(&self, run_id: &str, entry: &Arc<CachedWorkflow>, mut slot: CachedSlot) {
        *slot = None;
        self.cache.remove_held(run_id, entry);
    }

    /// Answer a query carrying the full history on a throwaway run, leaving
    /// any cached state of the run untouched.
    async fn query_from_history(
        &self,
        task: &WorkflowTask,
        query: &WorkflowQuery,
        workflow: &Arc<RegisteredWorkflow>,
        history_iterator: Option<Box<dyn HistoryIterator>>,
    ) -> Result<WorkflowTaskResponse> {
        let mut execution = self.new_execution(task, workflow);
        let result = match replay(&mut execution, task, history_iterator, false).await {
            Ok(_) => execution.query(query),
            Err(TaskFailure::Error(err)) => {
                error!(error = %err, "Failed to replay workflow history for query");
                return Err(err);
            }
            Err(TaskFailure::Fault(ExecutionFault::Panic { message })) => {
                error!(panic = %message, "Workflow program panicked during query replay");
                QueryTaskResult::Failed(message)
            }
            Err(TaskFailure::Fault(ExecutionFault::Nondeterminism(err))) => {
                QueryTaskResult::Failed(err.to_string())
            }
        };
        debug!("Answered query from full history");
        Ok(self.query_response(task, result))
    }

    fn nondeterministic(
        &self,
        task: &WorkflowTask,
        err: NondeterminismError,
        pending: Vec<Decision>,
    ) -> Result<WorkflowTaskResponse> {
        let policy = self.options.workflow.non_deterministic_policy;
        error!(error = %err, policy = %policy, "Nondeterministic workflow detected");

        match policy {
            NonDeterministicWorkflowPolicy::BlockWorkflow => Err(CadenzaError::Nondeterministic(err)),
            NonDeterministicWorkflowPolicy::FailWorkflow => {
                let mut decisions: Vec<Decision> =
                    pending.into_iter().filter(|d| !d.is_terminal()).collect();
                decisions.push(Decision::FailWorkflowExecution {
                    reason: policy.to_string(),
                    details: Some(err.to_string().into_bytes()),
                });
                Ok(WorkflowTaskResponse::Completed(RespondDecisionTaskCompletedRequest {
                    task_token: task.task_token.clone(),
                    decisions,
                    identity: self.options.identity.clone(),
                    sticky_attributes: None,
                }))
            }
        }
    }

    fn failed(
        &self,
        task: &WorkflowTask,
        cause: DecisionTaskFailedCause,
        details: String,
    ) -> WorkflowTaskResponse {
        WorkflowTaskResponse::Failed(RespondDecisionTaskFailedRequest {
            task_token: task.task_token.clone(),
            cause,
            details: Some(details.into_bytes()),
            identity: self.options.identity.clone(),
        })
    }

    fn query_response(&self, task: &WorkflowTask, result: QueryTaskResult) -> WorkflowTaskResponse {
        WorkflowTaskResponse::QueryCompleted(RespondQueryTaskCompletedRequest {
            task_token: task.task_token.clone(),
            result,
        })
    }

    fn sticky_attributes(&self) -> Option<StickyExecutionAttributes> {
        let config = &self.options.workflow;
        config.enable_sticky.then(|| StickyExecutionAttributes {
            worker_task_list: TaskList::new(self.sticky_task_list.clone()),
            schedule_to_start_timeout_seconds: i32::try_from(
                config.sticky_schedule_to_start_timeout.as_secs(),
            )
            .unwrap_or(i32::MAX),
        })
    }

    fn new_execution(&self, task: &WorkflowTask, workflow: &Arc<RegisteredWorkflow>) -> WorkflowExecution {
        WorkflowExecution::new(
            Arc::clone(workflow),
            self.workflow_info(task, workflow),
            Arc::clone(&self.options.data_converter),
        )
    }

    fn workflow_info(&self, task: &WorkflowTask, workflow: &RegisteredWorkflow) -> WorkflowInfo {
        WorkflowInfo {
            workflow_execution: task.workflow_execution.clone(),
            workflow_type: cadenza_core::WorkflowType::new(workflow.name.clone()),
            task_list_name: self.options.task_list.clone(),
            domain: self.options.domain.clone(),
            ..Default::default()
        }
    }
}

/// Replay the task's history into `execution`; the run's cursor moves only
/// when the whole history applied cleanly.
async fn replay(
    execution: &mut WorkflowExecution,
    task: &WorkflowTask,
    history_iterator: Option<Box<dyn HistoryIterator>>,
    collect: bool,
) -> std::result::Result<Replayed, TaskFailure> {
    let mut history = TaskHistory::new(task, history_iterator);
    let replayed = drive(execution, &mut history, task.previous_started_event_id, collect).await?;
    if history.last_event_id() > 0 {
        execution.set_last_event_id(history.last_event_id());
    }
    Ok(replayed)
}

/// Feed history to the run batch by batch.
///
/// The program advances at each decision-task-started event, and once more
/// at the final event when that event is new and not itself a decision
/// boundary. Decisions produced by batches of recorded history are returned
/// for the correspondence check; the live batch's decisions stay pending.
async fn drive(
    execution: &mut WorkflowExecution,
    history: &mut TaskHistory,
    previous_started_event_id: i64,
    collect: bool,
) -> std::result::Result<Replayed, TaskFailure> {
    let mut replayed = Replayed::default();

    while let Some(batch) = history.next_batch().await? {
        let mut batch_replayed = true;
        let last_index = batch.len() - 1;
        for (index, event) in batch.iter().enumerate() {
            let event_type = event.event_type();
            let replaying =
                event.event_id <= previous_started_event_id || is_decision_event(event_type);
            if collect && is_decision_event(event_type) {
                replayed.recorded.push(event.clone());
            }
            execution.handle_event(event, replaying)?;

            if index == last_index {
                batch_replayed = replaying;
                if !replaying && event_type != EventType::DecisionTaskStarted {
                    execution.run_program()?;
                }
            }
        }
        if batch_replayed {
            replayed
                .replay_decisions
                .extend(execution.take_decisions());
        }
    }

    Ok(replayed)
}
