//! Shared fixtures: history builders, a scripted service and sample programs

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use cadenza_core::client::*;
use cadenza_core::history::{ActivityTaskScheduledAttributes, WorkflowExecutionStartedAttributes};
use cadenza_core::{
    ActivityType, EventAttributes, HistoryEvent, ServiceError, TaskList, WorkflowExecution,
    WorkflowQuery, WorkflowService, WorkflowTask,
};
use cadenza_sdk::prelude::*;
use cadenza_sdk::{WorkflowTaskHandler, WorkflowTaskResponse};

pub const TEST_DOMAIN: &str = "test-domain";
pub const TEST_IDENTITY: &str = "test-id-1";
pub const QUERY_TYPE: &str = "test-query";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// History builders

pub fn workflow_started(id: i64, task_list: &str) -> HistoryEvent {
    workflow_started_with(
        id,
        WorkflowExecutionStartedAttributes {
            task_list: TaskList::new(task_list),
            ..Default::default()
        },
    )
}

pub fn workflow_started_with(id: i64, attrs: WorkflowExecutionStartedAttributes) -> HistoryEvent {
    HistoryEvent::new(id, EventAttributes::WorkflowExecutionStarted(attrs))
}

pub fn decision_task_scheduled(id: i64, task_list: &str) -> HistoryEvent {
    HistoryEvent::new(
        id,
        EventAttributes::DecisionTaskScheduled {
            task_list: TaskList::new(task_list),
            start_to_close_timeout_seconds: 10,
            attempt: 0,
        },
    )
}

pub fn decision_task_started(id: i64) -> HistoryEvent {
    HistoryEvent::new(
        id,
        EventAttributes::DecisionTaskStarted {
            scheduled_event_id: id - 1,
            identity: TEST_IDENTITY.to_string(),
        },
    )
}

pub fn decision_task_completed(id: i64, scheduled_event_id: i64) -> HistoryEvent {
    HistoryEvent::new(
        id,
        EventAttributes::DecisionTaskCompleted {
            scheduled_event_id,
            started_event_id: scheduled_event_id + 1,
            identity: TEST_IDENTITY.to_string(),
        },
    )
}

pub fn activity_task_scheduled(
    id: i64,
    activity_id: &str,
    activity_type: &str,
    task_list: &str,
) -> HistoryEvent {
    HistoryEvent::new(
        id,
        EventAttributes::ActivityTaskScheduled(ActivityTaskScheduledAttributes {
            activity_id: activity_id.to_string(),
            activity_type: ActivityType::new(activity_type),
            task_list: TaskList::new(task_list),
            ..Default::default()
        }),
    )
}

pub fn activity_task_started(id: i64, scheduled_event_id: i64) -> HistoryEvent {
    HistoryEvent::new(
        id,
        EventAttributes::ActivityTaskStarted {
            scheduled_event_id,
            identity: TEST_IDENTITY.to_string(),
            attempt: 0,
        },
    )
}

pub fn activity_task_completed(id: i64, scheduled_event_id: i64) -> HistoryEvent {
    HistoryEvent::new(
        id,
        EventAttributes::ActivityTaskCompleted {
            scheduled_event_id,
            started_event_id: scheduled_event_id + 1,
            result: None,
        },
    )
}

pub fn workflow_signaled(id: i64, signal_name: &str) -> HistoryEvent {
    HistoryEvent::new(
        id,
        EventAttributes::WorkflowExecutionSignaled {
            signal_name: signal_name.to_string(),
            input: None,
            identity: "test-identity".to_string(),
        },
    )
}

/// A run that scheduled `activity_type`, saw it complete, started a second
/// decision task and then received a signal: events 1 through 9.
pub fn hello_world_history(task_list: &str, activity_type: &str) -> Vec<HistoryEvent> {
    vec![
        workflow_started(1, task_list),
        decision_task_scheduled(2, task_list),
        decision_task_started(3),
        decision_task_completed(4, 2),
        activity_task_scheduled(5, "0", activity_type, task_list),
        activity_task_started(6, 5),
        activity_task_completed(7, 5),
        decision_task_started(8),
        workflow_signaled(9, "test-signal"),
    ]
}

/// Decision task for a fresh run id
pub fn workflow_task(
    events: &[HistoryEvent],
    previous_started_event_id: i64,
    workflow_type: &str,
) -> WorkflowTask {
    let execution = WorkflowExecution::new("fake-workflow-id", Uuid::new_v4().to_string());
    WorkflowTask::new(execution, workflow_type, events.to_vec())
        .with_task_token(b"task-token".to_vec())
        .with_previous_started_event_id(previous_started_event_id)
}

pub fn query_task(
    events: &[HistoryEvent],
    previous_started_event_id: i64,
    workflow_type: &str,
    query_type: &str,
) -> WorkflowTask {
    workflow_task(events, previous_started_event_id, workflow_type)
        .with_query(WorkflowQuery::new(query_type))
}

// Handlers

pub fn worker_options(task_list: &str) -> WorkerOptions {
    WorkerOptions::new(TEST_DOMAIN, task_list).with_identity(TEST_IDENTITY)
}

pub fn workflow_handler(task_list: &str, policy: NonDeterministicWorkflowPolicy) -> WorkflowTaskHandler {
    let options = worker_options(task_list).with_workflow_config(
        WorkflowTaskHandlerConfig::DEFAULT.with_non_deterministic_policy(policy),
    );
    WorkflowTaskHandler::new(
        options,
        Arc::new(sample_workflows()),
        Arc::new(WorkflowCache::new(100)),
    )
}

pub fn decisions(response: &WorkflowTaskResponse) -> &[cadenza_core::Decision] {
    match response {
        WorkflowTaskResponse::Completed(request) => &request.decisions,
        other => panic!("expected a completed response, got {other:?}"),
    }
}

pub fn query_answer(response: &WorkflowTaskResponse) -> Value {
    match response {
        WorkflowTaskResponse::QueryCompleted(request) => {
            assert!(request.error_message().is_none(), "query failed: {request:?}");
            let bytes = request.query_result().expect("query result");
            serde_json::from_slice(bytes).expect("decode query result")
        }
        other => panic!("expected a query response, got {other:?}"),
    }
}

// Sample workflows and activities

pub fn sample_workflows() -> WorkflowRegistry {
    let registry = WorkflowRegistry::new();

    registry
        .register_simple("HelloWorld_Workflow", |ctx: WorkflowContext, _input: Value| async move {
            let status = Arc::new(Mutex::new("starting-value".to_string()));
            let answer = Arc::clone(&status);
            ctx.set_query_handler(QUERY_TYPE, move |_args| {
                Ok(Value::String(answer.lock().clone()))
            })?;

            *status.lock() = "waiting-activity-result".to_string();
            let result = ctx
                .execute_activity("Greeter_Activity", Value::Null, ActivityOptions::default())
                .await;
            match result {
                Ok(_) => {
                    *status.lock() = "done".to_string();
                    Ok(Value::Null)
                }
                Err(err) => {
                    *status.lock() = format!("error:{err}");
                    Err(err)
                }
            }
        })
        .expect("register HelloWorld_Workflow");

    registry
        .register_simple("HelloWorld_WorkflowCancel", |ctx: WorkflowContext, _input: Value| async move {
            let activity = ctx.execute_activity(
                "Greeter_Activity",
                Value::Null,
                ActivityOptions::default(),
            );
            activity.cancel();
            let _ = activity.await;
            Ok(Value::Null)
        })
        .expect("register HelloWorld_WorkflowCancel");

    registry
        .register_simple("ReturnPanicWorkflow", |_ctx: WorkflowContext, _input: Value| async move {
            Err(WorkflowError::panic("panicError", "stackTrace"))
        })
        .expect("register ReturnPanicWorkflow");

    registry
        .register_simple("PanicWorkflow", |_ctx: WorkflowContext, _input: Value| async move {
            if true {
                panic!("panicError");
            }
            Ok(Value::Null)
        })
        .expect("register PanicWorkflow");

    registry
        .register("GetWorkflowInfoWorkflow", |ctx: WorkflowContext, expected: String| async move {
            let info = ctx.workflow_info();
            let last: String = match &info.last_completion_result {
                Some(bytes) => serde_json::from_slice(bytes)?,
                None => String::new(),
            };
            if last != expected {
                return Err(WorkflowError::application(format!(
                    "lastCompletionResult is not {expected}"
                )));
            }
            Ok(info)
        })
        .expect("register GetWorkflowInfoWorkflow");

    registry
}

pub fn sample_activities() -> ActivityRegistry {
    let registry = ActivityRegistry::new();
    registry
        .register("Greeter_Activity", |_ctx: ActivityContext, name: Option<String>| async move {
            Ok(format!("Hello, {}!", name.unwrap_or_else(|| "World".to_string())))
        })
        .expect("register Greeter_Activity");
    registry
}

// Scripted service

type HeartbeatReply = std::result::Result<RecordActivityTaskHeartbeatResponse, ServiceError>;

/// Records every request and answers heartbeats from a script; an empty
/// script answers with no cancel request.
#[derive(Default)]
pub struct MockWorkflowService {
    heartbeat_replies: Mutex<VecDeque<HeartbeatReply>>,
    pub heartbeats: Mutex<Vec<RecordActivityTaskHeartbeatRequest>>,
    pub decision_completions: Mutex<Vec<RespondDecisionTaskCompletedRequest>>,
    pub decision_failures: Mutex<Vec<RespondDecisionTaskFailedRequest>>,
    pub query_completions: Mutex<Vec<RespondQueryTaskCompletedRequest>>,
    pub activity_completions: Mutex<Vec<RespondActivityTaskCompletedRequest>>,
    pub activity_failures: Mutex<Vec<RespondActivityTaskFailedRequest>>,
    pub activity_cancellations: Mutex<Vec<RespondActivityTaskCanceledRequest>>,
}

impl MockWorkflowService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_heartbeat_replies(replies: Vec<HeartbeatReply>) -> Arc<Self> {
        Arc::new(Self {
            heartbeat_replies: Mutex::new(replies.into()),
            ..Default::default()
        })
    }

    pub fn cancel_requested() -> HeartbeatReply {
        Ok(RecordActivityTaskHeartbeatResponse {
            cancel_requested: true,
        })
    }

    pub fn heartbeat_count(&self) -> usize {
        self.heartbeats.lock().len()
    }
}

#[async_trait]
impl WorkflowService for MockWorkflowService {
    async fn record_activity_task_heartbeat(
        &self,
        request: RecordActivityTaskHeartbeatRequest,
    ) -> HeartbeatReply {
        self.heartbeats.lock().push(request);
        self.heartbeat_replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(RecordActivityTaskHeartbeatResponse::default()))
    }

    async fn respond_decision_task_completed(
        &self,
        request: RespondDecisionTaskCompletedRequest,
    ) -> std::result::Result<(), ServiceError> {
        self.decision_completions.lock().push(request);
        Ok(())
    }

    async fn respond_decision_task_failed(
        &self,
        request: RespondDecisionTaskFailedRequest,
    ) -> std::result::Result<(), ServiceError> {
        self.decision_failures.lock().push(request);
        Ok(())
    }

    async fn respond_query_task_completed(
        &self,
        request: RespondQueryTaskCompletedRequest,
    ) -> std::result::Result<(), ServiceError> {
        self.query_completions.lock().push(request);
        Ok(())
    }

    async fn respond_activity_task_completed(
        &self,
        request: RespondActivityTaskCompletedRequest,
    ) -> std::result::Result<(), ServiceError> {
        self.activity_completions.lock().push(request);
        Ok(())
    }

    async fn respond_activity_task_failed(
        &self,
        request: RespondActivityTaskFailedRequest,
    ) -> std::result::Result<(), ServiceError> {
        self.activity_failures.lock().push(request);
        Ok(())
    }

    async fn respond_activity_task_canceled(
        &self,
        request: RespondActivityTaskCanceledRequest,
    ) -> std::result::Result<(), ServiceError> {
        self.activity_cancellations.lock().push(request);
        Ok(())
    }
}

/// Encoded form of `value` under the default converter
pub fn encoded(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).expect("encode")
}

pub fn greeting() -> Vec<u8> {
    encoded(json!("Hello, World!"))
}
