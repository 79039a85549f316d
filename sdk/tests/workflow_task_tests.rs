//! Decision task processing against scripted histories

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use cadenza_core::history::WorkflowExecutionStartedAttributes;
use cadenza_core::{
    Decision, DecisionTaskFailedCause, DecisionType, EventAttributes, HistoryEvent, HistoryIterator,
    HistoryPage, MatchMode, ServiceError, TaskList, WorkflowExecution, WorkflowType,
};
use cadenza_sdk::{
    CadenzaError, NonDeterministicWorkflowPolicy, WorkflowCache, WorkflowInfo, WorkflowTaskHandler,
    WorkflowTaskHandlerConfig, WorkflowTaskResponse,
};
use common::*;

const BLOCK: NonDeterministicWorkflowPolicy = NonDeterministicWorkflowPolicy::BlockWorkflow;
const FAIL: NonDeterministicWorkflowPolicy = NonDeterministicWorkflowPolicy::FailWorkflow;

#[tokio::test]
async fn test_workflow_execution_started_schedules_activity() {
    init_tracing();
    let handler = workflow_handler("tl1", BLOCK);
    let task = workflow_task(&[workflow_started(1, "tl1")], 0, "HelloWorld_Workflow");

    let response = handler.process_workflow_task(task, None).await.unwrap();
    let decisions = decisions(&response);

    assert_eq!(decisions.len(), 1);
    let Decision::ScheduleActivityTask(attrs) = &decisions[0] else {
        panic!("expected schedule activity, got {:?}", decisions[0]);
    };
    assert_eq!(attrs.activity_type.name, "Greeter_Activity");
    assert_eq!(attrs.activity_id, "0");
    assert_eq!(attrs.task_list.name, "tl1");
}

#[tokio::test]
async fn test_activity_task_scheduled_then_completed() {
    let handler = workflow_handler("tl1", BLOCK);
    let events = hello_world_history("tl1", "Greeter_Activity");

    let response = handler
        .process_workflow_task(workflow_task(&events[0..3], 0, "HelloWorld_Workflow"), None)
        .await
        .unwrap();
    let decisions = decisions(&response);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type(), DecisionType::ScheduleActivityTask);

    let response = handler
        .process_workflow_task(workflow_task(&events[0..8], 3, "HelloWorld_Workflow"), None)
        .await
        .unwrap();
    let decisions = common::decisions(&response);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type(), DecisionType::CompleteWorkflowExecution);
}

#[tokio::test]
async fn test_sticky_continuation_replays_only_new_events() {
    let handler = workflow_handler("tl1", BLOCK);
    let events = hello_world_history("tl1", "Greeter_Activity");
    let first = workflow_task(&events[0..3], 0, "HelloWorld_Workflow");
    let execution = first.workflow_execution.clone();

    let response = handler.process_workflow_task(first, None).await.unwrap();
    let WorkflowTaskResponse::Completed(request) = &response else {
        panic!("expected completed response");
    };
    let sticky = request.sticky_attributes.as_ref().expect("sticky attributes");
    assert_eq!(sticky.worker_task_list.name, handler.sticky_task_list());
    assert_eq!(sticky.schedule_to_start_timeout_seconds, 5);
    assert!(handler.cache().contains(&execution.run_id));

    let mut next = workflow_task(&events[3..8], 3, "HelloWorld_Workflow");
    next.workflow_execution = execution.clone();
    let response = handler.process_workflow_task(next, None).await.unwrap();
    let decisions = decisions(&response);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type(), DecisionType::CompleteWorkflowExecution);
    assert!(!handler.cache().contains(&execution.run_id));
}

#[tokio::test]
async fn test_partial_history_without_cached_state_resets_sticky() {
    let handler = workflow_handler("tl1", BLOCK);
    let events = hello_world_history("tl1", "Greeter_Activity");

    let response = handler
        .process_workflow_task(workflow_task(&events[3..8], 3, "HelloWorld_Workflow"), None)
        .await
        .unwrap();

    let WorkflowTaskResponse::Failed(request) = response else {
        panic!("expected failed response");
    };
    assert_eq!(request.cause, DecisionTaskFailedCause::ResetStickyTaskList);
    assert_eq!(handler.cache().size(), 0);
}

#[tokio::test]
async fn test_query_workflow_sticky() {
    let handler = workflow_handler("sticky-tl", BLOCK);
    let events = hello_world_history("sticky-tl", "Greeter_Activity");
    let first = workflow_task(&events[0..1], 0, "HelloWorld_Workflow").with_started_event_id(1);
    let execution = first.workflow_execution.clone();

    let response = handler.process_workflow_task(first, None).await.unwrap();
    let decisions = decisions(&response);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type(), DecisionType::ScheduleActivityTask);

    let mut query = query_task(&[], 6, "HelloWorld_Workflow", QUERY_TYPE);
    query.workflow_execution = execution.clone();
    let response = handler.process_workflow_task(query, None).await.unwrap();

    assert_eq!(query_answer(&response), json!("waiting-activity-result"));
    assert!(handler.cache().contains(&execution.run_id));
}

#[tokio::test]
async fn test_query_workflow_non_sticky() {
    let events = hello_world_history("tl1", "Greeter_Activity");
    let cases = [
        (3, "waiting-activity-result"),
        (7, "waiting-activity-result"),
        (8, "done"),
        (9, "done"),
    ];

    for (last_event_id, expected) in cases {
        let handler = workflow_handler("tl1", BLOCK);
        let task = query_task(
            &events[0..last_event_id as usize],
            last_event_id,
            "HelloWorld_Workflow",
            QUERY_TYPE,
        );
        let response = handler.process_workflow_task(task, None).await.unwrap();
        assert_eq!(
            query_answer(&response),
            json!(expected),
            "query after event {last_event_id}"
        );
        assert_eq!(handler.cache().size(), 0);
    }

    let handler = workflow_handler("tl1", BLOCK);
    let task = query_task(&events, 9, "HelloWorld_Workflow", "invalid-query-type");
    let response = handler.process_workflow_task(task, None).await.unwrap();
    let WorkflowTaskResponse::QueryCompleted(request) = response else {
        panic!("expected query response");
    };
    assert!(request.query_result().is_none());
    let message = request.error_message().unwrap();
    assert!(message.contains("unknown queryType"), "{message}");
    assert!(message.contains(QUERY_TYPE), "{message}");
}

#[tokio::test]
async fn test_stack_trace_query_names_blocking_activity() {
    let handler = workflow_handler("tl1", BLOCK);
    let events = hello_world_history("tl1", "Greeter_Activity");
    let task = query_task(&events[0..3], 3, "HelloWorld_Workflow", "__stack_trace");

    let response = handler.process_workflow_task(task, None).await.unwrap();
    let Value::String(trace) = query_answer(&response) else {
        panic!("stack trace is not a string");
    };
    assert!(trace.contains("Greeter_Activity"), "{trace}");
}

fn mismatched_history(activity_type: &str) -> Vec<HistoryEvent> {
    let mut events = hello_world_history("taskList", "pkg.Greeter_Activity");
    events.truncate(5);
    if let EventAttributes::ActivityTaskScheduled(attrs) = &mut events[4].attributes {
        attrs.activity_type.name = activity_type.to_string();
    }
    events
}

#[tokio::test]
async fn test_cache_eviction_when_error_occurs() {
    let handler = workflow_handler("taskList", BLOCK);
    let task = workflow_task(&mismatched_history("some-other-activity"), 3, "HelloWorld_Workflow");

    let err = handler.process_workflow_task(task, None).await.unwrap_err();

    assert!(matches!(err, CadenzaError::Nondeterministic(_)));
    assert!(err.to_string().contains("nondeterministic"), "{err}");
    assert_eq!(handler.cache().size(), 0);
}

#[tokio::test]
async fn test_nondeterministic_detection() {
    let handler = workflow_handler("taskList", BLOCK);

    let matching = workflow_task(&mismatched_history("pkg.Greeter_Activity"), 3, "HelloWorld_Workflow");
    let response = handler.process_workflow_task(matching, None).await.unwrap();
    assert!(matches!(response, WorkflowTaskResponse::Completed(_)));

    let events = mismatched_history("some-other-activity");
    let err = handler
        .process_workflow_task(workflow_task(&events, 3, "HelloWorld_Workflow"), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("nondeterministic"), "{err}");

    let failing = workflow_handler("taskList", FAIL);
    let response = failing
        .process_workflow_task(workflow_task(&events, 3, "HelloWorld_Workflow"), None)
        .await
        .unwrap();
    let decisions = decisions(&response);
    assert!(!decisions.is_empty());
    let Some(Decision::FailWorkflowExecution { reason, details }) = decisions.last() else {
        panic!("expected a fail-workflow decision last, got {decisions:?}");
    };
    assert!(reason.contains("NonDeterministicWorkflowPolicyFailWorkflow"), "{reason}");
    let details = String::from_utf8(details.clone().unwrap()).unwrap();
    assert!(details.contains("some-other-activity"), "{details}");
    assert_eq!(failing.cache().size(), 0);

    let renamed = mismatched_history("new-package.Greeter_Activity");
    let response = handler
        .process_workflow_task(workflow_task(&renamed, 3, "HelloWorld_Workflow"), None)
        .await
        .unwrap();
    assert!(matches!(response, WorkflowTaskResponse::Completed(_)));
}

fn started_decision_task(workflow_type: &str, started: HistoryEvent) -> cadenza_core::WorkflowTask {
    let events = vec![started, decision_task_scheduled(2, "taskList"), decision_task_started(3)];
    workflow_task(&events, 3, workflow_type)
}

#[tokio::test]
async fn test_workflow_returns_panic_error() {
    let handler = workflow_handler("taskList", BLOCK);
    let task = started_decision_task("ReturnPanicWorkflow", workflow_started(1, "taskList"));

    let response = handler.process_workflow_task(task, None).await.unwrap();
    let decisions = decisions(&response);

    let Decision::FailWorkflowExecution { reason, details } = &decisions[0] else {
        panic!("expected fail-workflow, got {:?}", decisions[0]);
    };
    assert_eq!(reason, "cadenzaInternal:Panic");
    let details: Value = serde_json::from_slice(details.as_deref().unwrap()).unwrap();
    assert_eq!(details, json!(["panicError", "stackTrace"]));
}

#[tokio::test]
async fn test_workflow_panics() {
    let handler = workflow_handler("taskList", BLOCK);
    let task = started_decision_task("PanicWorkflow", workflow_started(1, "taskList"));
    let run_id = task.workflow_execution.run_id.clone();

    let response = handler.process_workflow_task(task, None).await.unwrap();

    let WorkflowTaskResponse::Failed(request) = response else {
        panic!("expected failed response");
    };
    assert_eq!(request.cause, DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure);
    assert_eq!(request.cause.as_str(), "WORKFLOW_WORKER_UNHANDLED_FAILURE");
    assert_eq!(request.details.as_deref(), Some(&b"panicError"[..]));
    assert!(!handler.cache().contains(&run_id));
}

#[tokio::test]
async fn test_get_workflow_info() {
    let last_completion_result = encoded(json!("lastCompletionData"));
    let continued_run_id = uuid::Uuid::new_v4().to_string();
    let started = workflow_started_with(
        1,
        WorkflowExecutionStartedAttributes {
            input: Some(last_completion_result.clone()),
            task_list: TaskList::new("taskList"),
            parent_workflow_execution: Some(WorkflowExecution::new("parentID", "parentRun")),
            parent_workflow_domain: Some("parentDomain".to_string()),
            cron_schedule: Some("5 4 * * *".to_string()),
            continued_execution_run_id: Some(continued_run_id.clone()),
            attempt: 123,
            execution_start_to_close_timeout_seconds: 213456,
            task_start_to_close_timeout_seconds: 21,
            last_completion_result: Some(last_completion_result),
            ..Default::default()
        },
    );
    let handler = workflow_handler("taskList", BLOCK);
    let task = started_decision_task("GetWorkflowInfoWorkflow", started);

    let response = handler.process_workflow_task(task, None).await.unwrap();
    let decisions = decisions(&response);

    let Decision::CompleteWorkflowExecution { result } = &decisions[0] else {
        panic!("expected complete-workflow, got {:?}", decisions[0]);
    };
    let info: WorkflowInfo = serde_json::from_slice(result.as_deref().unwrap()).unwrap();
    assert_eq!(info.task_list_name, "taskList");
    let parent = info.parent_workflow_execution.unwrap();
    assert_eq!(parent.workflow_id, "parentID");
    assert_eq!(parent.run_id, "parentRun");
    assert_eq!(info.cron_schedule.as_deref(), Some("5 4 * * *"));
    assert_eq!(info.continued_execution_run_id, Some(continued_run_id));
    assert_eq!(info.parent_workflow_domain.as_deref(), Some("parentDomain"));
    assert_eq!(info.attempt, 123);
    assert_eq!(info.execution_start_to_close_timeout_seconds, 213456);
    assert_eq!(info.task_start_to_close_timeout_seconds, 21);
    assert_eq!(info.workflow_type, WorkflowType::new("GetWorkflowInfoWorkflow"));
    assert_eq!(info.domain, TEST_DOMAIN);
}

#[tokio::test]
async fn test_cancel_activity_before_sent() {
    let handler = workflow_handler("tl1", BLOCK);
    let events = vec![
        workflow_started(1, "tl1"),
        decision_task_scheduled(2, "tl1"),
        decision_task_started(3),
    ];

    let response = handler
        .process_workflow_task(workflow_task(&events, 0, "HelloWorld_WorkflowCancel"), None)
        .await
        .unwrap();
    let decisions = decisions(&response);

    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type(), DecisionType::CompleteWorkflowExecution);
}

struct StaticPages {
    pages: Vec<HistoryPage>,
}

#[async_trait]
impl HistoryIterator for StaticPages {
    async fn next_page(&mut self, page_token: &[u8]) -> Result<HistoryPage, ServiceError> {
        assert_eq!(page_token, b"token");
        if self.pages.is_empty() {
            return Err(ServiceError::EntityNotExists {
                message: "no more history".to_string(),
            });
        }
        Ok(self.pages.remove(0))
    }
}

#[tokio::test]
async fn test_page_token() {
    let handler = workflow_handler("tl1", BLOCK);
    let events = vec![workflow_started(1, "tl1"), decision_task_scheduled(2, "tl1")];
    let task = workflow_task(&events, 0, "HelloWorld_Workflow").with_next_page_token(b"token".to_vec());
    let iterator = StaticPages {
        pages: vec![HistoryPage {
            events: vec![decision_task_started(3)],
            next_page_token: Vec::new(),
        }],
    };

    let response = handler
        .process_workflow_task(task, Some(Box::new(iterator)))
        .await
        .unwrap();
    let decisions = decisions(&response);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type(), DecisionType::ScheduleActivityTask);
}

#[tokio::test]
async fn test_history_gap_is_an_error_and_evicts() {
    let handler = workflow_handler("tl1", BLOCK);
    let events = vec![workflow_started(1, "tl1"), decision_task_started(3)];
    let task = workflow_task(&events, 0, "HelloWorld_Workflow");

    let err = handler.process_workflow_task(task, None).await.unwrap_err();
    assert!(matches!(
        err,
        CadenzaError::MissingHistoryEvents {
            expected: 2,
            received: 3
        }
    ));
    assert_eq!(handler.cache().size(), 0);
}

#[tokio::test]
async fn test_unregistered_workflow_fails_task() {
    let handler = workflow_handler("tl1", BLOCK);
    let task = workflow_task(&[workflow_started(1, "tl1")], 0, "Missing_Workflow");

    let response = handler.process_workflow_task(task, None).await.unwrap();
    let WorkflowTaskResponse::Failed(request) = response else {
        panic!("expected failed response");
    };
    assert_eq!(request.cause, DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure);
    let details = String::from_utf8(request.details.unwrap()).unwrap();
    assert!(details.contains("Missing_Workflow"), "{details}");
}

#[tokio::test]
async fn test_empty_history_is_rejected() {
    let handler = workflow_handler("tl1", BLOCK);
    let task = workflow_task(&[], 0, "HelloWorld_Workflow");

    let err = handler.process_workflow_task(task, None).await.unwrap_err();
    assert!(matches!(err, CadenzaError::InvalidTask(_)));
}

#[tokio::test]
async fn test_sticky_disabled_omits_attributes() {
    let config = WorkflowTaskHandlerConfig {
        enable_sticky: false,
        ..WorkflowTaskHandlerConfig::DEFAULT
    };
    let handler = WorkflowTaskHandler::new(
        worker_options("tl1").with_workflow_config(config),
        Arc::new(sample_workflows()),
        Arc::new(WorkflowCache::new(10)),
    );

    let response = handler
        .process_workflow_task(workflow_task(&[workflow_started(1, "tl1")], 0, "HelloWorld_Workflow"), None)
        .await
        .unwrap();
    let WorkflowTaskResponse::Completed(request) = response else {
        panic!("expected completed response");
    };
    assert!(request.sticky_attributes.is_none());
}

#[tokio::test]
async fn test_cache_capacity_bounds_runs() {
    let handler = WorkflowTaskHandler::new(
        worker_options("tl1"),
        Arc::new(sample_workflows()),
        Arc::new(WorkflowCache::new(2)),
    );

    for _ in 0..3 {
        let task = workflow_task(&[workflow_started(1, "tl1")], 0, "HelloWorld_Workflow");
        handler.process_workflow_task(task, None).await.unwrap();
    }
    assert_eq!(handler.cache().size(), 2);
}

#[tokio::test]
async fn test_response_is_delivered_to_service() {
    let service = MockWorkflowService::new();
    let handler = workflow_handler("tl1", BLOCK);
    let task = workflow_task(&[workflow_started(1, "tl1")], 0, "HelloWorld_Workflow");

    let response = handler.process_workflow_task(task, None).await.unwrap();
    response.send(service.as_ref()).await.unwrap();

    let completions = service.decision_completions.lock();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].identity, TEST_IDENTITY);
    assert_eq!(completions[0].task_token, b"task-token");
}

#[tokio::test]
async fn test_from_options_sizes_cache() {
    let config = WorkflowTaskHandlerConfig {
        max_cached_workflows: 1,
        ..WorkflowTaskHandlerConfig::DEFAULT
    };
    let handler = WorkflowTaskHandler::from_options(
        worker_options("tl1").with_workflow_config(config),
        Arc::new(sample_workflows()),
    );
    assert_eq!(handler.cache().capacity(), 1);

    for _ in 0..2 {
        let task = workflow_task(&[workflow_started(1, "tl1")], 0, "HelloWorld_Workflow");
        handler.process_workflow_task(task, None).await.unwrap();
    }
    assert_eq!(handler.cache().size(), 1);
}

fn rerouted_history() -> Vec<HistoryEvent> {
    let mut events = mismatched_history("Greeter_Activity");
    if let EventAttributes::ActivityTaskScheduled(attrs) = &mut events[4].attributes {
        attrs.task_list = TaskList::new("other-task-list");
    }
    events
}

#[tokio::test]
async fn test_strict_match_mode_flags_task_list_change() {
    let lenient = workflow_handler("taskList", BLOCK);
    let response = lenient
        .process_workflow_task(workflow_task(&rerouted_history(), 3, "HelloWorld_Workflow"), None)
        .await
        .unwrap();
    assert!(matches!(response, WorkflowTaskResponse::Completed(_)), "{response:?}");

    let strict = WorkflowTaskHandler::new(
        worker_options("taskList").with_workflow_config(
            WorkflowTaskHandlerConfig::DEFAULT
                .with_non_deterministic_policy(BLOCK)
                .with_match_mode(MatchMode::Strict),
        ),
        Arc::new(sample_workflows()),
        Arc::new(WorkflowCache::new(10)),
    );
    let matching = workflow_task(&mismatched_history("Greeter_Activity"), 3, "HelloWorld_Workflow");
    let response = strict.process_workflow_task(matching, None).await.unwrap();
    assert!(matches!(response, WorkflowTaskResponse::Completed(_)), "{response:?}");

    let err = strict
        .process_workflow_task(workflow_task(&rerouted_history(), 3, "HelloWorld_Workflow"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CadenzaError::Nondeterministic(_)), "{err:?}");
}

#[tokio::test]
async fn test_full_history_query_keeps_sticky_state() {
    let handler = workflow_handler("tl1", BLOCK);
    let events = hello_world_history("tl1", "Greeter_Activity");
    let first = workflow_task(&events[0..3], 0, "HelloWorld_Workflow");
    let execution = first.workflow_execution.clone();
    handler.process_workflow_task(first, None).await.unwrap();

    let mut query = query_task(&events[0..3], 3, "HelloWorld_Workflow", QUERY_TYPE);
    query.workflow_execution = execution.clone();
    let response = handler.process_workflow_task(query, None).await.unwrap();
    assert_eq!(query_answer(&response), json!("waiting-activity-result"));
    assert!(handler.cache().contains(&execution.run_id));

    let mut next = workflow_task(&events[3..8], 3, "HelloWorld_Workflow");
    next.workflow_execution = execution;
    let response = handler.process_workflow_task(next, None).await.unwrap();
    let decisions = decisions(&response);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type(), DecisionType::CompleteWorkflowExecution);
}

/// Serves one page once the test releases it, reporting when it is first asked
struct GatedPage {
    entered: Option<oneshot::Sender<()>>,
    release: Option<oneshot::Receiver<()>>,
    page: Option<Result<HistoryPage, ServiceError>>,
}

impl GatedPage {
    fn new(page: Result<HistoryPage, ServiceError>) -> (Self, oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        let gated = Self {
            entered: Some(entered_tx),
            release: Some(release_rx),
            page: Some(page),
        };
        (gated, entered_rx, release_tx)
    }
}

#[async_trait]
impl HistoryIterator for GatedPage {
    async fn next_page(&mut self, _page_token: &[u8]) -> Result<HistoryPage, ServiceError> {
        if let Some(entered) = self.entered.take() {
            let _ = entered.send(());
        }
        if let Some(release) = self.release.take() {
            let _ = release.await;
        }
        self.page.take().unwrap_or_else(|| {
            Err(ServiceError::EntityNotExists {
                message: "no more history".to_string(),
            })
        })
    }
}

#[tokio::test]
async fn test_failed_task_leaves_no_state_for_waiting_task() {
    init_tracing();
    let handler = workflow_handler("tl1", BLOCK);
    let events = hello_world_history("tl1", "Greeter_Activity");
    let first = workflow_task(&events[0..3], 0, "HelloWorld_Workflow");
    let execution = first.workflow_execution.clone();
    handler.process_workflow_task(first, None).await.unwrap();

    let mut failing = workflow_task(&events[3..7], 3, "HelloWorld_Workflow")
        .with_next_page_token(b"token".to_vec());
    failing.workflow_execution = execution.clone();
    let (pages, entered, release) = GatedPage::new(Err(ServiceError::Transport {
        message: "connection reset".to_string(),
    }));

    let mut waiting = workflow_task(&events[7..9], 3, "HelloWorld_Workflow");
    waiting.workflow_execution = execution.clone();

    let second = async {
        entered.await.unwrap();
        let waiting = handler.process_workflow_task(waiting, None);
        tokio::pin!(waiting);
        assert!(futures::poll!(waiting.as_mut()).is_pending());
        release.send(()).unwrap();
        waiting.await
    };
    let (failed, waited) = tokio::join!(
        handler.process_workflow_task(failing, Some(Box::new(pages))),
        second
    );

    let err = failed.unwrap_err();
    assert!(matches!(err, CadenzaError::Service(ServiceError::Transport { .. })), "{err:?}");
    let WorkflowTaskResponse::Failed(request) = waited.unwrap() else {
        panic!("expected the waiting task to be told to reset");
    };
    assert_eq!(request.cause, DecisionTaskFailedCause::ResetStickyTaskList);
    assert!(!handler.cache().contains(&execution.run_id));

    let mut rebuilt = workflow_task(&events[0..8], 3, "HelloWorld_Workflow");
    rebuilt.workflow_execution = execution;
    let response = handler.process_workflow_task(rebuilt, None).await.unwrap();
    let decisions = decisions(&response);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type(), DecisionType::CompleteWorkflowExecution);
}

#[tokio::test]
async fn test_in_flight_run_is_not_evicted() {
    let handler = WorkflowTaskHandler::new(
        worker_options("tl1"),
        Arc::new(sample_workflows()),
        Arc::new(WorkflowCache::new(1)),
    );
    let events = vec![workflow_started(1, "tl1"), decision_task_scheduled(2, "tl1")];
    let first = workflow_task(&events, 0, "HelloWorld_Workflow").with_next_page_token(b"token".to_vec());
    let run_id = first.workflow_execution.run_id.clone();
    let (pages, entered, release) = GatedPage::new(Ok(HistoryPage {
        events: vec![decision_task_started(3)],
        next_page_token: Vec::new(),
    }));

    let mut query = query_task(&[], 3, "HelloWorld_Workflow", QUERY_TYPE);
    query.workflow_execution = first.workflow_execution.clone();

    let others = async {
        entered.await.unwrap();

        let other = workflow_task(&[workflow_started(1, "tl1")], 0, "HelloWorld_Workflow");
        let other_run_id = other.workflow_execution.run_id.clone();
        let response = handler.process_workflow_task(other, None).await.unwrap();
        assert!(matches!(response, WorkflowTaskResponse::Completed(_)), "{response:?}");
        assert!(handler.cache().contains(&run_id));
        assert!(handler.cache().contains(&other_run_id));

        let query = handler.process_workflow_task(query, None);
        tokio::pin!(query);
        assert!(futures::poll!(query.as_mut()).is_pending());
        release.send(()).unwrap();
        (query.await, other_run_id)
    };
    let (first_response, (answer, other_run_id)) = tokio::join!(
        handler.process_workflow_task(first, Some(Box::new(pages))),
        others
    );

    let first_response = first_response.unwrap();
    let decisions = decisions(&first_response);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type(), DecisionType::ScheduleActivityTask);
    assert_eq!(query_answer(&answer.unwrap()), json!("waiting-activity-result"));
    assert_eq!(handler.cache().size(), 1);
    assert!(handler.cache().contains(&run_id));
    assert!(!handler.cache().contains(&other_run_id));
}
