//! History events recorded by the orchestration service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{
    ActivityType, DecisionTaskFailedCause, TaskList, TimeoutType, WorkflowExecution, WorkflowType,
};

/// Every history event kind of the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    // Workflow lifecycle
    WorkflowExecutionStarted,
    WorkflowExecutionCompleted,
    WorkflowExecutionFailed,
    WorkflowExecutionTimedOut,

    // Decision tasks
    DecisionTaskScheduled,
    DecisionTaskStarted,
    DecisionTaskCompleted,
    DecisionTaskTimedOut,
    DecisionTaskFailed,

    // Activities
    ActivityTaskScheduled,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskTimedOut,
    ActivityTaskCancelRequested,
    RequestCancelActivityTaskFailed,
    ActivityTaskCanceled,

    // Timers
    TimerStarted,
    TimerFired,
    CancelTimerFailed,
    TimerCanceled,

    // Cancellation
    WorkflowExecutionCancelRequested,
    WorkflowExecutionCanceled,
    RequestCancelExternalWorkflowExecutionInitiated,
    RequestCancelExternalWorkflowExecutionFailed,
    ExternalWorkflowExecutionCancelRequested,

    MarkerRecorded,
    WorkflowExecutionSignaled,
    WorkflowExecutionTerminated,
    WorkflowExecutionContinuedAsNew,

    // Child workflows
    StartChildWorkflowExecutionInitiated,
    StartChildWorkflowExecutionFailed,
    ChildWorkflowExecutionStarted,
    ChildWorkflowExecutionCompleted,
    ChildWorkflowExecutionFailed,
    ChildWorkflowExecutionCanceled,
    ChildWorkflowExecutionTimedOut,
    ChildWorkflowExecutionTerminated,

    // External signals
    SignalExternalWorkflowExecutionInitiated,
    SignalExternalWorkflowExecutionFailed,
    ExternalWorkflowExecutionSignaled,
}

impl EventType {
    /// All event kinds, in protocol order
    pub const ALL: [EventType; 41] = [
        Self::WorkflowExecutionStarted,
        Self::WorkflowExecutionCompleted,
        Self::WorkflowExecutionFailed,
        Self::WorkflowExecutionTimedOut,
        Self::DecisionTaskScheduled,
        Self::DecisionTaskStarted,
        Self::DecisionTaskCompleted,
        Self::DecisionTaskTimedOut,
        Self::DecisionTaskFailed,
        Self::ActivityTaskScheduled,
        Self::ActivityTaskStarted,
        Self::ActivityTaskCompleted,
        Self::ActivityTaskFailed,
        Self::ActivityTaskTimedOut,
        Self::ActivityTaskCancelRequested,
        Self::RequestCancelActivityTaskFailed,
        Self::ActivityTaskCanceled,
        Self::TimerStarted,
        Self::TimerFired,
        Self::CancelTimerFailed,
        Self::TimerCanceled,
        Self::WorkflowExecutionCancelRequested,
        Self::WorkflowExecutionCanceled,
        Self::RequestCancelExternalWorkflowExecutionInitiated,
        Self::RequestCancelExternalWorkflowExecutionFailed,
        Self::ExternalWorkflowExecutionCancelRequested,
        Self::MarkerRecorded,
        Self::WorkflowExecutionSignaled,
        Self::WorkflowExecutionTerminated,
        Self::WorkflowExecutionContinuedAsNew,
        Self::StartChildWorkflowExecutionInitiated,
        Self::StartChildWorkflowExecutionFailed,
        Self::ChildWorkflowExecutionStarted,
        Self::ChildWorkflowExecutionCompleted,
        Self::ChildWorkflowExecutionFailed,
        Self::ChildWorkflowExecutionCanceled,
        Self::ChildWorkflowExecutionTimedOut,
        Self::ChildWorkflowExecutionTerminated,
        Self::SignalExternalWorkflowExecutionInitiated,
        Self::SignalExternalWorkflowExecutionFailed,
        Self::ExternalWorkflowExecutionSignaled,
    ];

    /// Check if this event type closes the workflow run
    pub fn is_workflow_terminal(&self) -> bool {
        matches!(
            self,
            Self::WorkflowExecutionCompleted
                | Self::WorkflowExecutionFailed
                | Self::WorkflowExecutionTimedOut
                | Self::WorkflowExecutionCanceled
                | Self::WorkflowExecutionTerminated
                | Self::WorkflowExecutionContinuedAsNew
        )
    }

    /// Check if this event type resolves a scheduled activity
    pub fn is_activity_terminal(&self) -> bool {
        matches!(
            self,
            Self::ActivityTaskCompleted
                | Self::ActivityTaskFailed
                | Self::ActivityTaskTimedOut
                | Self::ActivityTaskCanceled
        )
    }

    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowExecutionStarted => "WorkflowExecutionStarted",
            Self::WorkflowExecutionCompleted => "WorkflowExecutionCompleted",
            Self::WorkflowExecutionFailed => "WorkflowExecutionFailed",
            Self::WorkflowExecutionTimedOut => "WorkflowExecutionTimedOut",
            Self::DecisionTaskScheduled => "DecisionTaskScheduled",
            Self::DecisionTaskStarted => "DecisionTaskStarted",
            Self::DecisionTaskCompleted => "DecisionTaskCompleted",
            Self::DecisionTaskTimedOut => "DecisionTaskTimedOut",
            Self::DecisionTaskFailed => "DecisionTaskFailed",
            Self::ActivityTaskScheduled => "ActivityTaskScheduled",
            Self::ActivityTaskStarted => "ActivityTaskStarted",
            Self::ActivityTaskCompleted => "ActivityTaskCompleted",
            Self::ActivityTaskFailed => "ActivityTaskFailed",
            Self::ActivityTaskTimedOut => "ActivityTaskTimedOut",
            Self::ActivityTaskCancelRequested => "ActivityTaskCancelRequested",
            Self::RequestCancelActivityTaskFailed => "RequestCancelActivityTaskFailed",
            Self::ActivityTaskCanceled => "ActivityTaskCanceled",
            Self::TimerStarted => "TimerStarted",
            Self::TimerFired => "TimerFired",
            Self::CancelTimerFailed => "CancelTimerFailed",
            Self::TimerCanceled => "TimerCanceled",
            Self::WorkflowExecutionCancelRequested => "WorkflowExecutionCancelRequested",
            Self::WorkflowExecutionCanceled => "WorkflowExecutionCanceled",
            Self::RequestCancelExternalWorkflowExecutionInitiated => {
                "RequestCancelExternalWorkflowExecutionInitiated"
            }
            Self::RequestCancelExternalWorkflowExecutionFailed => {
                "RequestCancelExternalWorkflowExecutionFailed"
            }
            Self::ExternalWorkflowExecutionCancelRequested => {
                "ExternalWorkflowExecutionCancelRequested"
            }
            Self::MarkerRecorded => "MarkerRecorded",
            Self::WorkflowExecutionSignaled => "WorkflowExecutionSignaled",
            Self::WorkflowExecutionTerminated => "WorkflowExecutionTerminated",
            Self::WorkflowExecutionContinuedAsNew => "WorkflowExecutionContinuedAsNew",
            Self::StartChildWorkflowExecutionInitiated => "StartChildWorkflowExecutionInitiated",
            Self::StartChildWorkflowExecutionFailed => "StartChildWorkflowExecutionFailed",
            Self::ChildWorkflowExecutionStarted => "ChildWorkflowExecutionStarted",
            Self::ChildWorkflowExecutionCompleted => "ChildWorkflowExecutionCompleted",
            Self::ChildWorkflowExecutionFailed => "ChildWorkflowExecutionFailed",
            Self::ChildWorkflowExecutionCanceled => "ChildWorkflowExecutionCanceled",
            Self::ChildWorkflowExecutionTimedOut => "ChildWorkflowExecutionTimedOut",
            Self::ChildWorkflowExecutionTerminated => "ChildWorkflowExecutionTerminated",
            Self::SignalExternalWorkflowExecutionInitiated => {
                "SignalExternalWorkflowExecutionInitiated"
            }
            Self::SignalExternalWorkflowExecutionFailed => "SignalExternalWorkflowExecutionFailed",
            Self::ExternalWorkflowExecutionSignaled => "ExternalWorkflowExecutionSignaled",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecutionStartedAttributes {
    pub workflow_type: WorkflowType,
    pub parent_workflow_domain: Option<String>,
    pub parent_workflow_execution: Option<WorkflowExecution>,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub execution_start_to_close_timeout_seconds: i32,
    pub task_start_to_close_timeout_seconds: i32,
    pub continued_execution_run_id: Option<String>,
    pub attempt: i32,
    pub cron_schedule: Option<String>,
    pub last_completion_result: Option<Vec<u8>>,
    pub identity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTaskScheduledAttributes {
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub domain: Option<String>,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub schedule_to_close_timeout_seconds: i32,
    pub schedule_to_start_timeout_seconds: i32,
    pub start_to_close_timeout_seconds: i32,
    pub heartbeat_timeout_seconds: i32,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChildWorkflowInitiatedAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalExternalInitiatedAttributes {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub signal_name: String,
    pub input: Option<Vec<u8>>,
    pub child_workflow_only: bool,
    pub decision_task_completed_event_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuedAsNewAttributes {
    pub new_execution_run_id: String,
    pub workflow_type: WorkflowType,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub decision_task_completed_event_id: i64,
}

/// Payload of a history event; one variant per event kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all_fields = "camelCase")]
pub enum EventAttributes {
    WorkflowExecutionStarted(WorkflowExecutionStartedAttributes),
    WorkflowExecutionCompleted {
        result: Option<Vec<u8>>,
        decision_task_completed_event_id: i64,
    },
    WorkflowExecutionFailed {
        reason: String,
        details: Option<Vec<u8>>,
        decision_task_completed_event_id: i64,
    },
    WorkflowExecutionTimedOut {
        timeout_type: TimeoutType,
    },
    DecisionTaskScheduled {
        task_list: TaskList,
        start_to_close_timeout_seconds: i32,
        attempt: i64,
    },
    DecisionTaskStarted {
        scheduled_event_id: i64,
        identity: String,
    },
    DecisionTaskCompleted {
        scheduled_event_id: i64,
        started_event_id: i64,
        identity: String,
    },
    DecisionTaskTimedOut {
        scheduled_event_id: i64,
        started_event_id: i64,
    },
    DecisionTaskFailed {
        scheduled_event_id: i64,
        started_event_id: i64,
        cause: DecisionTaskFailedCause,
        details: Option<Vec<u8>>,
    },
    ActivityTaskScheduled(ActivityTaskScheduledAttributes),
    ActivityTaskStarted {
        scheduled_event_id: i64,
        identity: String,
        attempt: i32,
    },
    ActivityTaskCompleted {
        scheduled_event_id: i64,
        started_event_id: i64,
        result: Option<Vec<u8>>,
    },
    ActivityTaskFailed {
        scheduled_event_id: i64,
        started_event_id: i64,
        reason: String,
        details: Option<Vec<u8>>,
    },
    ActivityTaskTimedOut {
        scheduled_event_id: i64,
        started_event_id: i64,
        timeout_type: TimeoutType,
        details: Option<Vec<u8>>,
    },
    ActivityTaskCancelRequested {
        activity_id: String,
        decision_task_completed_event_id: i64,
    },
    RequestCancelActivityTaskFailed {
        activity_id: String,
        cause: String,
    },
    ActivityTaskCanceled {
        scheduled_event_id: i64,
        started_event_id: i64,
        details: Option<Vec<u8>>,
    },
    TimerStarted {
        timer_id: String,
        start_to_fire_timeout_seconds: i64,
        decision_task_completed_event_id: i64,
    },
    TimerFired {
        timer_id: String,
        started_event_id: i64,
    },
    CancelTimerFailed {
        timer_id: String,
        cause: String,
    },
    TimerCanceled {
        timer_id: String,
        started_event_id: i64,
    },
    WorkflowExecutionCancelRequested {
        cause: Option<String>,
        identity: String,
    },
    WorkflowExecutionCanceled {
        details: Option<Vec<u8>>,
    },
    RequestCancelExternalWorkflowExecutionInitiated {
        domain: String,
        workflow_execution: WorkflowExecution,
        child_workflow_only: bool,
    },
    RequestCancelExternalWorkflowExecutionFailed {
        domain: String,
        workflow_execution: WorkflowExecution,
        cause: String,
        initiated_event_id: i64,
    },
    ExternalWorkflowExecutionCancelRequested {
        domain: String,
        workflow_execution: WorkflowExecution,
        initiated_event_id: i64,
    },
    MarkerRecorded {
        marker_name: String,
        details: Option<Vec<u8>>,
    },
    WorkflowExecutionSignaled {
        signal_name: String,
        input: Option<Vec<u8>>,
        identity: String,
    },
    WorkflowExecutionTerminated {
        reason: String,
        details: Option<Vec<u8>>,
        identity: String,
    },
    WorkflowExecutionContinuedAsNew(ContinuedAsNewAttributes),
    StartChildWorkflowExecutionInitiated(StartChildWorkflowInitiatedAttributes),
    StartChildWorkflowExecutionFailed {
        domain: String,
        workflow_id: String,
        workflow_type: WorkflowType,
        cause: String,
        initiated_event_id: i64,
    },
    ChildWorkflowExecutionStarted {
        domain: String,
        workflow_execution: WorkflowExecution,
        workflow_type: WorkflowType,
        initiated_event_id: i64,
    },
    ChildWorkflowExecutionCompleted {
        domain: String,
        workflow_execution: WorkflowExecution,
        result: Option<Vec<u8>>,
        initiated_event_id: i64,
    },
    ChildWorkflowExecutionFailed {
        domain: String,
        workflow_execution: WorkflowExecution,
        reason: String,
        details: Option<Vec<u8>>,
        initiated_event_id: i64,
    },
    ChildWorkflowExecutionCanceled {
        domain: String,
        workflow_execution: WorkflowExecution,
        details: Option<Vec<u8>>,
        initiated_event_id: i64,
    },
    ChildWorkflowExecutionTimedOut {
        domain: String,
        workflow_execution: WorkflowExecution,
        timeout_type: TimeoutType,
        initiated_event_id: i64,
    },
    ChildWorkflowExecutionTerminated {
        domain: String,
        workflow_execution: WorkflowExecution,
        initiated_event_id: i64,
    },
    SignalExternalWorkflowExecutionInitiated(SignalExternalInitiatedAttributes),
    SignalExternalWorkflowExecutionFailed {
        domain: String,
        workflow_execution: WorkflowExecution,
        cause: String,
        initiated_event_id: i64,
    },
    ExternalWorkflowExecutionSignaled {
        domain: String,
        workflow_execution: WorkflowExecution,
        initiated_event_id: i64,
    },
}

impl EventAttributes {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::WorkflowExecutionStarted(_) => EventType::WorkflowExecutionStarted,
            Self::WorkflowExecutionCompleted { .. } => EventType::WorkflowExecutionCompleted,
            Self::WorkflowExecutionFailed { .. } => EventType::WorkflowExecutionFailed,
            Self::WorkflowExecutionTimedOut { .. } => EventType::WorkflowExecutionTimedOut,
            Self::DecisionTaskScheduled { .. } => EventType::DecisionTaskScheduled,
            Self::DecisionTaskStarted { .. } => EventType::DecisionTaskStarted,
            Self::DecisionTaskCompleted { .. } => EventType::DecisionTaskCompleted,
            Self::DecisionTaskTimedOut { .. } => EventType::DecisionTaskTimedOut,
            Self::DecisionTaskFailed { .. } => EventType::DecisionTaskFailed,
            Self::ActivityTaskScheduled(_) => EventType::ActivityTaskScheduled,
            Self::ActivityTaskStarted { .. } => EventType::ActivityTaskStarted,
            Self::ActivityTaskCompleted { .. } => EventType::ActivityTaskCompleted,
            Self::ActivityTaskFailed { .. } => EventType::ActivityTaskFailed,
            Self::ActivityTaskTimedOut { .. } => EventType::ActivityTaskTimedOut,
            Self::ActivityTaskCancelRequested { .. } => EventType::ActivityTaskCancelRequested,
            Self::RequestCancelActivityTaskFailed { .. } => {
                EventType::RequestCancelActivityTaskFailed
            }
            Self::ActivityTaskCanceled { .. } => EventType::ActivityTaskCanceled,
            Self::TimerStarted { .. } => EventType::TimerStarted,
            Self::TimerFired { .. } => EventType::TimerFired,
            Self::CancelTimerFailed { .. } => EventType::CancelTimerFailed,
            Self::TimerCanceled { .. } => EventType::TimerCanceled,
            Self::WorkflowExecutionCancelRequested { .. } => {
                EventType::WorkflowExecutionCancelRequested
            }
            Self::WorkflowExecutionCanceled { .. } => EventType::WorkflowExecutionCanceled,
            Self::RequestCancelExternalWorkflowExecutionInitiated { .. } => {
                EventType::RequestCancelExternalWorkflowExecutionInitiated
            }
            Self::RequestCancelExternalWorkflowExecutionFailed { .. } => {
                EventType::RequestCancelExternalWorkflowExecutionFailed
            }
            Self::ExternalWorkflowExecutionCancelRequested { .. } => {
                EventType::ExternalWorkflowExecutionCancelRequested
            }
            Self::MarkerRecorded { .. } => EventType::MarkerRecorded,
            Self::WorkflowExecutionSignaled { .. } => EventType::WorkflowExecutionSignaled,
            Self::WorkflowExecutionTerminated { .. } => EventType::WorkflowExecutionTerminated,
            Self::WorkflowExecutionContinuedAsNew(_) => EventType::WorkflowExecutionContinuedAsNew,
            Self::StartChildWorkflowExecutionInitiated(_) => {
                EventType::StartChildWorkflowExecutionInitiated
            }
            Self::StartChildWorkflowExecutionFailed { .. } => {
                EventType::StartChildWorkflowExecutionFailed
            }
            Self::ChildWorkflowExecutionStarted { .. } => EventType::ChildWorkflowExecutionStarted,
            Self::ChildWorkflowExecutionCompleted { .. } => {
                EventType::ChildWorkflowExecutionCompleted
            }
            Self::ChildWorkflowExecutionFailed { .. } => EventType::ChildWorkflowExecutionFailed,
            Self::ChildWorkflowExecutionCanceled { .. } => {
                EventType::ChildWorkflowExecutionCanceled
            }
            Self::ChildWorkflowExecutionTimedOut { .. } => {
                EventType::ChildWorkflowExecutionTimedOut
            }
            Self::ChildWorkflowExecutionTerminated { .. } => {
                EventType::ChildWorkflowExecutionTerminated
            }
            Self::SignalExternalWorkflowExecutionInitiated(_) => {
                EventType::SignalExternalWorkflowExecutionInitiated
            }
            Self::SignalExternalWorkflowExecutionFailed { .. } => {
                EventType::SignalExternalWorkflowExecutionFailed
            }
            Self::ExternalWorkflowExecutionSignaled { .. } => {
                EventType::ExternalWorkflowExecutionSignaled
            }
        }
    }
}

/// One immutable entry of a workflow run's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    /// Sequence number within the run, starting at 1
    pub event_id: i64,
    /// Unix timestamp in nanoseconds
    pub timestamp: i64,
    #[serde(flatten)]
    pub attributes: EventAttributes,
}

impl HistoryEvent {
    /// Create an event without a timestamp
    pub fn new(event_id: i64, attributes: EventAttributes) -> Self {
        Self {
            event_id,
            timestamp: 0,
            attributes,
        }
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX);
        self
    }

    pub fn event_type(&self) -> EventType {
        self.attributes.event_type()
    }

    pub fn time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp)
    }

    /// Short human-readable form used in nondeterminism reports
    pub fn describe(&self) -> String {
        let kind = self.event_type();
        match &self.attributes {
            EventAttributes::ActivityTaskScheduled(attrs) => format!(
                "{}: (ActivityId: {}, ActivityType: {})",
                kind, attrs.activity_id, attrs.activity_type.name
            ),
            EventAttributes::ActivityTaskCancelRequested { activity_id, .. } => {
                format!("{}: (ActivityId: {})", kind, activity_id)
            }
            EventAttributes::TimerStarted { timer_id, .. }
            | EventAttributes::TimerCanceled { timer_id, .. }
            | EventAttributes::CancelTimerFailed { timer_id, .. } => {
                format!("{}: (TimerId: {})", kind, timer_id)
            }
            EventAttributes::MarkerRecorded { marker_name, .. } => {
                format!("{}: (MarkerName: {})", kind, marker_name)
            }
            EventAttributes::StartChildWorkflowExecutionInitiated(attrs) => format!(
                "{}: (WorkflowId: {}, WorkflowType: {})",
                kind, attrs.workflow_id, attrs.workflow_type.name
            ),
            EventAttributes::SignalExternalWorkflowExecutionInitiated(attrs) => format!(
                "{}: (WorkflowId: {}, SignalName: {})",
                kind, attrs.workflow_execution.workflow_id, attrs.signal_name
            ),
            _ => kind.to_string(),
        }
    }
}
