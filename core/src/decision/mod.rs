//! Decisions a worker sends back when it completes a decision task

use serde::{Deserialize, Serialize};

use crate::common::{ActivityType, TaskList, WorkflowExecution, WorkflowType};

/// Every decision kind of the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    ScheduleActivityTask,
    RequestCancelActivityTask,
    StartTimer,
    CompleteWorkflowExecution,
    FailWorkflowExecution,
    CancelTimer,
    CancelWorkflowExecution,
    RequestCancelExternalWorkflowExecution,
    RecordMarker,
    ContinueAsNewWorkflowExecution,
    StartChildWorkflowExecution,
    SignalExternalWorkflowExecution,
}

impl DecisionType {
    /// All decision kinds, in protocol order
    pub const ALL: [DecisionType; 12] = [
        Self::ScheduleActivityTask,
        Self::RequestCancelActivityTask,
        Self::StartTimer,
        Self::CompleteWorkflowExecution,
        Self::FailWorkflowExecution,
        Self::CancelTimer,
        Self::CancelWorkflowExecution,
        Self::RequestCancelExternalWorkflowExecution,
        Self::RecordMarker,
        Self::ContinueAsNewWorkflowExecution,
        Self::StartChildWorkflowExecution,
        Self::SignalExternalWorkflowExecution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScheduleActivityTask => "ScheduleActivityTask",
            Self::RequestCancelActivityTask => "RequestCancelActivityTask",
            Self::StartTimer => "StartTimer",
            Self::CompleteWorkflowExecution => "CompleteWorkflowExecution",
            Self::FailWorkflowExecution => "FailWorkflowExecution",
            Self::CancelTimer => "CancelTimer",
            Self::CancelWorkflowExecution => "CancelWorkflowExecution",
            Self::RequestCancelExternalWorkflowExecution => "RequestCancelExternalWorkflowExecution",
            Self::RecordMarker => "RecordMarker",
            Self::ContinueAsNewWorkflowExecution => "ContinueAsNewWorkflowExecution",
            Self::StartChildWorkflowExecution => "StartChildWorkflowExecution",
            Self::SignalExternalWorkflowExecution => "SignalExternalWorkflowExecution",
        }
    }

    /// Check if this decision closes the workflow run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CompleteWorkflowExecution
                | Self::FailWorkflowExecution
                | Self::CancelWorkflowExecution
                | Self::ContinueAsNewWorkflowExecution
        )
    }
}

impl std::fmt::Display for DecisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleActivityTaskAttributes {
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub domain: Option<String>,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub schedule_to_close_timeout_seconds: i32,
    pub schedule_to_start_timeout_seconds: i32,
    pub start_to_close_timeout_seconds: i32,
    pub heartbeat_timeout_seconds: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCancelExternalWorkflowAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub run_id: Option<String>,
    pub child_workflow_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueAsNewAttributes {
    pub workflow_type: WorkflowType,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub execution_start_to_close_timeout_seconds: i32,
    pub task_start_to_close_timeout_seconds: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChildWorkflowAttributes {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub execution_start_to_close_timeout_seconds: i32,
    pub task_start_to_close_timeout_seconds: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalExternalWorkflowAttributes {
    pub domain: String,
    pub execution: WorkflowExecution,
    pub signal_name: String,
    pub input: Option<Vec<u8>>,
    pub child_workflow_only: bool,
}

/// One intent produced while advancing a workflow program.
///
/// Decisions are ordered within a task; a terminal decision may only be the
/// last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decisionType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    ScheduleActivityTask(ScheduleActivityTaskAttributes),
    #[serde(rename_all = "camelCase")]
    RequestCancelActivityTask { activity_id: String },
    #[serde(rename_all = "camelCase")]
    StartTimer {
        timer_id: String,
        start_to_fire_timeout_seconds: i64,
    },
    CompleteWorkflowExecution { result: Option<Vec<u8>> },
    FailWorkflowExecution {
        reason: String,
        details: Option<Vec<u8>>,
    },
    #[serde(rename_all = "camelCase")]
    CancelTimer { timer_id: String },
    CancelWorkflowExecution { details: Option<Vec<u8>> },
    RequestCancelExternalWorkflowExecution(RequestCancelExternalWorkflowAttributes),
    #[serde(rename_all = "camelCase")]
    RecordMarker {
        marker_name: String,
        details: Option<Vec<u8>>,
    },
    ContinueAsNewWorkflowExecution(ContinueAsNewAttributes),
    StartChildWorkflowExecution(StartChildWorkflowAttributes),
    SignalExternalWorkflowExecution(SignalExternalWorkflowAttributes),
}

impl Decision {
    pub fn decision_type(&self) -> DecisionType {
        match self {
            Self::ScheduleActivityTask(_) => DecisionType::ScheduleActivityTask,
            Self::RequestCancelActivityTask { .. } => DecisionType::RequestCancelActivityTask,
            Self::StartTimer { .. } => DecisionType::StartTimer,
            Self::CompleteWorkflowExecution { .. } => DecisionType::CompleteWorkflowExecution,
            Self::FailWorkflowExecution { .. } => DecisionType::FailWorkflowExecution,
            Self::CancelTimer { .. } => DecisionType::CancelTimer,
            Self::CancelWorkflowExecution { .. } => DecisionType::CancelWorkflowExecution,
            Self::RequestCancelExternalWorkflowExecution(_) => {
                DecisionType::RequestCancelExternalWorkflowExecution
            }
            Self::RecordMarker { .. } => DecisionType::RecordMarker,
            Self::ContinueAsNewWorkflowExecution(_) => DecisionType::ContinueAsNewWorkflowExecution,
            Self::StartChildWorkflowExecution(_) => DecisionType::StartChildWorkflowExecution,
            Self::SignalExternalWorkflowExecution(_) => {
                DecisionType::SignalExternalWorkflowExecution
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.decision_type().is_terminal()
    }

    /// Short human-readable form used in nondeterminism reports
    pub fn describe(&self) -> String {
        let kind = self.decision_type();
        match self {
            Self::ScheduleActivityTask(attrs) => format!(
                "{}: (ActivityId: {}, ActivityType: {})",
                kind, attrs.activity_id, attrs.activity_type.name
            ),
            Self::RequestCancelActivityTask { activity_id } => {
                format!("{}: (ActivityId: {})", kind, activity_id)
            }
            Self::StartTimer { timer_id, .. } | Self::CancelTimer { timer_id } => {
                format!("{}: (TimerId: {})", kind, timer_id)
            }
            Self::FailWorkflowExecution { reason, .. } => {
                format!("{}: (Reason: {})", kind, reason)
            }
            Self::RecordMarker { marker_name, .. } => {
                format!("{}: (MarkerName: {})", kind, marker_name)
            }
            Self::StartChildWorkflowExecution(attrs) => format!(
                "{}: (WorkflowId: {}, WorkflowType: {})",
                kind, attrs.workflow_id, attrs.workflow_type.name
            ),
            Self::SignalExternalWorkflowExecution(attrs) => format!(
                "{}: (WorkflowId: {}, SignalName: {})",
                kind, attrs.execution.workflow_id, attrs.signal_name
            ),
            Self::RequestCancelExternalWorkflowExecution(attrs) => {
                format!("{}: (WorkflowId: {})", kind, attrs.workflow_id)
            }
            _ => kind.to_string(),
        }
    }
}
