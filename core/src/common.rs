//! Identifiers shared by history events, decisions and tasks

use serde::{Deserialize, Serialize};

/// Identity of one workflow run
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}

impl WorkflowExecution {
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }
}

/// Registered name of a workflow program
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowType {
    pub name: String,
}

impl WorkflowType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Registered name of an activity function, possibly package qualified
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityType {
    pub name: String,
}

impl ActivityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Named queue that tasks are dispatched through
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskList {
    pub name: String,
}

impl TaskList {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Which timeout budget expired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeoutType {
    #[default]
    StartToClose,
    ScheduleToStart,
    ScheduleToClose,
    Heartbeat,
}

/// Reason a worker gives when it cannot complete a decision task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionTaskFailedCause {
    UnhandledDecision,
    BadScheduleActivityAttributes,
    #[serde(rename = "RESET_STICKY_TASKLIST")]
    ResetStickyTaskList,
    WorkflowWorkerUnhandledFailure,
}

impl DecisionTaskFailedCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnhandledDecision => "UNHANDLED_DECISION",
            Self::BadScheduleActivityAttributes => "BAD_SCHEDULE_ACTIVITY_ATTRIBUTES",
            Self::ResetStickyTaskList => "RESET_STICKY_TASKLIST",
            Self::WorkflowWorkerUnhandledFailure => "WORKFLOW_WORKER_UNHANDLED_FAILURE",
        }
    }
}

impl std::fmt::Display for DecisionTaskFailedCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
