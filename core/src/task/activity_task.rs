//! Activity tasks delivered to an activity worker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::deadline::activity_deadline;
use crate::common::{ActivityType, WorkflowExecution, WorkflowType};

/// One activity invocation handed to the worker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTask {
    pub task_token: Vec<u8>,
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub workflow_domain: String,
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub input: Option<Vec<u8>>,
    /// Unix nanos
    pub scheduled_timestamp: i64,
    pub schedule_to_close_timeout_seconds: i32,
    /// Unix nanos
    pub started_timestamp: i64,
    pub start_to_close_timeout_seconds: i32,
    pub heartbeat_timeout_seconds: i32,
    pub attempt: i32,
}

impl ActivityTask {
    pub fn new(activity_id: impl Into<String>, activity_type: impl Into<String>) -> Self {
        Self {
            activity_id: activity_id.into(),
            activity_type: ActivityType::new(activity_type),
            ..Default::default()
        }
    }

    pub fn with_task_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.task_token = token.into();
        self
    }

    pub fn with_workflow(
        mut self,
        domain: impl Into<String>,
        execution: WorkflowExecution,
        workflow_type: impl Into<String>,
    ) -> Self {
        self.workflow_domain = domain.into();
        self.workflow_execution = execution;
        self.workflow_type = WorkflowType::new(workflow_type);
        self
    }

    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Set when the activity was scheduled and its schedule-to-close budget
    pub fn with_schedule(mut self, scheduled_at: DateTime<Utc>, schedule_to_close_seconds: i32) -> Self {
        self.scheduled_timestamp = scheduled_at.timestamp_nanos_opt().unwrap_or(i64::MAX);
        self.schedule_to_close_timeout_seconds = schedule_to_close_seconds;
        self
    }

    /// Set when the activity was started and its start-to-close budget
    pub fn with_start(mut self, started_at: DateTime<Utc>, start_to_close_seconds: i32) -> Self {
        self.started_timestamp = started_at.timestamp_nanos_opt().unwrap_or(i64::MAX);
        self.start_to_close_timeout_seconds = start_to_close_seconds;
        self
    }

    pub fn with_heartbeat_timeout_seconds(mut self, seconds: i32) -> Self {
        self.heartbeat_timeout_seconds = seconds;
        self
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.scheduled_timestamp)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.started_timestamp)
    }

    /// Absolute deadline of this invocation, computed fresh on every call
    pub fn deadline(&self) -> DateTime<Utc> {
        activity_deadline(
            self.scheduled_at(),
            self.schedule_to_close_timeout_seconds,
            self.started_at(),
            self.start_to_close_timeout_seconds,
        )
    }
}
