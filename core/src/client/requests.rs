//! Requests a worker sends to the orchestration service

use serde::{Deserialize, Serialize};

use crate::common::{DecisionTaskFailedCause, TaskList};
use crate::decision::Decision;

/// Tells the service to route the run's next decision tasks to this worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyExecutionAttributes {
    pub worker_task_list: TaskList,
    pub schedule_to_start_timeout_seconds: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondDecisionTaskCompletedRequest {
    pub task_token: Vec<u8>,
    pub decisions: Vec<Decision>,
    pub identity: String,
    pub sticky_attributes: Option<StickyExecutionAttributes>,
}

impl RespondDecisionTaskCompletedRequest {
    /// The decision that closes the run, if this response carries one
    pub fn terminal_decision(&self) -> Option<&Decision> {
        self.decisions.last().filter(|d| d.is_terminal())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondDecisionTaskFailedRequest {
    pub task_token: Vec<u8>,
    pub cause: DecisionTaskFailedCause,
    pub details: Option<Vec<u8>>,
    pub identity: String,
}

/// Either the encoded answer or the reason there is none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryTaskResult {
    Answered(Vec<u8>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondQueryTaskCompletedRequest {
    pub task_token: Vec<u8>,
    pub result: QueryTaskResult,
}

impl RespondQueryTaskCompletedRequest {
    pub fn query_result(&self) -> Option<&[u8]> {
        match &self.result {
            QueryTaskResult::Answered(bytes) => Some(bytes),
            QueryTaskResult::Failed(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.result {
            QueryTaskResult::Answered(_) => None,
            QueryTaskResult::Failed(message) => Some(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordActivityTaskHeartbeatRequest {
    pub task_token: Vec<u8>,
    pub details: Option<Vec<u8>>,
    pub identity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordActivityTaskHeartbeatResponse {
    pub cancel_requested: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondActivityTaskCompletedRequest {
    pub task_token: Vec<u8>,
    pub result: Option<Vec<u8>>,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondActivityTaskFailedRequest {
    pub task_token: Vec<u8>,
    pub reason: String,
    pub details: Option<Vec<u8>>,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondActivityTaskCanceledRequest {
    pub task_token: Vec<u8>,
    pub details: Option<Vec<u8>>,
    pub identity: String,
}
