//! Decision tasks delivered to a workflow worker

use serde::{Deserialize, Serialize};

use crate::common::{WorkflowExecution, WorkflowType};
use crate::history::{EventType, HistoryEvent};

/// A point-in-time question asked of a workflow run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowQuery {
    pub query_type: String,
    pub query_args: Option<Vec<u8>>,
}

impl WorkflowQuery {
    pub fn new(query_type: impl Into<String>) -> Self {
        Self {
            query_type: query_type.into(),
            query_args: None,
        }
    }
}

/// One decision task: advance a run, or answer a query about it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTask {
    pub task_token: Vec<u8>,
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    /// Started event id of the last decision task the worker completed
    pub previous_started_event_id: i64,
    /// Started event id of this decision task
    pub started_event_id: i64,
    pub attempt: i64,
    pub history: Vec<HistoryEvent>,
    /// Empty when the whole window is in `history`
    pub next_page_token: Vec<u8>,
    pub query: Option<WorkflowQuery>,
}

impl WorkflowTask {
    pub fn new(
        workflow_execution: WorkflowExecution,
        workflow_type: impl Into<String>,
        history: Vec<HistoryEvent>,
    ) -> Self {
        Self {
            workflow_execution,
            workflow_type: WorkflowType::new(workflow_type),
            history,
            ..Default::default()
        }
    }

    pub fn with_task_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.task_token = token.into();
        self
    }

    pub fn with_previous_started_event_id(mut self, id: i64) -> Self {
        self.previous_started_event_id = id;
        self
    }

    pub fn with_started_event_id(mut self, id: i64) -> Self {
        self.started_event_id = id;
        self
    }

    pub fn with_next_page_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.next_page_token = token.into();
        self
    }

    pub fn with_query(mut self, query: WorkflowQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.workflow_execution.run_id
    }

    pub fn is_query(&self) -> bool {
        self.query.is_some()
    }

    /// Check if the delivered history starts at the beginning of the run
    pub fn has_full_history(&self) -> bool {
        self.history
            .first()
            .map(|e| e.event_type() == EventType::WorkflowExecutionStarted)
            .unwrap_or(false)
    }
}
