//! Service-facing interfaces of a worker.
//!
//! The transport is not part of this crate. Workers are handed an
//! implementation of [`WorkflowService`] and, for paged histories, a
//! [`HistoryIterator`].

mod requests;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::history::HistoryPage;

pub use requests::{
    QueryTaskResult, RecordActivityTaskHeartbeatRequest, RecordActivityTaskHeartbeatResponse,
    RespondActivityTaskCanceledRequest, RespondActivityTaskCompletedRequest,
    RespondActivityTaskFailedRequest, RespondDecisionTaskCompletedRequest,
    RespondDecisionTaskFailedRequest, RespondQueryTaskCompletedRequest, StickyExecutionAttributes,
};

/// Calls a worker makes against the orchestration service
#[async_trait]
pub trait WorkflowService: Send + Sync {
    async fn record_activity_task_heartbeat(
        &self,
        request: RecordActivityTaskHeartbeatRequest,
    ) -> Result<RecordActivityTaskHeartbeatResponse, ServiceError>;

    async fn respond_decision_task_completed(
        &self,
        request: RespondDecisionTaskCompletedRequest,
    ) -> Result<(), ServiceError>;

    async fn respond_decision_task_failed(
        &self,
        request: RespondDecisionTaskFailedRequest,
    ) -> Result<(), ServiceError>;

    async fn respond_query_task_completed(
        &self,
        request: RespondQueryTaskCompletedRequest,
    ) -> Result<(), ServiceError>;

    async fn respond_activity_task_completed(
        &self,
        request: RespondActivityTaskCompletedRequest,
    ) -> Result<(), ServiceError>;

    async fn respond_activity_task_failed(
        &self,
        request: RespondActivityTaskFailedRequest,
    ) -> Result<(), ServiceError>;

    async fn respond_activity_task_canceled(
        &self,
        request: RespondActivityTaskCanceledRequest,
    ) -> Result<(), ServiceError>;
}

/// Lazily fetches the remaining history pages of one decision task.
///
/// Finite per task; a fresh iterator is needed to start over.
#[async_trait]
pub trait HistoryIterator: Send {
    async fn next_page(&mut self, page_token: &[u8]) -> Result<HistoryPage, ServiceError>;
}
