//! Execution context handed to activity functions

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::converter::DataConverter;
use crate::error::{ActivityError, Result};
use crate::worker::invoker::ServiceInvoker;
use cadenza_core::{ActivityTask, ActivityType, WorkflowExecution, WorkflowType};

/// Read-only facts about one activity invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInfo {
    pub task_token: Vec<u8>,
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub workflow_domain: String,
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub task_list: String,
    pub attempt: i32,
    pub heartbeat_timeout_seconds: i32,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl ActivityInfo {
    pub fn from_task(task_list: &str, task: &ActivityTask) -> Self {
        Self {
            task_token: task.task_token.clone(),
            workflow_execution: task.workflow_execution.clone(),
            workflow_type: task.workflow_type.clone(),
            workflow_domain: task.workflow_domain.clone(),
            activity_id: task.activity_id.clone(),
            activity_type: task.activity_type.clone(),
            task_list: task_list.to_string(),
            attempt: task.attempt,
            heartbeat_timeout_seconds: task.heartbeat_timeout_seconds,
            scheduled_at: task.scheduled_at(),
            started_at: task.started_at(),
            deadline: task.deadline(),
        }
    }
}

/// Why an activity context is done
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("context canceled")]
    Canceled,
}

impl From<ContextError> for ActivityError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::DeadlineExceeded => ActivityError::DeadlineExceeded,
            ContextError::Canceled => ActivityError::Canceled { details: None },
        }
    }
}

struct ActivityContextInner {
    info: ActivityInfo,
    deadline_at: Instant,
    cancel: CancellationToken,
    invoker: Arc<ServiceInvoker>,
    converter: Arc<dyn DataConverter>,
}

/// Handle an activity function uses to observe its deadline and cancellation
/// and to report heartbeats. Cheap to clone.
#[derive(Clone)]
pub struct ActivityContext {
    inner: Arc<ActivityContextInner>,
}

impl ActivityContext {
    pub(crate) fn new(
        info: ActivityInfo,
        cancel: CancellationToken,
        invoker: Arc<ServiceInvoker>,
        converter: Arc<dyn DataConverter>,
    ) -> Self {
        let remaining = (info.deadline - Utc::now()).to_std().unwrap_or_default();
        Self {
            inner: Arc::new(ActivityContextInner {
                deadline_at: Instant::now() + remaining,
                info,
                cancel,
                invoker,
                converter,
            }),
        }
    }

    pub fn info(&self) -> &ActivityInfo {
        &self.inner.info
    }

    /// Absolute deadline of this invocation
    pub fn deadline(&self) -> DateTime<Utc> {
        self.inner.info.deadline
    }

    pub(crate) fn deadline_instant(&self) -> Instant {
        self.inner.deadline_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Why the context is done, or `None` while it is still live
    pub fn err(&self) -> Option<ContextError> {
        if self.inner.cancel.is_cancelled() {
            Some(ContextError::Canceled)
        } else if Instant::now() >= self.inner.deadline_at {
            Some(ContextError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the deadline passes or the activity is canceled.
    ///
    /// ```ignore
    /// tokio::select! {
    ///     reply = client.call() => Ok(reply?),
    ///     err = ctx.done() => Err(err.into()),
    /// }
    /// ```
    pub async fn done(&self) -> ContextError {
        tokio::select! {
            _ = self.inner.cancel.cancelled() => ContextError::Canceled,
            _ = tokio::time::sleep_until(self.inner.deadline_at) => ContextError::DeadlineExceeded,
        }
    }

    /// Report progress; `details` are encoded with the worker's converter.
    ///
    /// A cancel request in the reply cancels this context.
    pub async fn heartbeat(&self, details: Option<Value>) -> Result<()> {
        let details = details
            .map(|value| self.inner.converter.to_data(&value))
            .transpose()?;
        self.inner.invoker.heartbeat(details).await?;
        Ok(())
    }
}

impl std::fmt::Debug for ActivityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityContext")
            .field("activity_id", &self.inner.info.activity_id)
            .field("deadline", &self.inner.info.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
