//! Activity task execution under deadline, cancellation and heartbeats

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use cadenza_core::client::{
    RespondActivityTaskCanceledRequest, RespondActivityTaskCompletedRequest,
    RespondActivityTaskFailedRequest,
};
use cadenza_core::{ActivityTask, WorkflowService};

use super::invoker::ServiceInvoker;
use crate::activity::{ActivityContext, ActivityInfo, ActivityRegistry};
use crate::config::WorkerOptions;
use crate::error::{
    panic_message, ActivityError, CadenzaError, Result, ACTIVITY_NOT_REGISTERED_REASON,
    GENERIC_REASON,
};

/// What the worker reports for one activity invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityTaskResponse {
    Completed(RespondActivityTaskCompletedRequest),
    Failed(RespondActivityTaskFailedRequest),
    Canceled(RespondActivityTaskCanceledRequest),
}

impl ActivityTaskResponse {
    /// Deliver the response to the service
    pub async fn send(self, service: &dyn WorkflowService) -> Result<()> {
        match self {
            Self::Completed(request) => service.respond_activity_task_completed(request).await?,
            Self::Failed(request) => service.respond_activity_task_failed(request).await?,
            Self::Canceled(request) => service.respond_activity_task_canceled(request).await?,
        }
        Ok(())
    }
}

/// Runs activity functions for activity tasks
pub struct ActivityTaskHandler {
    options: WorkerOptions,
    registry: Arc<ActivityRegistry>,
    service: Arc<dyn WorkflowService>,
}

impl std::fmt::Debug for ActivityTaskHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityTaskHandler")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .finish()
    }
}

impl ActivityTaskHandler {
    pub fn new(
        options: WorkerOptions,
        registry: Arc<ActivityRegistry>,
        service: Arc<dyn WorkflowService>,
    ) -> Self {
        Self {
            options,
            registry,
            service,
        }
    }

    /// Run the task's activity function and build the response to report.
    ///
    /// Fails with [`CadenzaError::DeadlineExceeded`] when the deadline passes
    /// first, including when it passed before the call, and with
    /// [`CadenzaError::ActivityPanicked`] when the function panics.
    #[instrument(
        skip_all,
        fields(
            activity_id = %task.activity_id,
            activity_type = %task.activity_type.name,
            workflow_id = %task.workflow_execution.workflow_id,
            task_list = %task_list
        )
    )]
    pub async fn execute(&self, task_list: &str, task: ActivityTask) -> Result<ActivityTaskResponse> {
        let Some(activity) = self.registry.get(&task.activity_type.name) else {
            warn!("Activity type is not registered");
            let details = format!(
                "unable to find activityType={}. Supported types: [{}]",
                task.activity_type.name,
                self.registry.registered_names().join(", ")
            );
            return Ok(self.failed(&task, ACTIVITY_NOT_REGISTERED_REASON, Some(details.into_bytes())));
        };

        let info = ActivityInfo::from_task(task_list, &task);
        if info.deadline <= Utc::now() {
            warn!(deadline = %info.deadline, "Activity deadline already passed");
            return Err(CadenzaError::DeadlineExceeded);
        }

        let cancel = CancellationToken::new();
        let heartbeat_timeout =
            Duration::from_secs(u64::try_from(task.heartbeat_timeout_seconds).unwrap_or_default());
        let heartbeat_interval = if heartbeat_timeout.is_zero() {
            None
        } else {
            self.options
                .activity
                .effective_heartbeat_interval(heartbeat_timeout)
        };
        let handler_token = cancel.clone();
        let invoker = Arc::new(ServiceInvoker::new(
            task.task_token.clone(),
            self.options.identity.clone(),
            Arc::clone(&self.service),
            move || handler_token.cancel(),
            heartbeat_interval.unwrap_or_default(),
        ));
        let ctx = ActivityContext::new(
            info,
            cancel.clone(),
            Arc::clone(&invoker),
            Arc::clone(&self.options.data_converter),
        );

        let input = match self
            .options
            .data_converter
            .from_optional(task.input.as_deref())
        {
            Ok(input) => input,
            Err(err) => {
                warn!(error = %err, "Failed to decode activity input");
                return Ok(self.failed(&task, GENERIC_REASON, Some(err.to_string().into_bytes())));
            }
        };

        let stop_heartbeats = CancellationToken::new();
        if heartbeat_interval.is_some() {
            tokio::spawn(Arc::clone(&invoker).run(stop_heartbeats.clone()));
        }

        let deadline_at = ctx.deadline_instant();
        let handle = tokio::spawn(activity.execute(ctx, input));
        let abort = handle.abort_handle();
        let outcome = tokio::time::timeout_at(deadline_at, handle).await;
        stop_heartbeats.cancel();

        let result = match outcome {
            Err(_elapsed) => {
                cancel.cancel();
                abort.abort();
                warn!("Activity deadline exceeded");
                return Err(CadenzaError::DeadlineExceeded);
            }
            Ok(Err(join_err)) if join_err.is_panic() => {
                let message = panic_message(join_err.into_panic().as_ref());
                error!(panic = %message, "Activity function panicked");
                return Err(CadenzaError::ActivityPanicked { message });
            }
            Ok(Err(join_err)) => {
                return Err(CadenzaError::Other(format!("activity task aborted: {join_err}")));
            }
            Ok(Ok(result)) => result,
        };

        let response = match result {
            Ok(value) => {
                let result = if value.is_null() {
                    None
                } else {
                    Some(self.options.data_converter.to_data(&value)?)
                };
                ActivityTaskResponse::Completed(RespondActivityTaskCompletedRequest {
                    task_token: task.task_token,
                    result,
                    identity: self.options.identity.clone(),
                })
            }
            Err(ActivityError::Application { reason, details }) => {
                self.failed(&task, &reason, details)
            }
            Err(ActivityError::Canceled { details }) => {
                ActivityTaskResponse::Canceled(RespondActivityTaskCanceledRequest {
                    task_token: task.task_token,
                    details,
                    identity: self.options.identity.clone(),
                })
            }
            Err(ActivityError::DeadlineExceeded) => {
                warn!("Activity returned after its deadline");
                return Err(CadenzaError::DeadlineExceeded);
            }
        };

        debug!("Activity task processed");
        Ok(response)
    }

    fn failed(
        &self,
        task: &ActivityTask,
        reason: &str,
        details: Option<Vec<u8>>,
    ) -> ActivityTaskResponse {
        ActivityTaskResponse::Failed(RespondActivityTaskFailedRequest {
            task_token: task.task_token.clone(),
            reason: reason.to_string(),
            details,
            identity: self.options.identity.clone(),
        })
    }
}
