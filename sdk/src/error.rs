//! Error types for the Cadenza SDK

// Re-export core error types
pub use cadenza_core::{CoreError, NondeterminismError, ServiceError};

use cadenza_core::decision::ContinueAsNewAttributes;
use cadenza_core::TimeoutType;

/// Fail-workflow reason for a typed panic returned by a workflow program
pub const PANIC_REASON: &str = "cadenzaInternal:Panic";

/// Fail-workflow reason for untyped workflow errors
pub const GENERIC_REASON: &str = "cadenzaInternal:Generic";

/// Activity-failure reason when no function is registered for the type
pub const ACTIVITY_NOT_REGISTERED_REASON: &str = "cadenzaInternal:ActivityNotRegistered";

/// Main error type for the Cadenza SDK
#[derive(Debug, thiserror::Error)]
pub enum CadenzaError {
    /// Replay diverged from recorded history under the blocking policy
    #[error("{0}")]
    Nondeterministic(#[from] NondeterminismError),

    /// The activity's deadline passed before it produced a result
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The activity function panicked
    #[error("activity panicked: {message}")]
    ActivityPanicked { message: String },

    /// History delivered with the task has a gap
    #[error("missing history events, expectedNextEventId={expected} but receivedNextEventId={received}")]
    MissingHistoryEvents { expected: i64, received: i64 },

    /// The task is malformed
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// Typed error from the orchestration service
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Cadenza SDK operations
pub type Result<T> = std::result::Result<T, CadenzaError>;

impl From<CoreError> for CadenzaError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Service(e) => CadenzaError::Service(e),
            CoreError::Serialization(e) => CadenzaError::Serialization(e),
            CoreError::MissingHistoryEvents { expected, received } => {
                CadenzaError::MissingHistoryEvents { expected, received }
            }
            CoreError::InvalidConfiguration(msg) => CadenzaError::InvalidConfiguration(msg),
            CoreError::Other(msg) => CadenzaError::Other(msg),
        }
    }
}

/// Errors a workflow program returns, or observes while awaiting activities,
/// timers and signals.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    /// Application failure; becomes a fail-workflow decision with this reason
    #[error("{reason}")]
    Application {
        reason: String,
        details: Option<Vec<u8>>,
    },

    /// A scheduled activity failed
    #[error("activity {activity_id} failed: {reason}")]
    ActivityFailed {
        activity_id: String,
        reason: String,
        details: Option<Vec<u8>>,
    },

    /// A scheduled activity timed out
    #[error("activity {activity_id} timed out: {timeout_type:?}")]
    ActivityTimedOut {
        activity_id: String,
        timeout_type: TimeoutType,
        details: Option<Vec<u8>>,
    },

    /// The operation, or the workflow itself, was canceled
    #[error("canceled")]
    Canceled { details: Option<Vec<u8>> },

    /// Typed panic: the program gave up and reports where
    #[error("panic: {message}")]
    Panic {
        message: String,
        stack_trace: String,
    },

    /// Close this run and start a new one
    #[error("continue as new: {}", .0.workflow_type.name)]
    ContinueAsNew(Box<ContinueAsNewAttributes>),

    /// A payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl WorkflowError {
    pub fn application(reason: impl Into<String>) -> Self {
        Self::Application {
            reason: reason.into(),
            details: None,
        }
    }

    pub fn panic(message: impl Into<String>, stack_trace: impl Into<String>) -> Self {
        Self::Panic {
            message: message.into(),
            stack_trace: stack_trace.into(),
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::Serialization(err.to_string())
    }
}

/// Errors an activity function returns
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActivityError {
    /// Application failure, reported to the service with this reason
    #[error("{reason}")]
    Application {
        reason: String,
        details: Option<Vec<u8>>,
    },

    /// The activity stopped because it was asked to
    #[error("canceled")]
    Canceled { details: Option<Vec<u8>> },

    /// The activity observed its deadline
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl ActivityError {
    pub fn application(reason: impl Into<String>) -> Self {
        Self::Application {
            reason: reason.into(),
            details: None,
        }
    }
}

impl From<serde_json::Error> for ActivityError {
    fn from(err: serde_json::Error) -> Self {
        ActivityError::Application {
            reason: GENERIC_REASON.to_string(),
            details: Some(err.to_string().into_bytes()),
        }
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_conversion() {
        let err: CadenzaError = CoreError::MissingHistoryEvents {
            expected: 3,
            received: 5,
        }
        .into();
        assert!(matches!(
            err,
            CadenzaError::MissingHistoryEvents {
                expected: 3,
                received: 5
            }
        ));

        let err: CadenzaError = CoreError::Service(ServiceError::Transport {
            message: "reset".to_string(),
        })
        .into();
        assert!(matches!(err, CadenzaError::Service(ServiceError::Transport { .. })));
    }

    #[test]
    fn test_deadline_exceeded_is_distinct() {
        let err = CadenzaError::DeadlineExceeded;
        assert_eq!(err.to_string(), "context deadline exceeded");
        assert!(!matches!(err, CadenzaError::Other(_)));
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("panicError")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "panicError");

        let payload = std::panic::catch_unwind(|| panic!("{}", 42)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "42");
    }

    #[test]
    fn test_workflow_error_helpers() {
        assert!(WorkflowError::Canceled { details: None }.is_canceled());
        let err = WorkflowError::panic("panicError", "stackTrace");
        assert_eq!(err.to_string(), "panic: panicError");
    }
}
