//! Core error types for Cadenza workers
//!
//! These errors are shared by every layer that speaks the protocol. The SDK
//! wraps them in its own error type.

use crate::decision::Decision;
use crate::history::HistoryEvent;

/// Core error type for protocol-level operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Typed error returned by the orchestration service
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// History delivered to the worker has a gap
    #[error("missing history events, expectedNextEventId={expected} but receivedNextEventId={received}")]
    MissingHistoryEvents { expected: i64, received: i64 },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Typed errors returned by the orchestration service.
///
/// Callers match on the variant: a heartbeat that hits `DomainNotActive`
/// implies cancellation, `EntityNotExists` does not.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The activity, workflow run, or task token is unknown to the service
    #[error("entity not exists: {message}")]
    EntityNotExists { message: String },

    /// The domain is not active in this cluster
    #[error("domain {domain} is not active: {message}")]
    DomainNotActive { domain: String, message: String },

    /// The request was rejected as malformed
    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// The service failed while handling the request
    #[error("internal service error: {message}")]
    Internal { message: String },

    /// The request never reached the service
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl ServiceError {
    /// Whether this error tells the worker to stop the work it is doing
    pub fn implies_cancellation(&self) -> bool {
        matches!(self, Self::DomainNotActive { .. })
    }
}

/// Divergence between a replayed workflow and its recorded history.
///
/// The `Display` form always starts with `nondeterministic workflow:` so the
/// condition is recognizable in reports.
#[derive(Debug, Clone, PartialEq)]
pub enum NondeterminismError {
    /// History recorded a decision event that replay did not produce
    MissingReplayDecision { event: Box<HistoryEvent> },

    /// Replay produced a decision that history never recorded
    ExtraReplayDecision { decision: Box<Decision> },

    /// Replay produced a different decision than the recorded one
    Mismatch {
        event: Box<HistoryEvent>,
        decision: Box<Decision>,
    },

    /// History references a decision the replayed program never made
    UnknownDecision { kind: &'static str, id: String },
}

impl std::fmt::Display for NondeterminismError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingReplayDecision { event } => {
                write!(
                    f,
                    "nondeterministic workflow: missing replay decision for {}",
                    event.describe()
                )
            }
            Self::ExtraReplayDecision { decision } => {
                write!(
                    f,
                    "nondeterministic workflow: extra replay decision for {}",
                    decision.describe()
                )
            }
            Self::Mismatch { event, decision } => {
                write!(
                    f,
                    "nondeterministic workflow: history event is {}, replay decision is {}",
                    event.describe(),
                    decision.describe()
                )
            }
            Self::UnknownDecision { kind, id } => {
                write!(
                    f,
                    "nondeterministic workflow: history references unknown {} decision '{}'",
                    kind, id
                )
            }
        }
    }
}

impl std::error::Error for NondeterminismError {}
