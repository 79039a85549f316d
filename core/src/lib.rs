//! # Cadenza Core
//!
//! Protocol-level building blocks for Cadenza workers.
//!
//! ## What's in Core vs SDK
//!
//! **Core** contains the parts that do not depend on an executor:
//! - History events and decisions, as exchanged with the service
//! - Decision and activity task types, request/response types
//! - Correspondence rules between decisions and history events
//! - Activity deadline math
//! - The service and history-iterator interfaces
//!
//! **SDK** contains the worker runtime:
//! - Workflow execution cache and decision task handler
//! - Workflow context and replay state machine
//! - Activity task handler and heartbeat invoker
//!
//! ## Modules
//!
//! - [`history`] - History events
//! - [`decision`] - Decisions
//! - [`task`] - Decision tasks, activity tasks, deadlines
//! - [`worker`] - Determinism rules
//! - [`client`] - Service interfaces and requests
//! - [`error`] - Core error types

pub mod client;
pub mod common;
pub mod decision;
pub mod error;
pub mod history;
pub mod task;
pub mod worker;

// Re-export error types
pub use error::{CoreError, CoreResult, NondeterminismError, ServiceError};

pub use common::{
    ActivityType, DecisionTaskFailedCause, TaskList, TimeoutType, WorkflowExecution, WorkflowType,
};

pub use decision::{Decision, DecisionType};

pub use history::{EventAttributes, EventType, HistoryEvent, HistoryPage};

pub use task::{activity_deadline, ActivityTask, WorkflowQuery, WorkflowTask};

pub use worker::{
    decision_matches_event, is_decision_event, last_part_of_name, match_replay_with_history,
    DeterminismValidator, MatchMode,
};

pub use client::{HistoryIterator, WorkflowService};
