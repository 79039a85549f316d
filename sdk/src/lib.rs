//! Cadenza SDK for Rust
//!
//! The worker-side execution core for Cadenza workflows. It turns decision
//! tasks into decisions by replaying workflow programs against recorded
//! history, keeps runs cached between tasks for sticky execution, answers
//! queries, and runs activity functions under their deadlines while
//! heartbeating the service.
//!
//! Polling and transport live outside this crate: callers hand tasks to
//! [`WorkflowTaskHandler`] and [`ActivityTaskHandler`] and deliver the
//! returned responses through a [`cadenza_core::WorkflowService`].

#![allow(clippy::result_large_err)]

pub mod activity;
pub mod config;
pub mod converter;
pub mod error;
pub mod worker;
pub mod workflow;

// Re-export commonly used types
pub use error::{ActivityError, CadenzaError, Result, WorkflowError};

pub use config::{
    ActivityTaskHandlerConfig, ConfigError, NonDeterministicWorkflowPolicy, WorkerOptions,
    WorkflowTaskHandlerConfig,
};
pub use converter::{DataConverter, JsonDataConverter};

pub use activity::{ActivityContext, ActivityInfo, ActivityRegistry, ContextError};

pub use worker::{
    ActivityTaskHandler, ActivityTaskResponse, ServiceInvoker, WorkflowCache, WorkflowRegistry,
    WorkflowTaskHandler, WorkflowTaskResponse,
};

pub use workflow::{
    ActivityFuture, ActivityOptions, CancellableFuture, SignalChannel, TimerFuture,
    WorkflowContext, WorkflowInfo,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::activity::{ActivityContext, ActivityInfo, ActivityRegistry, ContextError};
    pub use crate::config::{
        ActivityTaskHandlerConfig, NonDeterministicWorkflowPolicy, WorkerOptions,
        WorkflowTaskHandlerConfig,
    };
    pub use crate::converter::{DataConverter, JsonDataConverter};
    pub use crate::error::{ActivityError, CadenzaError, Result, WorkflowError};
    pub use crate::worker::{
        ActivityTaskHandler, ActivityTaskResponse, WorkflowCache, WorkflowRegistry,
        WorkflowTaskHandler, WorkflowTaskResponse,
    };
    pub use crate::workflow::{
        ActivityOptions, CancellableFuture, SignalChannel, WorkflowContext, WorkflowInfo,
    };
    pub use cadenza_core::{ActivityTask, HistoryEvent, WorkflowExecution, WorkflowTask};
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{json, Value};
}
