//! Workflow programs: the context they run against and the futures they await

pub mod context;
pub(crate) mod decisions;
pub(crate) mod execution;
pub mod future;

pub use context::{ActivityOptions, WorkflowContext, WorkflowInfo, STACK_TRACE_QUERY};
pub use future::{ActivityFuture, CancellableFuture, SignalChannel, SignalFuture, TimerFuture};
