//! Task handlers and the state they share

pub mod activity_handler;
pub mod cache;
pub(crate) mod history;
pub mod invoker;
pub mod registry;
pub mod workflow_handler;

pub use activity_handler::{ActivityTaskHandler, ActivityTaskResponse};
pub use cache::{CachedWorkflow, WorkflowCache};
pub use invoker::ServiceInvoker;
pub use registry::{BoxedWorkflowFn, RegisteredWorkflow, WorkflowFuture, WorkflowRegistry};
pub use workflow_handler::{WorkflowTaskHandler, WorkflowTaskResponse};
