//! Task module - decision tasks, activity tasks and deadline math

pub mod activity_task;
pub mod deadline;
pub mod workflow_task;

pub use activity_task::ActivityTask;
pub use deadline::activity_deadline;
pub use workflow_task::{WorkflowQuery, WorkflowTask};
