//! Activity functions and their execution context

pub mod context;
pub mod registry;

pub use context::{ActivityContext, ActivityInfo, ContextError};
pub use registry::{ActivityRegistry, BoxedActivityFn, RegisteredActivity};
