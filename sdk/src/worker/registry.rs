//! WorkflowRegistry - Registry for workflow programs

use crate::error::{CadenzaError, Result, WorkflowError};
use crate::workflow::context::WorkflowContext;
use cadenza_core::last_part_of_name;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a boxed workflow program
pub type WorkflowFuture =
    Pin<Box<dyn Future<Output = std::result::Result<Value, WorkflowError>> + Send>>;

/// Type alias for boxed workflow execution functions
pub type BoxedWorkflowFn = Box<dyn Fn(WorkflowContext, Value) -> WorkflowFuture + Send + Sync>;

/// A registered workflow program
pub struct RegisteredWorkflow {
    /// Workflow type name as registered
    pub name: String,
    execute_fn: BoxedWorkflowFn,
}

impl RegisteredWorkflow {
    pub fn new(name: impl Into<String>, execute_fn: BoxedWorkflowFn) -> Self {
        Self {
            name: name.into(),
            execute_fn,
        }
    }

    /// Build the program's future; nothing runs until it is polled
    pub fn start(&self, ctx: WorkflowContext, input: Value) -> WorkflowFuture {
        (self.execute_fn)(ctx, input)
    }
}

impl std::fmt::Debug for RegisteredWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredWorkflow")
            .field("name", &self.name)
            .field("execute_fn", &"<function>")
            .finish()
    }
}

/// Registry of workflow programs a worker can run.
///
/// Lookups ignore package qualifiers: a program registered as
/// `orders.Checkout` answers tasks for `new-orders.Checkout` as well.
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: RwLock<HashMap<String, Arc<RegisteredWorkflow>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow program under its name
    pub fn register_raw(&self, workflow: RegisteredWorkflow) -> Result<()> {
        let key = last_part_of_name(&workflow.name).to_string();
        let mut workflows = self.workflows.write();

        if workflows.contains_key(&key) {
            return Err(CadenzaError::InvalidConfiguration(format!(
                "Workflow '{}' is already registered. Each workflow type must be unique within a worker.",
                workflow.name
            )));
        }

        workflows.insert(key, Arc::new(workflow));
        Ok(())
    }

    /// Register a program with typed input and output.
    ///
    /// ```ignore
    /// registry.register("Checkout", |ctx: WorkflowContext, order: Order| async move {
    ///     let receipt = ctx.execute_activity("Charge", json!(order), options).await?;
    ///     Ok(receipt)
    /// })?;
    /// ```
    pub fn register<F, Fut, I, O>(&self, name: &str, workflow: F) -> Result<()>
    where
        F: Fn(WorkflowContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, WorkflowError>> + Send + 'static,
        I: DeserializeOwned + Send + 'static,
        O: Serialize + 'static,
    {
        let workflow = Arc::new(workflow);
        let execute_fn: BoxedWorkflowFn =
            Box::new(move |ctx: WorkflowContext, input: Value| -> WorkflowFuture {
                let workflow = Arc::clone(&workflow);
                Box::pin(async move {
                    let typed_input: I = serde_json::from_value(input)?;
                    let output = (*workflow)(ctx, typed_input).await?;
                    Ok::<Value, WorkflowError>(serde_json::to_value(output)?)
                })
            });

        self.register_raw(RegisteredWorkflow::new(name, execute_fn))
    }

    /// Register a program over raw JSON values
    pub fn register_simple<F, Fut>(&self, name: &str, workflow: F) -> Result<()>
    where
        F: Fn(WorkflowContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, WorkflowError>> + Send + 'static,
    {
        let execute_fn: BoxedWorkflowFn =
            Box::new(move |ctx: WorkflowContext, input: Value| -> WorkflowFuture {
                Box::pin(workflow(ctx, input))
            });
        self.register_raw(RegisteredWorkflow::new(name, execute_fn))
    }

    /// Look up a program by workflow type name
    pub fn get(&self, name: &str) -> Option<Arc<RegisteredWorkflow>> {
        self.workflows.read().get(last_part_of_name(name)).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.workflows.read().contains_key(last_part_of_name(name))
    }

    /// Names of all registered programs, sorted
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .workflows
            .read()
            .values()
            .map(|w| w.name.clone())
            .collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflows", &self.registered_names())
            .finish()
    }
}
