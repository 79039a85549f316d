//! ActivityRegistry - Registry for activity functions

use crate::activity::context::ActivityContext;
use crate::error::{ActivityError, CadenzaError, Result};
use cadenza_core::last_part_of_name;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a boxed activity function
pub type BoxedActivityFuture =
    Pin<Box<dyn Future<Output = std::result::Result<Value, ActivityError>> + Send>>;

/// Type alias for boxed activity functions
pub type BoxedActivityFn = Box<dyn Fn(ActivityContext, Value) -> BoxedActivityFuture + Send + Sync>;

/// A registered activity function
pub struct RegisteredActivity {
    /// Activity type name as registered
    pub name: String,
    execute_fn: BoxedActivityFn,
}

impl RegisteredActivity {
    pub fn new(name: impl Into<String>, execute_fn: BoxedActivityFn) -> Self {
        Self {
            name: name.into(),
            execute_fn,
        }
    }

    pub fn execute(&self, ctx: ActivityContext, input: Value) -> BoxedActivityFuture {
        (self.execute_fn)(ctx, input)
    }
}

impl std::fmt::Debug for RegisteredActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredActivity")
            .field("name", &self.name)
            .field("execute_fn", &"<function>")
            .finish()
    }
}

/// Registry of activity functions, looked up by unqualified type name
#[derive(Default)]
pub struct ActivityRegistry {
    activities: RwLock<HashMap<String, Arc<RegisteredActivity>>>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_raw(&self, activity: RegisteredActivity) -> Result<()> {
        let key = last_part_of_name(&activity.name).to_string();
        let mut activities = self.activities.write();

        if activities.contains_key(&key) {
            return Err(CadenzaError::InvalidConfiguration(format!(
                "Activity '{}' is already registered",
                activity.name
            )));
        }

        activities.insert(key, Arc::new(activity));
        Ok(())
    }

    /// Register a function with typed input and output
    pub fn register<F, Fut, I, O>(&self, name: &str, activity: F) -> Result<()>
    where
        F: Fn(ActivityContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, ActivityError>> + Send + 'static,
        I: DeserializeOwned + Send + 'static,
        O: Serialize + 'static,
    {
        let activity = Arc::new(activity);
        let execute_fn: BoxedActivityFn =
            Box::new(move |ctx: ActivityContext, input: Value| -> BoxedActivityFuture {
                let activity = Arc::clone(&activity);
                Box::pin(async move {
                    let typed_input: I = serde_json::from_value(input)?;
                    let output = (*activity)(ctx, typed_input).await?;
                    Ok::<Value, ActivityError>(serde_json::to_value(output)?)
                })
            });

        self.register_raw(RegisteredActivity::new(name, execute_fn))
    }

    /// Register a function over raw JSON values
    pub fn register_simple<F, Fut>(&self, name: &str, activity: F) -> Result<()>
    where
        F: Fn(ActivityContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, ActivityError>> + Send + 'static,
    {
        let execute_fn: BoxedActivityFn =
            Box::new(move |ctx: ActivityContext, input: Value| -> BoxedActivityFuture {
                Box::pin(activity(ctx, input))
            });
        self.register_raw(RegisteredActivity::new(name, execute_fn))
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegisteredActivity>> {
        self.activities.read().get(last_part_of_name(name)).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.activities.read().contains_key(last_part_of_name(name))
    }

    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .activities
            .read()
            .values()
            .map(|a| a.name.clone())
            .collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityRegistry")
            .field("activities", &self.registered_names())
            .finish()
    }
}
