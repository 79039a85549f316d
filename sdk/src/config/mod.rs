//! Configuration presets for Cadenza workers
//!
//! This module provides configuration for decision task and activity task
//! handling, with sensible defaults and presets for common use cases.

use std::sync::Arc;
use std::time::Duration;

use cadenza_core::MatchMode;

use crate::converter::{DataConverter, JsonDataConverter};

/// What to do when replay diverges from recorded history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NonDeterministicWorkflowPolicy {
    /// Report an error for the task and leave the run stuck until fixed code is deployed
    #[default]
    BlockWorkflow,
    /// Close the run with a fail-workflow decision
    FailWorkflow,
}

impl NonDeterministicWorkflowPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockWorkflow => "NonDeterministicWorkflowPolicyBlockWorkflow",
            Self::FailWorkflow => "NonDeterministicWorkflowPolicyFailWorkflow",
        }
    }
}

impl std::fmt::Display for NonDeterministicWorkflowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for decision task handling
#[derive(Debug, Clone)]
pub struct WorkflowTaskHandlerConfig {
    pub non_deterministic_policy: NonDeterministicWorkflowPolicy,
    /// Capacity of the workflow execution cache
    pub max_cached_workflows: usize,
    /// How long the service waits for this worker's sticky task list
    pub sticky_schedule_to_start_timeout: Duration,
    /// Ask the service to route follow-up tasks to this worker
    pub enable_sticky: bool,
    /// How replayed decisions are compared with recorded history
    pub match_mode: MatchMode,
}

impl Default for WorkflowTaskHandlerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl WorkflowTaskHandlerConfig {
    /// Default configuration suitable for most use cases
    pub const DEFAULT: Self = Self {
        non_deterministic_policy: NonDeterministicWorkflowPolicy::BlockWorkflow,
        max_cached_workflows: 10_000,
        sticky_schedule_to_start_timeout: Duration::from_secs(5),
        enable_sticky: true,
        match_mode: MatchMode::Lenient,
    };

    /// High-throughput configuration keeping many runs resident
    pub const HIGH_THROUGHPUT: Self = Self {
        non_deterministic_policy: NonDeterministicWorkflowPolicy::BlockWorkflow,
        max_cached_workflows: 50_000,
        sticky_schedule_to_start_timeout: Duration::from_secs(5),
        enable_sticky: true,
        match_mode: MatchMode::Lenient,
    };

    /// Low-resource configuration for constrained environments
    pub const LOW_RESOURCE: Self = Self {
        non_deterministic_policy: NonDeterministicWorkflowPolicy::BlockWorkflow,
        max_cached_workflows: 100,
        sticky_schedule_to_start_timeout: Duration::from_secs(10),
        enable_sticky: true,
        match_mode: MatchMode::Lenient,
    };

    /// Create a new configuration with validation
    pub fn new(
        non_deterministic_policy: NonDeterministicWorkflowPolicy,
        max_cached_workflows: usize,
        sticky_schedule_to_start_timeout: Duration,
        enable_sticky: bool,
    ) -> Result<Self, ConfigError> {
        if max_cached_workflows == 0 {
            return Err(ConfigError::InvalidValue(
                "max_cached_workflows must be positive".to_string(),
            ));
        }
        if enable_sticky && sticky_schedule_to_start_timeout.as_secs() == 0 {
            return Err(ConfigError::InvalidValue(
                "sticky_schedule_to_start_timeout must be at least one second".to_string(),
            ));
        }

        Ok(Self {
            non_deterministic_policy,
            max_cached_workflows,
            sticky_schedule_to_start_timeout,
            enable_sticky,
            match_mode: MatchMode::Lenient,
        })
    }

    pub fn with_non_deterministic_policy(mut self, policy: NonDeterministicWorkflowPolicy) -> Self {
        self.non_deterministic_policy = policy;
        self
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }
}

/// Configuration for activity task handling
#[derive(Debug, Clone)]
pub struct ActivityTaskHandlerConfig {
    /// Send heartbeats in the background while an activity runs
    pub auto_heartbeat: bool,
    /// Background heartbeat period; zero derives it from the task's heartbeat timeout
    pub heartbeat_interval: Duration,
}

impl Default for ActivityTaskHandlerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl ActivityTaskHandlerConfig {
    /// Default configuration suitable for most use cases
    pub const DEFAULT: Self = Self {
        auto_heartbeat: true,
        heartbeat_interval: Duration::ZERO,
    };

    /// Long-running configuration with a fixed heartbeat period
    pub const LONG_RUNNING: Self = Self {
        auto_heartbeat: true,
        heartbeat_interval: Duration::from_secs(30),
    };

    /// Low-resource configuration; activities heartbeat explicitly
    pub const LOW_RESOURCE: Self = Self {
        auto_heartbeat: false,
        heartbeat_interval: Duration::ZERO,
    };

    /// Create a new configuration with validation
    pub fn new(auto_heartbeat: bool, heartbeat_interval: Duration) -> Result<Self, ConfigError> {
        if !auto_heartbeat && !heartbeat_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "heartbeat_interval requires auto_heartbeat".to_string(),
            ));
        }

        Ok(Self {
            auto_heartbeat,
            heartbeat_interval,
        })
    }

    /// Background heartbeat period for a task with the given heartbeat timeout.
    ///
    /// `None` when no background heartbeats should be sent.
    pub fn effective_heartbeat_interval(&self, heartbeat_timeout: Duration) -> Option<Duration> {
        if !self.auto_heartbeat {
            return None;
        }
        let interval = if self.heartbeat_interval.is_zero() {
            heartbeat_timeout.mul_f64(0.8)
        } else {
            self.heartbeat_interval
        };
        (!interval.is_zero()).then_some(interval)
    }
}

/// Identity and settings shared by a worker's task handlers
#[derive(Clone)]
pub struct WorkerOptions {
    pub domain: String,
    pub identity: String,
    pub task_list: String,
    pub workflow: WorkflowTaskHandlerConfig,
    pub activity: ActivityTaskHandlerConfig,
    pub data_converter: Arc<dyn DataConverter>,
}

impl std::fmt::Debug for WorkerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerOptions")
            .field("domain", &self.domain)
            .field("identity", &self.identity)
            .field("task_list", &self.task_list)
            .field("workflow", &self.workflow)
            .field("activity", &self.activity)
            .field("data_converter", &"<converter>")
            .finish()
    }
}

impl WorkerOptions {
    pub fn new(domain: impl Into<String>, task_list: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            identity: format!("{}@cadenza-worker", std::process::id()),
            task_list: task_list.into(),
            workflow: WorkflowTaskHandlerConfig::DEFAULT,
            activity: ActivityTaskHandlerConfig::DEFAULT,
            data_converter: Arc::new(JsonDataConverter),
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn with_workflow_config(mut self, config: WorkflowTaskHandlerConfig) -> Self {
        self.workflow = config;
        self
    }

    pub fn with_activity_config(mut self, config: ActivityTaskHandlerConfig) -> Self {
        self.activity = config;
        self
    }

    pub fn with_data_converter(mut self, converter: Arc<dyn DataConverter>) -> Self {
        self.data_converter = converter;
        self
    }

    /// Name of a per-process sticky task list for this worker
    pub fn sticky_task_list_name(&self) -> String {
        format!("{}:{}", self.identity, uuid::Uuid::new_v4())
    }
}

/// Configuration error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
