use std::path::PathBuf;
use thiserror::Error;

use crate::topic_log::LogError;

/// Misconfiguration of the topic network, the command chain inputs or the
/// scheduler itself. Every variant is fatal: the scheduler never starts
/// ticking with a configuration that produced one of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{context}: message payload must be a mapping, found {found}")]
    NonMappingPayload { context: String, found: &'static str },

    #[error("There is a circular dependency in the topics, aborting init")]
    CircularDependency,

    #[error("Two or more Topics cannot have the same name: {0}, Please Check your Configuration")]
    DuplicateTopicName(String),

    #[error("Topic and Subscriber cannot have the same name: {0}")]
    TopicSubscriberNameCollision(String),

    #[error("Hardware for '{0}' failed to initialize, aborting init")]
    HardwareInitFailed(String),

    #[error("Must provide a log file to read from in simulation mode")]
    MissingReplayLog,

    #[error("Configuration file {path}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },
}

/// Errors surfaced by [`Scheduler`](crate::Scheduler) operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Topic log error: {0}")]
    Log(#[from] LogError),

    #[error("Simulation log exhausted after {ticks} ticks")]
    ReplayExhausted { ticks: u64 },

    #[error("Topic '{topic}' has no logged message at time {time}")]
    MissingLoggedTopic { topic: String, time: f64 },

    #[error("Scheduler cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: crate::scheduler::SchedulerState,
    },
}

impl SchedulerError {
    /// True when the error stems from configuration rather than a fault
    /// encountered while ticking.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, SchedulerError::Config(_))
    }
}

/// Name of a JSON value's kind, used in payload validation messages.
pub(crate) fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
