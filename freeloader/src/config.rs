//! Configuration types for stages and channel workers.

use crate::core::PausePolicy;
use crate::errors::StageError;
use serde::{Deserialize, Serialize};

/// Configuration for a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Diagnostic label for the stage.
    #[serde(default = "default_name")]
    pub name: String,
    /// Whether `resume()` may leave `Paused`.
    #[serde(default)]
    pub pause_policy: PausePolicy,
    /// Whether dropped items are logged at debug level.
    #[serde(default = "default_log_drops")]
    pub log_drops: bool,
}

fn default_name() -> String {
    "stage".to_string()
}

fn default_log_drops() -> bool {
    true
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            pause_policy: PausePolicy::default(),
            log_drops: default_log_drops(),
        }
    }
}

impl StageConfig {
    /// Creates a configuration with the given name and defaults otherwise.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the pause policy.
    #[must_use]
    pub fn with_pause_policy(mut self, policy: PausePolicy) -> Self {
        self.pause_policy = policy;
        self
    }

    /// Sets whether dropped items are logged.
    #[must_use]
    pub fn with_log_drops(mut self, log_drops: bool) -> Self {
        self.log_drops = log_drops;
        self
    }

    /// Parses a configuration from JSON, filling in defaults.
    pub fn from_json_str(json: &str) -> Result<Self, StageError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for invalid values.
    pub fn validate(&self) -> Result<(), StageError> {
        if self.name.trim().is_empty() {
            return Err(StageError::Config("stage name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Configuration for a channel worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of queued envelopes.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Whether the worker pauses its stage's producers when the queue fills.
    #[serde(default = "default_pause_on_full")]
    pub pause_on_full: bool,
}

fn default_queue_capacity() -> usize {
    64
}

fn default_pause_on_full() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            pause_on_full: default_pause_on_full(),
        }
    }
}

impl WorkerConfig {
    /// Creates a new worker configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets whether a full queue pauses upstream producers.
    #[must_use]
    pub fn with_pause_on_full(mut self, pause_on_full: bool) -> Self {
        self.pause_on_full = pause_on_full;
        self
    }

    /// Parses a configuration from JSON, filling in defaults.
    pub fn from_json_str(json: &str) -> Result<Self, StageError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for invalid values.
    pub fn validate(&self) -> Result<(), StageError> {
        if self.queue_capacity == 0 {
            return Err(StageError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stage_config_defaults() {
        let config = StageConfig::default();
        assert_eq!(config.name, "stage");
        assert_eq!(config.pause_policy, PausePolicy::Resumable);
        assert!(config.log_drops);
    }

    #[test]
    fn test_stage_config_from_json_partial() {
        let config = StageConfig::from_json_str(r#"{"name": "fetch", "pause_policy": "one_way"}"#)
            .unwrap();
        assert_eq!(
            config,
            StageConfig::new("fetch").with_pause_policy(PausePolicy::OneWay)
        );
    }

    #[test]
    fn test_stage_config_rejects_blank_name() {
        let err = StageConfig::from_json_str(r#"{"name": "  "}"#).unwrap_err();
        assert!(matches!(err, StageError::Config(_)));
    }

    #[test]
    fn test_stage_config_bad_json() {
        let err = StageConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, StageError::Serialization(_)));
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::new()
            .with_queue_capacity(4)
            .with_pause_on_full(false);
        assert_eq!(config.queue_capacity, 4);
        assert!(!config.pause_on_full);
    }

    #[test]
    fn test_worker_config_rejects_zero_capacity() {
        let err = WorkerConfig::from_json_str(r#"{"queue_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, StageError::Config(_)));
        assert_eq!(WorkerConfig::from_json_str("{}").unwrap(), WorkerConfig::default());
    }
}
