//! Error types for the freeloader crate.
//!
//! Attachment failures and handler failures are kept apart: the former are
//! topology mistakes that can never succeed on retry, the latter are per-item
//! faults raised by concrete stage logic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The main error type for freeloader operations.
#[derive(Debug, Error)]
pub enum StageError {
    /// An attachment was rejected.
    #[error("{0}")]
    Attachment(#[from] AttachmentError),

    /// A stage handler failed while processing an item.
    #[error("{0}")]
    Handler(#[from] HandlerError),

    /// A channel worker could not accept an envelope.
    #[error("{0}")]
    Worker(#[from] WorkerError),

    /// A configuration value was invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why an attachment was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AttachmentRejection {
    /// The producer was already terminated.
    ProducerFinished,
    /// The consumer was already terminated.
    ConsumerFinished,
    /// The consumer already has an upstream producer.
    AlreadyAttached {
        /// Name of the existing upstream.
        current: String,
    },
    /// The producer is the consumer or one of its descendants.
    Cycle,
}

impl fmt::Display for AttachmentRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProducerFinished => write!(f, "producer is finished"),
            Self::ConsumerFinished => write!(f, "consumer is finished"),
            Self::AlreadyAttached { current } => {
                write!(f, "consumer is already attached to '{current}'")
            }
            Self::Cycle => write!(f, "attachment would create a cycle"),
        }
    }
}

/// Error raised when wiring a consumer onto a producer fails.
///
/// Non-retryable: the caller must build a fresh chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot attach '{consumer}' to '{producer}': {reason}")]
pub struct AttachmentError {
    /// Name of the would-be producer.
    pub producer: String,
    /// Name of the would-be consumer.
    pub consumer: String,
    /// Why the attachment was refused.
    pub reason: AttachmentRejection,
}

impl AttachmentError {
    /// Creates a new attachment error.
    #[must_use]
    pub fn new(
        producer: impl Into<String>,
        consumer: impl Into<String>,
        reason: AttachmentRejection,
    ) -> Self {
        Self {
            producer: producer.into(),
            consumer: consumer.into(),
            reason,
        }
    }

    /// Returns true if the rejection was caused by a finished endpoint.
    #[must_use]
    pub fn is_finished_endpoint(&self) -> bool {
        matches!(
            self.reason,
            AttachmentRejection::ProducerFinished | AttachmentRejection::ConsumerFinished
        )
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!("AttachmentError"));
        map.insert("producer".to_string(), serde_json::json!(self.producer));
        map.insert("consumer".to_string(), serde_json::json!(self.consumer));
        map.insert(
            "reason".to_string(),
            serde_json::to_value(&self.reason).unwrap_or(serde_json::Value::Null),
        );
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Error raised inside a stage's item handler.
///
/// Surfaced synchronously to whoever called `submit`; the stage keeps running.
#[derive(Debug, Error)]
#[error("Handler error in stage '{stage}': {source}")]
pub struct HandlerError {
    /// The stage whose handler failed.
    pub stage: String,
    /// The underlying failure.
    #[source]
    pub source: anyhow::Error,
}

impl HandlerError {
    /// Creates a new handler error.
    #[must_use]
    pub fn new(stage: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self {
            stage: stage.into(),
            source: source.into(),
        }
    }

    /// Creates a handler error from a plain message.
    #[must_use]
    pub fn msg(stage: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            stage: stage.into(),
            source: anyhow::anyhow!("{message}"),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!("HandlerError"));
        map.insert("stage".to_string(), serde_json::json!(self.stage));
        map.insert("source".to_string(), serde_json::json!(self.source.to_string()));
        map
    }
}

/// Errors related to channel workers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    /// The worker queue is at capacity.
    #[error("Worker queue for stage '{stage}' is full (capacity: {capacity})")]
    QueueFull {
        /// The stage name.
        stage: String,
        /// The queue capacity.
        capacity: usize,
    },

    /// The worker has stopped and no longer receives envelopes.
    #[error("Worker for stage '{stage}' has stopped")]
    Closed {
        /// The stage name.
        stage: String,
    },
}

impl WorkerError {
    /// Creates a queue full error.
    #[must_use]
    pub fn queue_full(stage: impl Into<String>, capacity: usize) -> Self {
        Self::QueueFull {
            stage: stage.into(),
            capacity,
        }
    }

    /// Creates a closed worker error.
    #[must_use]
    pub fn closed(stage: impl Into<String>) -> Self {
        Self::Closed {
            stage: stage.into(),
        }
    }
}
