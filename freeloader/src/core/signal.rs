//! Lifecycle signals exchanged between attached stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A lifecycle signal.
///
/// `Terminate` and `Complete` travel with the data (producer to consumer);
/// `Pause` and `Resume` travel against it (consumer to producer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Stop all processing now.
    Terminate,
    /// The sender is overloaded; slow production.
    Pause,
    /// The sender has recovered from a pause.
    Resume,
    /// The producer will emit no more items.
    Complete,
}

/// The direction a signal travels along an attachment edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalDirection {
    /// From producer to consumer.
    Downstream,
    /// From consumer to producer.
    Upstream,
}

impl Signal {
    /// Returns the direction this signal propagates.
    #[must_use]
    pub fn direction(&self) -> SignalDirection {
        match self {
            Self::Terminate | Self::Complete => SignalDirection::Downstream,
            Self::Pause | Self::Resume => SignalDirection::Upstream,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => write!(f, "terminate"),
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::Complete => write!(f, "complete"),
        }
    }
}
