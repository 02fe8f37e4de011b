//! Stage event type for reporting lifecycle activity.

use crate::core::{RunState, Signal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EventKind {
    /// The stage was attached as a consumer of `upstream`.
    Attached {
        /// Name of the producer.
        upstream: String,
    },
    /// An item was handed to the handler.
    ItemAccepted,
    /// An item was dropped because the stage was not accepting items.
    ItemDropped {
        /// The state the stage was in.
        state: RunState,
    },
    /// The handler returned an error.
    HandlerFailed,
    /// The run state changed.
    StateChanged {
        /// Previous state.
        from: RunState,
        /// New state.
        to: RunState,
    },
    /// The stage originated or relayed a signal.
    SignalSent {
        /// The signal.
        signal: Signal,
    },
    /// The stage received a signal from a neighbour.
    SignalReceived {
        /// The signal.
        signal: Signal,
    },
}

impl EventKind {
    /// Returns the dotted event name, e.g. `signal.sent`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Attached { .. } => "stage.attached",
            Self::ItemAccepted => "item.accepted",
            Self::ItemDropped { .. } => "item.dropped",
            Self::HandlerFailed => "item.failed",
            Self::StateChanged { .. } => "state.changed",
            Self::SignalSent { .. } => "signal.sent",
            Self::SignalReceived { .. } => "signal.received",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attached { upstream } => write!(f, "{} ({upstream})", self.name()),
            Self::ItemDropped { state } => write!(f, "{} ({state})", self.name()),
            Self::StateChanged { from, to } => write!(f, "{} ({from} -> {to})", self.name()),
            Self::SignalSent { signal } | Self::SignalReceived { signal } => {
                write!(f, "{} ({signal})", self.name())
            }
            Self::ItemAccepted | Self::HandlerFailed => f.write_str(self.name()),
        }
    }
}

/// A diagnostics record: which stage, what happened, when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    /// The stage name.
    pub stage: String,
    /// What happened.
    #[serde(flatten)]
    pub kind: EventKind,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

impl StageEvent {
    /// Creates a new event stamped with the current time.
    #[must_use]
    pub fn new(stage: impl Into<String>, kind: EventKind) -> Self {
        Self {
            stage: stage.into(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Returns the dotted event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Returns true if this event is `signal` being received.
    #[must_use]
    pub fn is_received(&self, signal: Signal) -> bool {
        matches!(self.kind, EventKind::SignalReceived { signal: s } if s == signal)
    }

    /// Returns true if this event is `signal` being sent.
    #[must_use]
    pub fn is_sent(&self, signal: Signal) -> bool {
        matches!(self.kind, EventKind::SignalSent { signal: s } if s == signal)
    }

    /// Converts the event to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
