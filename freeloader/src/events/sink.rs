//! Event sink trait and implementations.

use super::StageEvent;
use parking_lot::RwLock;
use tracing::{debug, info, trace, Level};

/// Trait for sinks that receive stage diagnostics.
///
/// Sinks are invoked synchronously on the thread driving the stage, so an
/// implementation must not block and must not call back into the stage.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    /// Records an event. Must never panic or fail.
    fn record(&self, event: &StageEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn record(&self, _event: &StageEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    /// The log level to use.
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::DEBUG }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a trace-level logging sink.
    #[must_use]
    pub fn trace() -> Self {
        Self::new(Level::TRACE)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }

    /// Returns the configured level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }
}

impl EventSink for LoggingEventSink {
    fn record(&self, event: &StageEvent) {
        match self.level {
            Level::TRACE => {
                trace!(stage = %event.stage, event_type = event.name(), "{}: {}", event.stage, event.kind);
            }
            Level::DEBUG => {
                debug!(stage = %event.stage, event_type = event.name(), "{}: {}", event.stage, event.kind);
            }
            _ => {
                info!(stage = %event.stage, event_type = event.name(), "{}: {}", event.stage, event.kind);
            }
        }
    }
}

/// A collecting event sink, mostly for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<StageEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<StageEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns the events recorded for one stage.
    #[must_use]
    pub fn events_for(&self, stage: &str) -> Vec<StageEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.stage == stage)
            .cloned()
            .collect()
    }

    /// Returns events whose dotted name starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<StageEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.name().starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn record(&self, event: &StageEvent) {
        self.events.write().push(event.clone());
    }
}
