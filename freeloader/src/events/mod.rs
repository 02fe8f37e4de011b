//! Diagnostics events for stage lifecycles.
//!
//! Every state transition, attachment, item outcome and signal of a stage is
//! reported to the stage's injected [`EventSink`]. Sinks are a side channel
//! only and never influence control flow. The default sink discards events.

mod event;
mod sink;

pub use event::{EventKind, StageEvent};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

#[cfg(test)]
pub use sink::MockEventSink;
