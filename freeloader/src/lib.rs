//! # Freeloader
//!
//! Composable pipeline stages with propagated lifecycle signals.
//!
//! A chain is built by attaching stages to each other; there is no separate
//! pipeline object. Once attached:
//!
//! - **Items** flow downstream through each stage's [`ItemHandler`](stage::ItemHandler)
//! - **Terminate** flows downstream and finishes every stage below the caller
//! - **Complete** flows downstream as a natural end-of-stream notice
//! - **Pause** and **Resume** flow upstream so consumers can throttle producers
//!
//! ## Quick Start
//!
//! ```rust
//! use freeloader::prelude::*;
//!
//! let fetch = Stage::new("fetch", Passthrough);
//! let parse = Stage::new("parse", map(|line: String| line.len()));
//! parse.attach(&fetch)?;
//!
//! fetch.submit("hello".to_string())?;
//! parse.pause();          // fetch is notified, keeps running
//! fetch.terminate();      // fetch and parse are now finished
//!
//! assert_eq!(fetch.run_state(), RunState::Finished);
//! assert_eq!(parse.run_state(), RunState::Finished);
//! # Ok::<(), freeloader::errors::StageError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod stage;
pub mod testing;
pub mod worker;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{StageConfig, WorkerConfig};
    pub use crate::core::{PausePolicy, RunState, Signal, SignalDirection};
    pub use crate::errors::{
        AttachmentError, AttachmentRejection, HandlerError, StageError, WorkerError,
    };
    pub use crate::events::{
        CollectingEventSink, EventKind, EventSink, LoggingEventSink, NoOpEventSink, StageEvent,
    };
    pub use crate::stage::{
        for_each, map, FilterHandler, FnHandler, ItemHandler, Passthrough, Stage, StageBuilder,
        StageStats,
    };
    pub use crate::worker::{spawn_worker, Envelope, Feeder, WorkerReport};
}
