//! Core domain model types for freeloader.
//!
//! This module contains the fundamental types shared by every stage:
//! - Run state and pause policy enums
//! - The closed set of lifecycle signals

mod signal;
mod state;

pub use signal::{Signal, SignalDirection};
pub use state::{PausePolicy, RunState};
