//! Testing utilities for freeloader chains.
//!
//! This module provides:
//! - A recording handler that logs items and hook invocations
//! - A handler that fails on selected items

mod mocks;

pub use mocks::{FailingHandler, Recorder, RecordingHandler};
