//! Opt-in `tracing` setup for hosts embedding freeloader.
//!
//! The library never installs a subscriber on its own; stages log through
//! `tracing` macros and per-stage [`EventSink`](crate::events::EventSink)s.

use crate::errors::StageError;
use tracing_subscriber::EnvFilter;

/// Default filter when neither an explicit filter nor `RUST_LOG` is given.
pub const DEFAULT_FILTER: &str = "freeloader=info";

/// Installs a global fmt subscriber using `filter` (e.g. `"freeloader=debug"`).
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_tracing(filter: &str) -> Result<(), StageError> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|e| StageError::Config(format!("invalid tracing filter: {e}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| StageError::Config(format!("tracing already initialised: {e}")))
}

/// Installs a global fmt subscriber configured from `RUST_LOG`.
pub fn init_tracing_from_env() -> Result<(), StageError> {
    let filter = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    init_tracing(&filter)
}

/// Installs a JSON subscriber, for hosts shipping logs to a collector.
pub fn init_json_tracing(filter: &str) -> Result<(), StageError> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|e| StageError::Config(format!("invalid tracing filter: {e}")))?;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| StageError::Config(format!("tracing already initialised: {e}")))
}
