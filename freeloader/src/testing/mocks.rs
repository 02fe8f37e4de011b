//! Mock handlers for testing.

use crate::stage::ItemHandler;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct RecorderState<T> {
    items: Mutex<Vec<T>>,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    completions: AtomicUsize,
    terminations: AtomicUsize,
}

/// Shared view of what a [`RecordingHandler`] observed.
///
/// Clone the recorder, hand [`Recorder::handler`] to a stage and inspect the
/// recorder afterwards.
#[derive(Debug)]
pub struct Recorder<T> {
    state: Arc<RecorderState<T>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(RecorderState {
                items: Mutex::new(Vec::new()),
                pauses: AtomicUsize::new(0),
                resumes: AtomicUsize::new(0),
                completions: AtomicUsize::new(0),
                terminations: AtomicUsize::new(0),
            }),
        }
    }
}

impl<T: Clone> Recorder<T> {
    /// Creates a new recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a passthrough handler reporting into this recorder.
    #[must_use]
    pub fn handler(&self) -> RecordingHandler<T> {
        RecordingHandler {
            recorder: self.clone(),
        }
    }

    /// Returns the items seen so far.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.state.items.lock().clone()
    }

    /// Returns how many pause signals reached the handler.
    #[must_use]
    pub fn pauses(&self) -> usize {
        self.state.pauses.load(Ordering::SeqCst)
    }

    /// Returns how many resume signals reached the handler.
    #[must_use]
    pub fn resumes(&self) -> usize {
        self.state.resumes.load(Ordering::SeqCst)
    }

    /// Returns how many times the completion hook ran.
    #[must_use]
    pub fn completions(&self) -> usize {
        self.state.completions.load(Ordering::SeqCst)
    }

    /// Returns how many times the termination hook ran.
    #[must_use]
    pub fn terminations(&self) -> usize {
        self.state.terminations.load(Ordering::SeqCst)
    }
}

/// A passthrough handler that records everything it sees.
pub struct RecordingHandler<T> {
    recorder: Recorder<T>,
}

impl<T> fmt::Debug for RecordingHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingHandler").finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> ItemHandler<T> for RecordingHandler<T> {
    type Output = T;

    fn handle(&mut self, item: T) -> anyhow::Result<Option<T>> {
        self.recorder.state.items.lock().push(item.clone());
        Ok(Some(item))
    }

    fn on_pause(&mut self) {
        self.recorder.state.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn on_resume(&mut self) {
        self.recorder.state.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_complete(&mut self) {
        self.recorder.state.completions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_terminate(&mut self) {
        self.recorder.state.terminations.fetch_add(1, Ordering::SeqCst);
    }
}

/// A passthrough handler that fails on items matching a predicate.
pub struct FailingHandler<F> {
    predicate: F,
    message: String,
}

impl<F> FailingHandler<F> {
    /// Fails every item for which `predicate` returns true.
    pub fn on(predicate: F) -> Self {
        Self {
            predicate,
            message: "Intentional failure".to_string(),
        }
    }

    /// Sets the failure message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl<F> fmt::Debug for FailingHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailingHandler")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl<T, F> ItemHandler<T> for FailingHandler<F>
where
    T: Clone + Send + 'static,
    F: FnMut(&T) -> bool + Send,
{
    type Output = T;

    fn handle(&mut self, item: T) -> anyhow::Result<Option<T>> {
        if (self.predicate)(&item) {
            anyhow::bail!("{}", self.message);
        }
        Ok(Some(item))
    }
}
