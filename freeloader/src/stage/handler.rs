//! The per-item capability a concrete stage supplies.

use std::fmt::{self, Debug};
use std::marker::PhantomData;

/// Per-item processing logic plugged into a [`Stage`](super::Stage).
///
/// The stage serializes every call into one handler. Hooks default to no-ops;
/// `on_terminate` and `on_complete` run exactly once per stage.
///
/// A handler must not call back into its own stage from `handle`. Calls into
/// other stages are fine.
pub trait ItemHandler<I>: Send {
    /// The item type forwarded downstream.
    type Output: Clone + Send + 'static;

    /// Processes one item. `Ok(None)` forwards nothing.
    fn handle(&mut self, item: I) -> anyhow::Result<Option<Self::Output>>;

    /// A consumer further down asked for slower production.
    fn on_pause(&mut self) {}

    /// A consumer further down recovered from a pause.
    fn on_resume(&mut self) {}

    /// The stream ended naturally.
    fn on_complete(&mut self) {}

    /// The stage was terminated.
    fn on_terminate(&mut self) {}
}

/// Forwards every item unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl<T: Clone + Send + 'static> ItemHandler<T> for Passthrough {
    type Output = T;

    fn handle(&mut self, item: T) -> anyhow::Result<Option<T>> {
        Ok(Some(item))
    }
}

/// A closure-based handler.
pub struct FnHandler<I, O, F>
where
    F: FnMut(I) -> anyhow::Result<Option<O>> + Send,
{
    func: F,
    _phantom: PhantomData<fn(I) -> O>,
}

impl<I, O, F> FnHandler<I, O, F>
where
    F: FnMut(I) -> anyhow::Result<Option<O>> + Send,
{
    /// Creates a new closure-based handler.
    pub fn new(func: F) -> Self {
        Self {
            func,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, F> Debug for FnHandler<I, O, F>
where
    F: FnMut(I) -> anyhow::Result<Option<O>> + Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

impl<I, O, F> ItemHandler<I> for FnHandler<I, O, F>
where
    O: Clone + Send + 'static,
    F: FnMut(I) -> anyhow::Result<Option<O>> + Send,
{
    type Output = O;

    fn handle(&mut self, item: I) -> anyhow::Result<Option<O>> {
        (self.func)(item)
    }
}

/// Forwards items matching a predicate, drops the rest.
pub struct FilterHandler<F> {
    predicate: F,
}

impl<F> FilterHandler<F> {
    /// Creates a new filter handler.
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> Debug for FilterHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterHandler").finish_non_exhaustive()
    }
}

impl<T, F> ItemHandler<T> for FilterHandler<F>
where
    T: Clone + Send + 'static,
    F: FnMut(&T) -> bool + Send,
{
    type Output = T;

    fn handle(&mut self, item: T) -> anyhow::Result<Option<T>> {
        Ok((self.predicate)(&item).then_some(item))
    }
}

/// Creates a handler that maps every item through `func`.
pub fn map<I, O, F>(
    mut func: F,
) -> FnHandler<I, O, impl FnMut(I) -> anyhow::Result<Option<O>> + Send>
where
    O: Clone + Send + 'static,
    F: FnMut(I) -> O + Send,
{
    FnHandler::new(move |item| Ok(Some(func(item))))
}

/// Creates a terminal handler that consumes items and forwards nothing.
pub fn for_each<I, F>(
    mut func: F,
) -> FnHandler<I, (), impl FnMut(I) -> anyhow::Result<Option<()>> + Send>
where
    F: FnMut(I) -> anyhow::Result<()> + Send,
{
    FnHandler::new(move |item| func(item).map(|()| None))
}
