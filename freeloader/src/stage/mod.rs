//! Stages and the signals that flow between them.
//!
//! A [`Stage`] wraps an [`ItemHandler`] and sits in a chain of stages built
//! with [`Stage::attach`]. Items travel downstream through
//! [`Stage::submit`]. `Terminate` and `Complete` travel downstream to every
//! consumer; `Pause` and `Resume` travel upstream to every producer.

mod attach;
mod handler;
mod links;
mod stats;


pub use handler::{for_each, map, FilterHandler, FnHandler, ItemHandler, Passthrough};
pub use stats::StageStats;

use crate::config::StageConfig;
use crate::core::{PausePolicy, RunState, Signal};
use crate::errors::HandlerError;
use crate::events::{EventKind, EventSink, NoOpEventSink, StageEvent};
use links::{Downstream, Upstream};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};
use uuid::Uuid;

type BoxedHandler<I, O> = Box<dyn ItemHandler<I, Output = O>>;

/// Topology and run state, guarded together so attachment is atomic.
struct Links<O> {
    state: RunState,
    completed: bool,
    upstream: Option<Weak<dyn Upstream>>,
    upstream_name: Option<String>,
    downstream: Vec<Arc<dyn Downstream<O>>>,
}

impl<O> Default for Links<O> {
    fn default() -> Self {
        Self {
            state: RunState::Running,
            completed: false,
            upstream: None,
            upstream_name: None,
            downstream: Vec::new(),
        }
    }
}

/// A handler hook waiting for the handler lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hook {
    Pause,
    Resume,
    Complete,
    Terminate,
}

impl Hook {
    fn apply<I, O: Clone + Send + 'static>(self, handler: &mut dyn ItemHandler<I, Output = O>) {
        match self {
            Self::Pause => handler.on_pause(),
            Self::Resume => handler.on_resume(),
            Self::Complete => handler.on_complete(),
            Self::Terminate => handler.on_terminate(),
        }
    }
}

/// A processing unit in a chain.
///
/// Consumes `I` from at most one upstream producer, hands each item to its
/// handler and forwards the handler's `O` output to every attached consumer
/// in attachment order. Always used behind an `Arc`.
pub struct Stage<I, O> {
    id: Uuid,
    config: StageConfig,
    links: Mutex<Links<O>>,
    handler: Mutex<BoxedHandler<I, O>>,
    pending_hooks: Mutex<Vec<Hook>>,
    sink: Arc<dyn EventSink>,
    stats: StageStats,
}

/// Builder for [`Stage`].
#[derive(Clone)]
pub struct StageBuilder {
    config: StageConfig,
    sink: Arc<dyn EventSink>,
}

impl StageBuilder {
    /// Starts a builder for a stage named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(StageConfig::new(name))
    }

    /// Starts a builder from a full configuration.
    #[must_use]
    pub fn from_config(config: StageConfig) -> Self {
        Self {
            config,
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the pause policy.
    #[must_use]
    pub fn pause_policy(mut self, policy: PausePolicy) -> Self {
        self.config.pause_policy = policy;
        self
    }

    /// Sets the diagnostics sink.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Builds the stage around `handler`.
    pub fn build<I, H>(self, handler: H) -> Arc<Stage<I, H::Output>>
    where
        I: Send + 'static,
        H: ItemHandler<I> + 'static,
    {
        let stage = Stage {
            id: Uuid::new_v4(),
            config: self.config,
            links: Mutex::new(Links::default()),
            handler: Mutex::new(Box::new(handler)),
            pending_hooks: Mutex::new(Vec::new()),
            sink: self.sink,
            stats: StageStats::default(),
        };
        trace!(stage = %stage.config.name, id = %stage.id, "stage created");
        Arc::new(stage)
    }
}

impl fmt::Debug for StageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<I, O> Stage<I, O>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
{
    /// Creates a stage with default configuration and no diagnostics.
    pub fn new<H>(name: impl Into<String>, handler: H) -> Arc<Self>
    where
        H: ItemHandler<I, Output = O> + 'static,
    {
        StageBuilder::new(name).build(handler)
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the stage id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the pause policy.
    #[must_use]
    pub fn pause_policy(&self) -> PausePolicy {
        self.config.pause_policy
    }

    /// Returns the current run state.
    #[must_use]
    pub fn run_state(&self) -> RunState {
        self.links.lock().state
    }

    /// Returns true once the stage was terminated.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.run_state().is_terminal()
    }

    /// Returns true once the stage signalled end-of-stream.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.links.lock().completed
    }

    /// Returns true if the stage is attached to a producer.
    #[must_use]
    pub fn has_upstream(&self) -> bool {
        self.links.lock().upstream.is_some()
    }

    /// Returns the name of the producer this stage is attached to.
    #[must_use]
    pub fn upstream_name(&self) -> Option<String> {
        self.links.lock().upstream_name.clone()
    }

    /// Returns the number of attached consumers.
    #[must_use]
    pub fn downstream_count(&self) -> usize {
        self.links.lock().downstream.len()
    }

    /// Returns the stage counters.
    #[must_use]
    pub fn stats(&self) -> &StageStats {
        &self.stats
    }

    /// Processes one item.
    ///
    /// Items submitted while the stage is not `Running`, or after it
    /// completed, are dropped without reaching the handler. Handler errors,
    /// including those raised by consumers during forwarding, are returned to
    /// the caller; the stage keeps running.
    pub fn submit(&self, item: I) -> Result<(), HandlerError> {
        let (state, completed) = {
            let links = self.links.lock();
            (links.state, links.completed)
        };
        if !state.accepts_items() || completed {
            self.stats.record_dropped();
            if self.config.log_drops {
                debug!(stage = %self.name(), state = %state, completed, "item dropped");
            }
            self.record(EventKind::ItemDropped { state });
            return Ok(());
        }

        self.stats.record_accepted();
        self.record(EventKind::ItemAccepted);

        let result = {
            let mut handler = self.handler.lock();
            handler.handle(item)
        };
        self.drain_hooks();

        match result {
            Ok(Some(output)) => self.forward(output),
            Ok(None) => Ok(()),
            Err(source) => {
                self.stats.record_failed();
                self.record(EventKind::HandlerFailed);
                debug!(stage = %self.name(), error = %source, "handler failed");
                Err(HandlerError::new(self.name(), source))
            }
        }
    }

    /// Pauses the stage and asks every producer above it to slow down.
    ///
    /// Only a running stage can pause; other states make this a no-op. The
    /// producers are notified but keep their own run state.
    pub fn pause(&self) {
        let upstream = {
            let mut links = self.links.lock();
            if links.state != RunState::Running {
                trace!(stage = %self.name(), state = %links.state, "pause ignored");
                return;
            }
            links.state = RunState::Paused;
            links.upstream.clone()
        };
        self.record_transition(RunState::Running, RunState::Paused);
        self.send_upstream(upstream, Signal::Pause);
    }

    /// Returns a paused stage to `Running` and tells producers it recovered.
    ///
    /// Returns whether the stage is running afterwards. A `OneWay` pause
    /// policy refuses to resume; a finished stage never resumes.
    pub fn resume(&self) -> bool {
        let upstream = {
            let mut links = self.links.lock();
            match links.state {
                RunState::Running => return true,
                RunState::Finished => return false,
                RunState::Paused => {}
            }
            if !links
                .state
                .can_transition_to(RunState::Running, self.config.pause_policy)
            {
                debug!(stage = %self.name(), policy = %self.config.pause_policy, "resume refused");
                return false;
            }
            links.state = RunState::Running;
            links.upstream.clone()
        };
        self.record_transition(RunState::Paused, RunState::Running);
        self.send_upstream(upstream, Signal::Resume);
        true
    }

    /// Asks producers to slow down without pausing this stage.
    ///
    /// Used when something in front of the stage, such as a worker queue, is
    /// the part that is falling behind.
    pub fn throttle_upstream(&self) {
        let upstream = self.links.lock().upstream.clone();
        self.send_upstream(upstream, Signal::Pause);
    }

    /// Tells producers a throttle raised by [`Self::throttle_upstream`] is over.
    pub fn release_upstream(&self) {
        let upstream = self.links.lock().upstream.clone();
        self.send_upstream(upstream, Signal::Resume);
    }

    /// Terminates the stage and every consumer below it.
    ///
    /// Idempotent: terminating a finished stage does nothing and does not
    /// propagate again. Items already accepted are not rolled back.
    pub fn terminate(&self) {
        let (from, targets) = {
            let mut links = self.links.lock();
            if links.state.is_terminal() {
                trace!(stage = %self.name(), "already finished");
                return;
            }
            let from = links.state;
            links.state = RunState::Finished;
            (from, std::mem::take(&mut links.downstream))
        };
        self.record_transition(from, RunState::Finished);
        self.run_hook(Hook::Terminate);

        debug!(stage = %self.name(), consumers = targets.len(), "terminate");
        self.record(EventKind::SignalSent {
            signal: Signal::Terminate,
        });
        for target in targets {
            target.receive_downstream(Signal::Terminate);
        }
    }

    /// Signals end-of-stream to every consumer below this stage.
    ///
    /// Does not change the run state. Further submitted items are dropped.
    /// Runs at most once per stage; a finished stage ignores it.
    pub fn complete(&self) {
        let targets = {
            let mut links = self.links.lock();
            if links.completed || links.state.is_terminal() {
                trace!(stage = %self.name(), "complete ignored");
                return;
            }
            links.completed = true;
            links.downstream.clone()
        };
        self.run_hook(Hook::Complete);

        debug!(stage = %self.name(), consumers = targets.len(), "complete");
        self.record(EventKind::SignalSent {
            signal: Signal::Complete,
        });
        for target in targets {
            target.receive_downstream(Signal::Complete);
        }
    }

    fn forward(&self, output: O) -> Result<(), HandlerError> {
        let targets = {
            let links = self.links.lock();
            if links.state.is_terminal() {
                return Ok(());
            }
            links.downstream.clone()
        };
        let Some((last, rest)) = targets.split_last() else {
            return Ok(());
        };
        // Every consumer gets the item; the first failure is reported.
        let mut first_error = None;
        for target in rest {
            if let Err(err) = target.deliver(output.clone()) {
                first_error.get_or_insert(err);
            }
        }
        if let Err(err) = last.deliver(output) {
            first_error.get_or_insert(err);
        }
        first_error.map_or(Ok(()), Err)
    }

    fn send_upstream(&self, upstream: Option<Weak<dyn Upstream>>, signal: Signal) {
        self.record(EventKind::SignalSent { signal });
        match upstream.and_then(|weak| weak.upgrade()) {
            Some(producer) => {
                trace!(stage = %self.name(), producer = %producer.name(), %signal, "relay upstream");
                producer.receive_upstream(signal);
            }
            None => trace!(stage = %self.name(), %signal, "no upstream"),
        }
    }

    /// Runs a handler hook now, or after the in-flight `handle` call returns.
    fn run_hook(&self, hook: Hook) {
        self.pending_hooks.lock().push(hook);
        self.drain_hooks();
    }

    fn drain_hooks(&self) {
        while let Some(mut handler) = self.handler.try_lock() {
            let hooks = std::mem::take(&mut *self.pending_hooks.lock());
            for hook in hooks {
                hook.apply(&mut **handler);
            }
            drop(handler);
            if self.pending_hooks.lock().is_empty() {
                break;
            }
        }
    }

    fn record(&self, kind: EventKind) {
        self.sink.record(&StageEvent::new(self.name(), kind));
    }

    fn record_transition(&self, from: RunState, to: RunState) {
        debug!(stage = %self.name(), %from, %to, "state changed");
        self.record(EventKind::StateChanged { from, to });
    }
}

impl<I, O> Downstream<I> for Stage<I, O>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
{
    fn deliver(&self, item: I) -> Result<(), HandlerError> {
        self.submit(item)
    }

    fn receive_downstream(&self, signal: Signal) {
        self.record(EventKind::SignalReceived { signal });
        match signal {
            Signal::Terminate => self.terminate(),
            Signal::Complete => self.complete(),
            Signal::Pause | Signal::Resume => {
                trace!(stage = %self.name(), %signal, "ignoring upstream signal sent downstream");
            }
        }
    }
}

impl<I, O> Upstream for Stage<I, O>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
{
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn receive_upstream(&self, signal: Signal) {
        let upstream = {
            let links = self.links.lock();
            if links.state.is_terminal() {
                return;
            }
            links.upstream.clone()
        };
        self.record(EventKind::SignalReceived { signal });
        match signal {
            Signal::Pause => {
                self.stats.record_pause();
                self.run_hook(Hook::Pause);
            }
            Signal::Resume => self.run_hook(Hook::Resume),
            Signal::Terminate | Signal::Complete => {
                trace!(stage = %self.config.name, %signal, "ignoring downstream signal sent upstream");
                return;
            }
        }
        self.send_upstream(upstream, signal);
    }

    fn parent(&self) -> Option<Arc<dyn Upstream>> {
        self.links
            .lock()
            .upstream
            .as_ref()
            .and_then(Weak::upgrade)
    }
}

impl<I, O> fmt::Debug for Stage<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let links = self.links.lock();
        f.debug_struct("Stage")
            .field("name", &self.config.name)
            .field("id", &self.id)
            .field("state", &links.state)
            .field("completed", &links.completed)
            .field("upstream", &links.upstream_name)
            .field("downstream", &links.downstream.len())
            .finish()
    }
}
