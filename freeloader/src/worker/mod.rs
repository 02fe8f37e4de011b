//! Running a stage on its own tokio task.
//!
//! A worker owns the receiving end of a bounded channel. Items and signals
//! share that channel, so they reach the stage in the order they were sent:
//! a `Terminate` never overtakes items queued before it.
//!
//! When the queue is full, [`Feeder::try_submit`] can throttle the stage's
//! producers with a `Pause`; the worker releases them with `Resume` once the
//! queue has drained.

use crate::config::WorkerConfig;
use crate::core::Signal;
use crate::errors::{HandlerError, StageError, WorkerError};
use crate::stage::Stage;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What travels through a worker queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<T> {
    /// An item for the stage.
    Item(T),
    /// A lifecycle signal for the stage.
    Signal(Signal),
}

/// Summary of a finished worker.
#[derive(Debug, Default, Serialize)]
pub struct WorkerReport {
    /// The stage name.
    pub stage: String,
    /// Items handed to `submit`.
    pub submitted: u64,
    /// Items still queued when the stage stopped, dropped unprocessed.
    pub dropped: u64,
    /// The signal that stopped the worker, if any.
    pub stopped_by: Option<Signal>,
    /// Handler errors collected along the way.
    #[serde(skip)]
    pub errors: Vec<HandlerError>,
    /// The stage counters when the worker stopped.
    pub stage_stats: serde_json::Value,
}

impl WorkerReport {
    fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            ..Self::default()
        }
    }

    /// Returns true if no handler failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Shared<I, O> {
    stage: Arc<Stage<I, O>>,
    capacity: usize,
    pause_on_full: bool,
    throttled: AtomicBool,
}

/// The sending side of a worker queue.
pub struct Feeder<I, O> {
    tx: mpsc::Sender<Envelope<I>>,
    shared: Arc<Shared<I, O>>,
}

impl<I, O> Clone for Feeder<I, O> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<I, O> fmt::Debug for Feeder<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feeder")
            .field("capacity", &self.shared.capacity)
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl<I, O> Feeder<I, O>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
{
    /// Queues an item, waiting for room if the queue is full.
    pub async fn submit(&self, item: I) -> Result<(), WorkerError> {
        self.send(Envelope::Item(item)).await
    }

    /// Queues an item without waiting.
    ///
    /// A full queue returns [`WorkerError::QueueFull`] and, when configured,
    /// throttles the stage's producers until the worker catches up.
    pub fn try_submit(&self, item: I) -> Result<(), WorkerError> {
        match self.tx.try_send(Envelope::Item(item)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let shared = &self.shared;
                if shared.pause_on_full && !shared.throttled.swap(true, Ordering::SeqCst) {
                    debug!(stage = %shared.stage.name(), "queue full, throttling upstream");
                    shared.stage.throttle_upstream();
                }
                Err(WorkerError::queue_full(shared.stage.name(), shared.capacity))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(WorkerError::closed(self.shared.stage.name()))
            }
        }
    }

    /// Queues a terminate behind every item already queued.
    pub async fn terminate(&self) -> Result<(), WorkerError> {
        self.send(Envelope::Signal(Signal::Terminate)).await
    }

    /// Queues an end-of-stream notice behind every item already queued.
    pub async fn complete(&self) -> Result<(), WorkerError> {
        self.send(Envelope::Signal(Signal::Complete)).await
    }

    /// Queues a pause of the stage.
    pub async fn pause(&self) -> Result<(), WorkerError> {
        self.send(Envelope::Signal(Signal::Pause)).await
    }

    /// Queues a resume of the stage.
    pub async fn resume(&self) -> Result<(), WorkerError> {
        self.send(Envelope::Signal(Signal::Resume)).await
    }

    /// Returns true once the worker stopped receiving.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns the number of envelopes currently queued.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.capacity - self.tx.capacity()
    }

    async fn send(&self, envelope: Envelope<I>) -> Result<(), WorkerError> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| WorkerError::closed(self.shared.stage.name()))
    }
}

/// Spawns a worker driving `stage` from a bounded queue.
///
/// Must be called from within a tokio runtime. The worker stops after
/// handling `Terminate` or `Complete`, once the stage finishes through
/// another path, or when every [`Feeder`] is dropped.
pub fn spawn_worker<I, O>(
    stage: Arc<Stage<I, O>>,
    config: &WorkerConfig,
) -> Result<(Feeder<I, O>, JoinHandle<WorkerReport>), StageError>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
{
    config.validate()?;
    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let shared = Arc::new(Shared {
        stage,
        capacity: config.queue_capacity,
        pause_on_full: config.pause_on_full,
        throttled: AtomicBool::new(false),
    });

    let handle = tokio::spawn(run(Arc::clone(&shared), rx));
    Ok((Feeder { tx, shared }, handle))
}

async fn run<I, O>(shared: Arc<Shared<I, O>>, mut rx: mpsc::Receiver<Envelope<I>>) -> WorkerReport
where
    I: Send + 'static,
    O: Clone + Send + 'static,
{
    let stage = &shared.stage;
    let mut report = WorkerReport::new(stage.name());
    debug!(stage = %stage.name(), "worker started");

    while let Some(envelope) = rx.recv().await {
        match envelope {
            Envelope::Item(item) => {
                report.submitted += 1;
                if let Err(err) = stage.submit(item) {
                    warn!(stage = %stage.name(), error = %err, "handler failed in worker");
                    report.errors.push(err);
                }
            }
            Envelope::Signal(signal) => {
                match signal {
                    Signal::Terminate => stage.terminate(),
                    Signal::Complete => stage.complete(),
                    Signal::Pause => stage.pause(),
                    Signal::Resume => {
                        stage.resume();
                    }
                }
                if matches!(signal, Signal::Terminate | Signal::Complete) {
                    report.stopped_by = Some(signal);
                    break;
                }
            }
        }

        if stage.is_finished() {
            report.stopped_by.get_or_insert(Signal::Terminate);
            break;
        }
        if rx.is_empty() && shared.throttled.swap(false, Ordering::SeqCst) {
            debug!(stage = %stage.name(), "queue drained, releasing upstream");
            stage.release_upstream();
        }
    }

    rx.close();
    // The stage no longer accepts items; whatever is left gets counted as dropped.
    while let Ok(envelope) = rx.try_recv() {
        if let Envelope::Item(item) = envelope {
            report.submitted += 1;
            report.dropped += 1;
            if let Err(err) = stage.submit(item) {
                report.errors.push(err);
            }
        }
    }
    if report.dropped > 0 {
        warn!(stage = %stage.name(), dropped = report.dropped, "queued items dropped after stop");
    }
    if shared.throttled.swap(false, Ordering::SeqCst) {
        stage.release_upstream();
    }
    report.stage_stats = stage.stats().to_dict();
    debug!(
        stage = %stage.name(),
        submitted = report.submitted,
        dropped = report.dropped,
        errors = report.errors.len(),
        "worker stopped"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunState;
    use crate::stage::{Passthrough, StageBuilder};
    use crate::testing::{FailingHandler, Recorder};

    #[tokio::test]
    async fn test_worker_processes_items_in_order() {
        let recorder = Recorder::<u32>::new();
        let stage = Stage::new("w", recorder.handler());
        let (feeder, handle) = spawn_worker(Arc::clone(&stage), &WorkerConfig::default()).unwrap();

        for i in 0..10 {
            feeder.submit(i).await.unwrap();
        }
        feeder.complete().await.unwrap();
        let report = handle.await.unwrap();

        assert_eq!(recorder.items(), (0..10).collect::<Vec<_>>());
        assert_eq!(report.submitted, 10);
        assert_eq!(report.stopped_by, Some(Signal::Complete));
        assert!(report.is_clean());
        assert!(stage.is_completed());
    }

    #[tokio::test]
    async fn test_terminate_does_not_overtake_queued_items() {
        let recorder = Recorder::<u32>::new();
        let stage = Stage::new("w", recorder.handler());
        let config = WorkerConfig::new().with_queue_capacity(16);
        let (feeder, handle) = spawn_worker(Arc::clone(&stage), &config).unwrap();

        for i in 0..5 {
            feeder.try_submit(i).unwrap();
        }
        feeder.terminate().await.unwrap();
        let report = handle.await.unwrap();

        assert_eq!(recorder.items(), vec![0, 1, 2, 3, 4]);
        assert_eq!(report.stopped_by, Some(Signal::Terminate));
        assert_eq!(stage.run_state(), RunState::Finished);
        assert!(feeder.is_closed());
        assert!(feeder.submit(9).await.is_err());
    }

    #[tokio::test]
    async fn test_worker_collects_handler_errors() {
        let stage = Stage::new("w", FailingHandler::on(|x: &u32| x % 2 == 1));
        let (feeder, handle) = spawn_worker(Arc::clone(&stage), &WorkerConfig::default()).unwrap();

        for i in 0..4 {
            feeder.submit(i).await.unwrap();
        }
        feeder.terminate().await.unwrap();
        let report = handle.await.unwrap();

        assert_eq!(report.errors.len(), 2);
        assert!(!report.is_clean());
        assert_eq!(report.errors[0].stage, "w");
    }

    #[tokio::test]
    async fn test_worker_stops_when_stage_terminated_elsewhere() {
        let producer: Arc<Stage<u32, u32>> = Stage::new("producer", Passthrough);
        let stage: Arc<Stage<u32, u32>> = Stage::new("w", Passthrough);
        stage.attach(&producer).unwrap();
        let (feeder, handle) = spawn_worker(Arc::clone(&stage), &WorkerConfig::default()).unwrap();

        producer.terminate();
        feeder.submit(1).await.unwrap();
        let report = handle.await.unwrap();

        assert_eq!(report.stopped_by, Some(Signal::Terminate));
        assert_eq!(stage.stats().dropped(), 1);
    }

    #[tokio::test]
    async fn test_items_queued_before_upstream_terminate_are_counted() {
        let producer: Arc<Stage<u32, u32>> = Stage::new("producer", Passthrough);
        let recorder = Recorder::<u32>::new();
        let stage = Stage::new("w", recorder.handler());
        stage.attach(&producer).unwrap();
        let config = WorkerConfig::new().with_queue_capacity(8);
        let (feeder, handle) = spawn_worker(Arc::clone(&stage), &config).unwrap();

        for i in 0..5 {
            feeder.try_submit(i).unwrap();
        }
        producer.terminate();
        let report = handle.await.unwrap();

        assert!(recorder.items().is_empty());
        assert_eq!(report.submitted, 5);
        assert_eq!(report.dropped, 4);
        assert_eq!(stage.stats().dropped(), 5);
        assert_eq!(report.stage_stats["dropped"], 5);
        assert_eq!(report.stopped_by, Some(Signal::Terminate));
        assert!(feeder.is_closed());
    }

    #[tokio::test]
    async fn test_report_carries_stage_counters() {
        let stage: Arc<Stage<u32, u32>> = Stage::new("w", Passthrough);
        let (feeder, handle) = spawn_worker(Arc::clone(&stage), &WorkerConfig::default()).unwrap();

        feeder.submit(1).await.unwrap();
        feeder.submit(2).await.unwrap();
        feeder.complete().await.unwrap();
        let report = handle.await.unwrap();

        assert_eq!(report.dropped, 0);
        assert_eq!(report.stage_stats["accepted"], 2);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stage_stats"]["dropped"], 0);
        assert_eq!(json["submitted"], 2);
    }

    #[tokio::test]
    async fn test_worker_stops_when_feeders_dropped() {
        let stage: Arc<Stage<u32, u32>> = Stage::new("w", Passthrough);
        let (feeder, handle) = spawn_worker(Arc::clone(&stage), &WorkerConfig::default()).unwrap();
        let second = feeder.clone();

        drop(feeder);
        drop(second);
        let report = handle.await.unwrap();

        assert_eq!(report.stopped_by, None);
        assert_eq!(stage.run_state(), RunState::Running);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_full_queue_throttles_and_releases_upstream() {
        let producer_rec = Recorder::<u32>::new();
        let producer = Stage::new("producer", producer_rec.handler());
        let stage: Arc<Stage<u32, u32>> = StageBuilder::new("w").build(Passthrough);
        stage.attach(&producer).unwrap();
        let config = WorkerConfig::new().with_queue_capacity(2);
        let (feeder, handle) = spawn_worker(Arc::clone(&stage), &config).unwrap();

        // The worker task cannot run until this task yields.
        feeder.try_submit(1).unwrap();
        feeder.try_submit(2).unwrap();
        let err = feeder.try_submit(3).unwrap_err();
        assert!(matches!(err, WorkerError::QueueFull { capacity: 2, .. }));
        assert!(feeder.try_submit(4).is_err());
        assert_eq!(producer_rec.pauses(), 1);
        assert_eq!(feeder.queued(), 2);

        feeder.complete().await.unwrap();
        let report = handle.await.unwrap();

        assert_eq!(report.submitted, 2);
        assert_eq!(producer_rec.resumes(), 1);
        assert_eq!(stage.run_state(), RunState::Running);
    }

    #[tokio::test]
    async fn test_spawn_rejects_zero_capacity() {
        let stage: Arc<Stage<u32, u32>> = Stage::new("w", Passthrough);
        let config = WorkerConfig::new().with_queue_capacity(0);
        assert!(matches!(
            spawn_worker(stage, &config),
            Err(StageError::Config(_))
        ));
    }
}
