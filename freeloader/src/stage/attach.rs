//! Wiring a consumer onto a producer.

use super::links::{has_ancestor, Downstream, Upstream};
use super::Stage;
use crate::core::{RunState, Signal};
use crate::errors::{AttachmentError, AttachmentRejection};
use crate::events::EventKind;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

impl<I, O> Stage<I, O>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
{
    /// Attaches `self` as a consumer of `upstream`.
    ///
    /// Installs the terminate edge (producer to consumer) and the pause edge
    /// (consumer to producer) while both stages are locked, so no signal sees
    /// one edge without the other. A stage has at most one upstream.
    ///
    /// If `upstream` already completed, `self` receives `Complete` as soon as
    /// the edges are in place.
    pub fn attach<P>(self: &Arc<Self>, upstream: &Arc<Stage<P, I>>) -> Result<(), AttachmentError>
    where
        P: Send + 'static,
        I: Clone,
    {
        let reject = |reason: AttachmentRejection| {
            let err = AttachmentError::new(upstream.name(), self.name(), reason);
            warn!(producer = %err.producer, consumer = %err.consumer, reason = %err.reason, "attachment rejected");
            err
        };

        let producer: Arc<dyn Upstream> = upstream.clone();
        if has_ancestor(&producer, self.id) {
            return Err(reject(AttachmentRejection::Cycle));
        }

        let producer_completed = {
            // Lock in id order so concurrent attachments cannot deadlock.
            let (mut producer_links, mut consumer_links) = if upstream.id < self.id {
                let p = upstream.links.lock();
                let c = self.links.lock();
                (p, c)
            } else {
                let c = self.links.lock();
                let p = upstream.links.lock();
                (p, c)
            };

            if producer_links.state == RunState::Finished {
                return Err(reject(AttachmentRejection::ProducerFinished));
            }
            if consumer_links.state == RunState::Finished {
                return Err(reject(AttachmentRejection::ConsumerFinished));
            }
            if consumer_links.upstream.is_some() {
                let current = consumer_links
                    .upstream_name
                    .clone()
                    .unwrap_or_default();
                return Err(reject(AttachmentRejection::AlreadyAttached { current }));
            }

            let weak: Weak<dyn Upstream> = Arc::downgrade(&producer);
            consumer_links.upstream = Some(weak);
            consumer_links.upstream_name = Some(upstream.name().to_string());
            let consumer: Arc<dyn Downstream<I>> = self.clone();
            producer_links.downstream.push(consumer);
            producer_links.completed
        };

        debug!(producer = %upstream.name(), consumer = %self.name(), "attached");
        self.record(EventKind::Attached {
            upstream: upstream.name().to_string(),
        });

        if producer_completed {
            self.receive_downstream(Signal::Complete);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::RunState;
    use crate::errors::AttachmentRejection;
    use crate::stage::{Passthrough, Stage};
    use crate::testing::Recorder;
    use std::sync::Arc;

    fn stage(name: &str) -> Arc<Stage<u32, u32>> {
        Stage::new(name, Passthrough)
    }

    #[test]
    fn test_attach_wires_both_sides() {
        let a = stage("a");
        let b = stage("b");

        b.attach(&a).unwrap();

        assert_eq!(a.downstream_count(), 1);
        assert!(b.has_upstream());
        assert_eq!(b.upstream_name().as_deref(), Some("a"));
        assert!(!a.has_upstream());
    }

    #[test]
    fn test_attach_to_finished_producer_rejected() {
        let a = stage("a");
        let b = stage("b");
        a.terminate();

        let err = b.attach(&a).unwrap_err();

        assert_eq!(err.reason, AttachmentRejection::ProducerFinished);
        assert_eq!(a.downstream_count(), 0);
        assert!(!b.has_upstream());
        assert_eq!(b.run_state(), RunState::Running);
    }

    #[test]
    fn test_attach_finished_consumer_rejected() {
        let a = stage("a");
        let b = stage("b");
        b.terminate();

        let err = b.attach(&a).unwrap_err();

        assert_eq!(err.reason, AttachmentRejection::ConsumerFinished);
        assert_eq!(a.downstream_count(), 0);
        assert!(!b.has_upstream());
    }

    #[test]
    fn test_second_upstream_rejected() {
        let a = stage("a");
        let x = stage("x");
        let b = stage("b");
        b.attach(&a).unwrap();

        let err = b.attach(&x).unwrap_err();

        assert_eq!(
            err.reason,
            AttachmentRejection::AlreadyAttached {
                current: "a".to_string()
            }
        );
        assert_eq!(x.downstream_count(), 0);
        assert_eq!(a.downstream_count(), 1);
    }

    #[test]
    fn test_same_pair_twice_rejected() {
        let a = stage("a");
        let b = stage("b");
        b.attach(&a).unwrap();

        assert!(b.attach(&a).is_err());
        assert_eq!(a.downstream_count(), 1);
    }

    #[test]
    fn test_self_attach_rejected() {
        let a = stage("a");
        let err = a.attach(&a).unwrap_err();
        assert_eq!(err.reason, AttachmentRejection::Cycle);
    }

    #[test]
    fn test_cycle_rejected() {
        let a = stage("a");
        let b = stage("b");
        let c = stage("c");
        b.attach(&a).unwrap();
        c.attach(&b).unwrap();

        let err = a.attach(&c).unwrap_err();

        assert_eq!(err.reason, AttachmentRejection::Cycle);
        assert!(!a.has_upstream());
        assert_eq!(c.downstream_count(), 0);
    }

    #[test]
    fn test_attach_to_completed_producer_completes_consumer() {
        let a = stage("a");
        a.complete();
        let recorder = Recorder::<u32>::new();
        let b = Stage::new("b", recorder.handler());

        b.attach(&a).unwrap();

        assert!(b.is_completed());
        assert_eq!(recorder.completions(), 1);
    }

    #[test]
    fn test_consumer_does_not_keep_producer_alive() {
        let a = stage("a");
        let b = stage("b");
        b.attach(&a).unwrap();

        drop(a);

        // The weak back-reference is gone; pausing has nobody to notify.
        b.pause();
        assert_eq!(b.run_state(), RunState::Paused);
    }
}
