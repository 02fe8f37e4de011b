//! Edge endpoints stages use to reach their neighbours.
//!
//! A producer holds its consumers as `Arc<dyn Downstream<T>>`; a consumer
//! holds its producer as `Weak<dyn Upstream>`. Neither side sees the other's
//! handler types, only these signal and submit surfaces.

use crate::core::Signal;
use crate::errors::HandlerError;
use std::sync::Arc;
use uuid::Uuid;

/// The consumer side of an attachment edge.
pub(crate) trait Downstream<T>: Send + Sync {
    /// Delivers one item produced upstream.
    fn deliver(&self, item: T) -> Result<(), HandlerError>;

    /// Delivers a downstream-travelling signal (`Terminate`, `Complete`).
    fn receive_downstream(&self, signal: Signal);
}

/// The producer side of an attachment edge.
pub(crate) trait Upstream: Send + Sync {
    /// The producer's id.
    fn id(&self) -> Uuid;

    /// The producer's name.
    fn name(&self) -> &str;

    /// Delivers an upstream-travelling signal (`Pause`, `Resume`).
    fn receive_upstream(&self, signal: Signal);

    /// The producer's own upstream, if still alive.
    fn parent(&self) -> Option<Arc<dyn Upstream>>;
}

/// Returns true if `target` is `start` or one of its ancestors.
pub(crate) fn has_ancestor(start: &Arc<dyn Upstream>, target: Uuid) -> bool {
    let mut current = Some(Arc::clone(start));
    while let Some(node) = current {
        if node.id() == target {
            return true;
        }
        current = node.parent();
    }
    false
}
