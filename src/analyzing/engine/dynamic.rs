//! Deferred dynamic calls.
//!
//! Code running inside a call can enqueue *dynamic calls* which must run after the
//! enqueuing call and everything it pushed have completed. Each frame keeps two
//! persistent queues: the calls it enqueued itself and the calls it inherited when
//! it was pushed from a queue. Draining is depth first and in enqueue order: a
//! frame's own calls always run before calls queued before the frame existed.

use imbl::Vector;

use crate::analyzing::{execution::BlockId, Generator, InstanceRef, MethodId};

/// A call waiting in a dynamic-call queue.
#[derive(Clone, Debug)]
pub struct DynamicCall {
    /// Method to call
    pub method: MethodId,
    /// Generator to use; resolved through the loader when `None`
    pub generator: Option<Generator>,
    /// Arguments of the call
    pub arguments: Vec<InstanceRef>,
    /// Block that was executing when the call was enqueued
    pub origin: Option<BlockId>,
}

/// Persistent FIFO of dynamic calls; clones share structure and never alias.
pub type DynamicQueue = Vector<DynamicCall>;

/// Selects the next dynamic call after a frame with the given queues was popped.
///
/// Returns the call to push and the queue the pushed frame inherits: the rest of
/// the own queue followed by the inherited queue, or the rest of the inherited
/// queue if the frame enqueued nothing.
pub(crate) fn next_chained(
    own: &DynamicQueue,
    following: &DynamicQueue,
) -> Option<(DynamicCall, DynamicQueue)> {
    if let Some(first) = own.head() {
        let mut rest = own.skip(1);
        rest.append(following.clone());
        Some((first.clone(), rest))
    } else {
        following
            .head()
            .map(|first| (first.clone(), following.skip(1)))
    }
}
