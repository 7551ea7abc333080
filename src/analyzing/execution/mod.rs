//! Execution trace of one run.
//!
//! Every call frame ever pushed and every [`ExecutedBlock`] ever opened is kept in
//! the [`ExecutionTrace`] arena and addressed by [`CallId`] / [`BlockId`] handles.
//! The trace outlives the run inside the
//! [`AnalyzingResult`](crate::analyzing::AnalyzingResult) and answers the queries
//! of the editing layer:
//!
//! - which variables started or stopped holding an instance in a block,
//! - which calls were pushed from a block,
//! - how an instance can be removed from the source.

mod block;

use std::{fmt, sync::Arc};

pub use block::ExecutedBlock;

use crate::analyzing::{program::RemoveTransformProvider, CallContext, InstanceRef};

/// Handle of a [`CallContext`] in an [`ExecutionTrace`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub(crate) usize);

impl CallId {
    /// Position of the call in push order.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}

/// Handle of an [`ExecutedBlock`] in an [`ExecutionTrace`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Position of the block in execution order across all calls.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}

/// Arena of all call contexts and executed blocks of one run.
#[derive(Debug, Default)]
pub struct ExecutionTrace {
    pub(crate) calls: Vec<CallContext>,
    pub(crate) blocks: Vec<ExecutedBlock>,
}

impl ExecutionTrace {
    /// Creates an empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a call context.
    #[must_use]
    pub fn call(&self, id: CallId) -> Option<&CallContext> {
        self.calls.get(id.0)
    }

    /// Returns a block.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&ExecutedBlock> {
        self.blocks.get(id.0)
    }

    /// All call contexts in push order.
    pub fn calls(&self) -> std::slice::Iter<'_, CallContext> {
        self.calls.iter()
    }

    /// All blocks in the order they were opened.
    pub fn blocks(&self) -> std::slice::Iter<'_, ExecutedBlock> {
        self.blocks.iter()
    }

    /// Number of calls pushed during the run.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Number of blocks opened during the run.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Iterates over the block chain of a call, starting at its entry block.
    pub fn blocks_of(&self, call: CallId) -> BlockChain<'_> {
        BlockChain {
            trace: self,
            next: self.call(call).and_then(CallContext::entry_block),
        }
    }

    /// Blocks in which a variable started or stopped holding `instance`.
    pub fn blocks_touching(&self, instance: InstanceRef) -> impl Iterator<Item = &ExecutedBlock> {
        self.blocks.iter().filter(move |block| {
            !block.scope_starts(instance).is_empty() || !block.scope_ends(instance).is_empty()
        })
    }

    /// Removal hook for `instance` as seen from `block`.
    ///
    /// Calls pushed from the block are inspected first: if the instance was passed to
    /// one of them, an optional argument yields the call's argument removal hook and
    /// any other argument the removal hook of the whole call. Otherwise the hook
    /// registered when the instance was assigned in this block is returned.
    #[must_use]
    pub fn remove_provider(
        &self,
        block: BlockId,
        instance: InstanceRef,
    ) -> Option<Arc<dyn RemoveTransformProvider>> {
        let block = self.block(block)?;

        for nested in block.nested_calls() {
            let Some(call) = self.call(*nested) else {
                continue;
            };
            let Some(transform) = call.transform() else {
                continue;
            };
            if let Some(index) = call.arguments().iter().position(|arg| *arg == instance) {
                return if transform.is_optional_argument(index) {
                    transform.remove_argument(index)
                } else {
                    transform.remove()
                };
            }
        }

        block.assignment_remove_provider(instance).cloned()
    }

    pub(crate) fn push_call(&mut self, build: impl FnOnce(CallId) -> CallContext) -> CallId {
        let id = CallId(self.calls.len());
        self.calls.push(build(id));
        id
    }

    pub(crate) fn call_mut(&mut self, id: CallId) -> Option<&mut CallContext> {
        self.calls.get_mut(id.0)
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Option<&mut ExecutedBlock> {
        self.blocks.get_mut(id.0)
    }
}

/// Iterator over the blocks of one call, see [`ExecutionTrace::blocks_of`].
pub struct BlockChain<'a> {
    trace: &'a ExecutionTrace,
    next: Option<BlockId>,
}

impl<'a> Iterator for BlockChain<'a> {
    type Item = &'a ExecutedBlock;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.trace.block(self.next?)?;
        self.next = block.next();
        Some(block)
    }
}
