use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::analyzing::{
    execution::{BlockId, CallId},
    program::{InstructionInfo, RemoveTransformProvider},
    InstanceRef, VariableName,
};

/// A contiguous run of executed instructions of one call sharing the same
/// [`InstructionInfo`].
///
/// Blocks of a call are chained through [`ExecutedBlock::previous`] and
/// [`ExecutedBlock::next`] in execution order. A loop executing the same statement
/// twice produces two blocks with equal infos.
#[derive(Clone, Debug)]
pub struct ExecutedBlock {
    id: BlockId,
    call: CallId,
    info: InstructionInfo,
    offsets: Vec<usize>,
    scope_starts: FxHashMap<InstanceRef, Vec<VariableName>>,
    scope_ends: FxHashMap<InstanceRef, Vec<VariableName>>,
    nested_calls: Vec<CallId>,
    remove_providers: FxHashMap<InstanceRef, Arc<dyn RemoveTransformProvider>>,
    previous: Option<BlockId>,
    next: Option<BlockId>,
}

impl ExecutedBlock {
    pub(crate) fn new(
        id: BlockId,
        call: CallId,
        info: InstructionInfo,
        previous: Option<BlockId>,
    ) -> Self {
        ExecutedBlock {
            id,
            call,
            info,
            offsets: Vec::new(),
            scope_starts: FxHashMap::default(),
            scope_ends: FxHashMap::default(),
            nested_calls: Vec::new(),
            remove_providers: FxHashMap::default(),
            previous,
            next: None,
        }
    }

    /// Handle of this block.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// The call this block was executed in.
    #[must_use]
    pub fn call(&self) -> CallId {
        self.call
    }

    /// The block identity shared by all instructions of this block.
    #[must_use]
    pub fn info(&self) -> &InstructionInfo {
        &self.info
    }

    /// Program offsets executed in this block, in execution order.
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Variables that started holding `instance` in this block.
    #[must_use]
    pub fn scope_starts(&self, instance: InstanceRef) -> &[VariableName] {
        self.scope_starts.get(&instance).map_or(&[], Vec::as_slice)
    }

    /// Variables that stopped holding `instance` in this block.
    #[must_use]
    pub fn scope_ends(&self, instance: InstanceRef) -> &[VariableName] {
        self.scope_ends.get(&instance).map_or(&[], Vec::as_slice)
    }

    /// Instances which started a scope in this block.
    pub fn started_instances(&self) -> impl Iterator<Item = InstanceRef> + '_ {
        self.scope_starts.keys().copied()
    }

    /// Instances which ended a scope in this block.
    pub fn ended_instances(&self) -> impl Iterator<Item = InstanceRef> + '_ {
        self.scope_ends.keys().copied()
    }

    /// Calls pushed while this block was executing.
    #[must_use]
    pub fn nested_calls(&self) -> &[CallId] {
        &self.nested_calls
    }

    /// Assignment-based removal hook registered for `instance`.
    #[must_use]
    pub fn assignment_remove_provider(
        &self,
        instance: InstanceRef,
    ) -> Option<&Arc<dyn RemoveTransformProvider>> {
        self.remove_providers.get(&instance)
    }

    /// Previous block of the same call.
    #[must_use]
    pub fn previous(&self) -> Option<BlockId> {
        self.previous
    }

    /// Next block of the same call.
    #[must_use]
    pub fn next(&self) -> Option<BlockId> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: BlockId) {
        self.next = Some(next);
    }

    pub(crate) fn record_offset(&mut self, offset: usize) {
        self.offsets.push(offset);
    }

    pub(crate) fn add_scope_start(&mut self, instance: InstanceRef, variable: VariableName) {
        self.scope_starts.entry(instance).or_default().push(variable);
    }

    pub(crate) fn add_scope_end(&mut self, instance: InstanceRef, variable: VariableName) {
        self.scope_ends.entry(instance).or_default().push(variable);
    }

    pub(crate) fn add_nested_call(&mut self, call: CallId) {
        self.nested_calls.push(call);
    }

    pub(crate) fn register_remove_provider(
        &mut self,
        instance: InstanceRef,
        provider: Arc<dyn RemoveTransformProvider>,
    ) {
        self.remove_providers.insert(instance, provider);
    }
}
