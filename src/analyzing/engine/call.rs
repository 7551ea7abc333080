//! One method activation.

use std::{fmt, sync::Arc};

use rustc_hash::FxHashMap;

use crate::{
    analyzing::{
        engine::{context::ReturnSlot, dynamic::DynamicQueue},
        execution::{BlockId, CallId, ExecutedBlock},
        program::{CallTransformProvider, Instruction, InstructionBatch, Label},
        InstanceHeap, InstanceRef, MethodId, VariableName,
    },
    Error, Result,
};

/// Why a call frame was pushed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CallKind {
    /// Pushed by a call instruction, a native method or as the entry call.
    Regular,
    /// Drained from a dynamic-call queue.
    Dynamic,
    /// Initializer of a shared instance.
    SharedInitializer,
}

/// State of one method activation: program, instruction pointer, variables and
/// arguments, plus its position in the execution trace.
///
/// Call contexts are owned by the run's [`ExecutionTrace`](crate::analyzing::ExecutionTrace)
/// and stay there after they returned, so the trace can be inspected after the run.
pub struct CallContext {
    id: CallId,
    method: MethodId,
    program: InstructionBatch,
    pointer: usize,
    variables: FxHashMap<VariableName, InstanceRef>,
    arguments: Vec<InstanceRef>,
    entry_block: Option<BlockId>,
    current_block: Option<BlockId>,
    caller: Option<CallId>,
    transform: Option<Arc<dyn CallTransformProvider>>,
    kind: CallKind,
    pub(crate) own_dynamic_calls: DynamicQueue,
    pub(crate) following_dynamic_calls: DynamicQueue,
    /// Return slot of the interrupted caller, restored when a dynamic or
    /// initializer frame pops.
    pub(crate) saved_return: Option<ReturnSlot>,
}

impl CallContext {
    pub(crate) fn new(
        id: CallId,
        method: MethodId,
        program: InstructionBatch,
        arguments: Vec<InstanceRef>,
        caller: Option<CallId>,
        transform: Option<Arc<dyn CallTransformProvider>>,
        kind: CallKind,
    ) -> Self {
        CallContext {
            id,
            method,
            program,
            pointer: 0,
            variables: FxHashMap::default(),
            arguments,
            entry_block: None,
            current_block: None,
            caller,
            transform,
            kind,
            own_dynamic_calls: DynamicQueue::new(),
            following_dynamic_calls: DynamicQueue::new(),
            saved_return: None,
        }
    }

    /// Handle of this call.
    #[must_use]
    pub fn id(&self) -> CallId {
        self.id
    }

    /// The resolved method of this call.
    #[must_use]
    pub fn method(&self) -> &MethodId {
        &self.method
    }

    /// The program executed by this call.
    #[must_use]
    pub fn program(&self) -> &InstructionBatch {
        &self.program
    }

    /// Offset of the next instruction.
    #[must_use]
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Returns `true` once the pointer left the program.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pointer >= self.program.len()
    }

    /// Arguments passed to this call.
    #[must_use]
    pub fn arguments(&self) -> &[InstanceRef] {
        &self.arguments
    }

    /// First block executed in this call; `None` until an instruction ran.
    #[must_use]
    pub fn entry_block(&self) -> Option<BlockId> {
        self.entry_block
    }

    /// The block currently executing, or the last block of a finished call.
    #[must_use]
    pub fn current_block(&self) -> Option<BlockId> {
        self.current_block
    }

    /// The call that was on top of the stack when this call was pushed.
    #[must_use]
    pub fn caller(&self) -> Option<CallId> {
        self.caller
    }

    /// Editing hooks of the call site.
    #[must_use]
    pub fn transform(&self) -> Option<&Arc<dyn CallTransformProvider>> {
        self.transform.as_ref()
    }

    /// Why this call was pushed.
    #[must_use]
    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// Returns `true` if this call was drained from a dynamic-call queue.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.kind == CallKind::Dynamic
    }

    /// Variables of this call and the instances they hold.
    pub fn variables(&self) -> impl Iterator<Item = (&VariableName, InstanceRef)> {
        self.variables.iter().map(|(name, value)| (name, *value))
    }

    /// Dynamic calls enqueued by this call and not drained yet.
    #[must_use]
    pub fn pending_dynamic_calls(&self) -> usize {
        self.own_dynamic_calls.len() + self.following_dynamic_calls.len()
    }

    /// Returns the instruction at the pointer and advances it.
    ///
    /// Opens a new block in `blocks` whenever the instruction's info differs from the
    /// current block's info.
    pub fn next_instruction(&mut self, blocks: &mut Vec<ExecutedBlock>) -> Option<Instruction> {
        let offset = self.pointer;
        let emitted = self.program.get(offset)?;
        self.pointer += 1;

        let same_block = self
            .current_block
            .and_then(|id| blocks.get(id.0))
            .is_some_and(|block| *block.info() == emitted.info);

        if !same_block {
            let id = BlockId(blocks.len());
            if let Some(previous) = self.current_block.and_then(|id| blocks.get_mut(id.0)) {
                previous.set_next(id);
            }
            blocks.push(ExecutedBlock::new(
                id,
                self.id,
                emitted.info.clone(),
                self.current_block,
            ));
            self.current_block = Some(id);
            if self.entry_block.is_none() {
                self.entry_block = Some(id);
            }
        }

        if let Some(block) = self.current_block.and_then(|id| blocks.get_mut(id.0)) {
            block.record_offset(offset);
        }
        Some(emitted.instruction.clone())
    }

    /// Reads a variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndeclaredVariable`] if the variable was never assigned.
    pub fn get_value(&self, name: &VariableName) -> Result<InstanceRef> {
        self.variables
            .get(name)
            .copied()
            .ok_or_else(|| Error::UndeclaredVariable(name.clone()))
    }

    /// Returns `true` if the variable is assigned.
    #[must_use]
    pub fn contains(&self, name: &VariableName) -> bool {
        self.variables.contains_key(name)
    }

    /// Assigns a variable and records the scope transition on the current block.
    ///
    /// If the variable held a different instance before, that instance's scope ends;
    /// the new instance's scope starts and the block's removal hook is registered for
    /// it. Temporaries are assigned without being recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] if `value` does not belong to `heap`.
    pub fn set_value(
        &mut self,
        name: VariableName,
        value: InstanceRef,
        heap: &InstanceHeap,
        blocks: &mut [ExecutedBlock],
    ) -> Result<()> {
        heap.check(value)?;

        let old = self.variables.insert(name.clone(), value);
        if name.is_temporary() || old == Some(value) {
            return Ok(());
        }

        if let Some(block) = self.current_block.and_then(|id| blocks.get_mut(id.0)) {
            if let Some(old) = old {
                block.add_scope_end(old, name.clone());
            }
            block.add_scope_start(value, name);
            if let Some(provider) = block.info().remove_provider().cloned() {
                block.register_remove_provider(value, provider);
            }
        }
        Ok(())
    }

    /// Argument at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentOutOfBounds`] if the call has fewer arguments.
    pub fn argument(&self, index: usize) -> Result<InstanceRef> {
        self.arguments
            .get(index)
            .copied()
            .ok_or(Error::ArgumentOutOfBounds {
                index,
                count: self.arguments.len(),
            })
    }

    /// Moves the pointer to a label's offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnboundLabel`] if the label was never bound.
    pub fn jump(&mut self, label: &Label) -> Result<()> {
        self.pointer = label.target()?;
        Ok(())
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("pointer", &self.pointer)
            .field("arguments", &self.arguments)
            .field("kind", &self.kind)
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}
