//! Program representation of the interpreter.
//!
//! A method body is an immutable [`InstructionBatch`] of IAL [`Instruction`]s,
//! produced once by an [`Emitter`](crate::analyzing::Emitter) and shared by every
//! call of the method. Instructions are grouped into blocks through their
//! [`InstructionInfo`], jumps target [`Label`]s bound to offsets, and call
//! instructions may carry [`CallTransformProvider`] hooks for the editing layer.

mod info;
mod instruction;
mod label;
mod provider;

use std::{fmt, ops::Index, sync::Arc};

pub use info::InstructionInfo;
pub use instruction::{CallSite, DirectMethod, EmittedInstruction, Instruction, NativeMethod};
pub use label::Label;
pub use provider::{
    CallRemoval, CallTransformProvider, DescribedRemoval, RemoveTransformProvider,
};

/// Finished, immutable program of one method.
///
/// Cloning a batch is cheap; clones share the same instructions.
#[derive(Clone)]
pub struct InstructionBatch(Arc<[EmittedInstruction]>);

impl InstructionBatch {
    pub(crate) fn new(instructions: Vec<EmittedInstruction>) -> Self {
        InstructionBatch(Arc::from(instructions))
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for a program without instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Instruction at `offset`.
    #[must_use]
    pub fn get(&self, offset: usize) -> Option<&EmittedInstruction> {
        self.0.get(offset)
    }

    /// Iterates over all instructions in program order.
    pub fn iter(&self) -> std::slice::Iter<'_, EmittedInstruction> {
        self.0.iter()
    }

    /// Returns `true` if both batches share the same instructions.
    #[must_use]
    pub fn ptr_eq(&self, other: &InstructionBatch) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Index<usize> for InstructionBatch {
    type Output = EmittedInstruction;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl fmt::Debug for InstructionBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|emitted| &emitted.instruction))
            .finish()
    }
}

impl fmt::Display for InstructionBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (offset, emitted) in self.0.iter().enumerate() {
            writeln!(f, "{offset:04}: {}", emitted.instruction)?;
        }
        Ok(())
    }
}
