//! # dotsim Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dotsim library. Import this module to get quick access to the essential
//! types for building and running IAL programs.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotsim operations
pub use crate::Error;

/// The result type used throughout dotsim
pub use crate::Result;

// ================================================================================================
// Naming and Values
// ================================================================================================

/// Identity types for methods, variables and types
pub use crate::analyzing::{MethodId, TypeDescriptor, VariableName};

/// Instance model
pub use crate::analyzing::{Instance, InstanceKind, InstanceRef, NativeValue};

// ================================================================================================
// Programs
// ================================================================================================

/// Program construction
pub use crate::analyzing::{DirectMethod, Emitter, Generator, InstructionInfo, Label};

/// Editing hooks attached to instructions
pub use crate::analyzing::program::{
    CallRemoval, CallTransformProvider, DescribedRemoval, RemoveTransformProvider,
};

// ================================================================================================
// Running
// ================================================================================================

/// Boundaries of the interpreter
pub use crate::analyzing::{Loader, MachineSettings, MethodTable};

/// Driving a run and inspecting its outcome
pub use crate::analyzing::{
    AnalyzingConfig, AnalyzingContext, AnalyzingLimits, AnalyzingResult, Machine, RunOutcome,
    TracingConfig,
};

/// Execution trace
pub use crate::analyzing::{BlockId, CallId, ExecutedBlock, ExecutionTrace};
