//! Best-effort interpreter for IAL method bodies.
//!
//! This module simulates method bodies written in IAL, a small stack-free
//! intermediate language whose operands are named variables. The interpreter is
//! built for analysing and editing source code rather than for running programs:
//! calls it cannot simulate are skipped and every value they could have touched is
//! marked *dirty*, and every run leaves behind a block-granular
//! [`ExecutionTrace`] recording which variables held which instances where.
//!
//! # Architecture
//!
//! - Instance model: identity-bearing values with a monotonic dirty flag
//! - Program model: immutable instruction batches, produced by an [`Emitter`]
//!   behind a cached [`Generator`]
//! - Boundaries: a [`Loader`] resolving methods and [`MachineSettings`] describing
//!   the simulated platform
//! - Engine: [`AnalyzingContext`] with call frames, dynamic-call chaining and the
//!   execution trace
//! - Driver: [`Machine`] running an entry method into an [`AnalyzingResult`]
//!
//! # Key Components
//!
//! ## Naming
//! - [`MethodId`] - Method name plus a dynamic-resolution flag
//! - [`VariableName`] - Variable of a call frame
//! - [`TypeDescriptor`] - Full name of a type
//!
//! ## Values
//! - [`Instance`] / [`InstanceKind`] - Direct (native-wrapped) or data instances
//! - [`NativeValue`] - Payload of direct instances
//! - [`InstanceHeap`] / [`InstanceRef`] - Run-local arena and handles
//!
//! ## Programs
//! - [`Emitter`] - Builds programs
//! - [`Generator`] - Cached program of one method
//! - [`program::Instruction`] - The IAL instruction set
//! - [`DirectMethod`] - Native method invoked from IAL
//!
//! ## Running
//! - [`Machine`] - Runs an entry method
//! - [`AnalyzingConfig`] - Limits, error catching and tracing
//! - [`AnalyzingResult`] - Return value, heap and trace of a run
//!
//! # Usage Examples
//!
//! ```rust
//! use dotsim::analyzing::{AnalyzingConfig, Generator, Machine, MethodId, MethodTable, NativeValue};
//!
//! let loader = MethodTable::new().with_method(
//!     MethodId::new("Sample.Answer"),
//!     Generator::new(|e| {
//!         e.assign_literal("x", 42);
//!         e.return_value("x");
//!         Ok(())
//!     }),
//! );
//!
//! let result = Machine::<AnalyzingConfig>::default().run(&loader, &MethodId::new("Sample.Answer"), &[])?;
//! assert!(result.is_success());
//! assert_eq!(result.return_native(), Some(&NativeValue::Int(42)));
//! # Ok::<(), dotsim::Error>(())
//! ```

mod emitter;
mod engine;
pub mod execution;
mod generator;
mod loader;
mod machine;
mod naming;
pub mod program;
pub mod value;

pub use emitter::Emitter;
pub use engine::{
    AnalyzingContext, CallContext, CallKind, CallResolution, DynamicCall, DynamicQueue,
    ExecutionStats, LimitExceeded, ReturnSlot, TraceCategories, TraceEvent, TraceWriter,
};
pub use execution::{BlockId, CallId, ExecutedBlock, ExecutionTrace};
pub use generator::Generator;
pub use loader::{Loader, MethodTable};
pub use machine::{
    AnalyzingConfig, AnalyzingLimits, AnalyzingResult, Machine, MachineSettings, RunOutcome,
    TracingConfig, DEFAULT_DIRECT_TYPES,
};
pub use naming::{MethodId, TypeDescriptor, VariableName, TEMPORARY_PREFIX};
pub use program::{DirectMethod, Instruction, InstructionInfo, Label};
pub use value::{Edit, Instance, InstanceHeap, InstanceKind, InstanceRef, NativeValue};
