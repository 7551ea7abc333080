//! The interpreter core.
//!
//! # Key Components
//!
//! - [`AnalyzingContext`] - State of one run, executes instructions
//! - [`CallContext`] - One method activation
//! - [`DynamicCall`] - Deferred call waiting in a dynamic-call queue
//! - [`ExecutionStats`] / [`LimitExceeded`] - Counters and limit checks
//! - [`TraceWriter`] / [`TraceEvent`] - Optional event tracing

mod call;
mod context;
mod dynamic;
mod handlers;
mod stats;
mod trace;

pub use call::{CallContext, CallKind};
pub use context::{AnalyzingContext, CallResolution, ReturnSlot};
pub use dynamic::{DynamicCall, DynamicQueue};
pub use stats::{ExecutionStats, LimitExceeded};
pub use trace::{TraceCategories, TraceEvent, TraceWriter};
