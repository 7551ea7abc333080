//! Outcome of a run.

use std::fmt;

use rustc_hash::FxHashSet;

use crate::{
    analyzing::{
        engine::{ExecutionStats, LimitExceeded, TraceEvent},
        execution::{CallId, ExecutionTrace},
        Instance, InstanceHeap, InstanceRef, MethodId, NativeValue,
    },
    Error,
};

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The call stack emptied.
    Completed,
    /// A configured limit stopped the run.
    LimitReached(LimitExceeded),
    /// A fatal error stopped the run; see [`AnalyzingResult::error`].
    Failed,
}

impl RunOutcome {
    /// Returns `true` if the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::LimitReached(limit) => write!(f, "limit reached: {limit}"),
            RunOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Everything a run produced.
///
/// The result owns the heap and the execution trace, so instance handles and call
/// ids stay resolvable after the run.
#[derive(Debug)]
pub struct AnalyzingResult {
    /// Value returned by the entry call; `None` if it never returned.
    pub return_value: Option<InstanceRef>,
    /// The entry call; `None` if it could not be pushed.
    pub entry_context: Option<CallId>,
    /// Calls and blocks executed.
    pub trace: ExecutionTrace,
    /// All instances created.
    pub heap: InstanceHeap,
    /// Methods of all pushed calls, after resolution.
    pub uses: FxHashSet<MethodId>,
    /// The fatal error, if one was caught.
    pub error: Option<Error>,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Counters of the run.
    pub stats: ExecutionStats,
    /// Events of in-memory tracing; `None` when tracing was off or went to a file.
    pub trace_events: Option<Vec<TraceEvent>>,
}

impl AnalyzingResult {
    /// Returns `true` if the run completed without a caught error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_completed() && self.error.is_none()
    }

    /// Resolves an instance handle of this run.
    #[must_use]
    pub fn instance(&self, instance: InstanceRef) -> Option<&Instance> {
        self.heap.get(instance).ok()
    }

    /// The instance returned by the entry call.
    #[must_use]
    pub fn return_instance(&self) -> Option<&Instance> {
        self.return_value.and_then(|value| self.instance(value))
    }

    /// Native payload of the returned instance, if it is a direct instance.
    #[must_use]
    pub fn return_native(&self) -> Option<&NativeValue> {
        self.return_instance().and_then(Instance::direct_value)
    }
}
