//! Run counters and the resource limits checked against them.
//!
//! [`ExecutionStats`] counts instructions and call traffic of one run. The
//! [`Machine`](crate::analyzing::Machine) compares it with the configured
//! [`AnalyzingLimits`] whenever another instruction is about to execute. The call
//! depth and the instance count live in the context and are passed in.

use std::time::{Duration, Instant};

use crate::analyzing::AnalyzingLimits;

/// Counters of one run.
#[derive(Clone, Debug, Default)]
pub struct ExecutionStats {
    /// Instructions executed so far.
    pub instructions_executed: u64,

    /// Frames pushed, dynamic calls and initializers included.
    pub calls_pushed: u64,

    /// Frames popped, by return or by running off the end of their program.
    pub calls_popped: u64,

    /// Calls skipped as unresolved or tainted.
    pub calls_skipped: u64,

    /// Calls placed on a dynamic-call queue.
    pub dynamic_calls_enqueued: u64,

    started: Option<Instant>,
}

impl ExecutionStats {
    /// Zeroed counters; the clock starts with [`ExecutionStats::start`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the run clock used by the timeout.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Wall-clock time since [`ExecutionStats::start`], `None` before.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.started.map(|started| started.elapsed())
    }

    /// Returns `true` if every pushed frame was popped again.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.calls_pushed == self.calls_popped
    }

    /// Returns `true` once the instruction budget is used up.
    #[must_use]
    pub fn instruction_limit_exceeded(&self, limits: &AnalyzingLimits) -> bool {
        bounded(limits.max_instructions).is_some_and(|max| self.instructions_executed >= max)
    }

    /// Returns `true` once the run took longer than `timeout_ms`.
    #[must_use]
    pub fn timeout_exceeded(&self, limits: &AnalyzingLimits) -> bool {
        bounded(limits.timeout_ms).is_some_and(|ms| {
            self.elapsed()
                .is_some_and(|elapsed| elapsed >= Duration::from_millis(ms))
        })
    }

    /// First limit the run is past, in the order instructions, instances, call
    /// depth, timeout.
    ///
    /// The instance count and call depth may reach their maximum; only going
    /// beyond it is reported.
    #[must_use]
    pub fn check_limits(
        &self,
        limits: &AnalyzingLimits,
        call_depth: usize,
        instances: usize,
    ) -> Option<LimitExceeded> {
        if self.instruction_limit_exceeded(limits) {
            return Some(LimitExceeded::Instructions {
                executed: self.instructions_executed,
                limit: limits.max_instructions,
            });
        }
        if let Some(limit) = bounded(limits.max_instances).filter(|max| instances > *max) {
            return Some(LimitExceeded::Instances {
                created: instances,
                limit,
            });
        }
        if let Some(limit) = bounded(limits.max_call_depth).filter(|max| call_depth > *max) {
            return Some(LimitExceeded::CallDepth {
                depth: call_depth,
                limit,
            });
        }
        if self.timeout_exceeded(limits) {
            return Some(LimitExceeded::Timeout {
                elapsed: self.elapsed().unwrap_or_default(),
                limit: Duration::from_millis(limits.timeout_ms),
            });
        }
        None
    }
}

/// A limit of 0 is no limit.
fn bounded<T: Default + PartialEq>(limit: T) -> Option<T> {
    (limit != T::default()).then_some(limit)
}

/// The limit that stopped a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LimitExceeded {
    /// The instruction budget was used up.
    Instructions {
        /// Instructions executed.
        executed: u64,
        /// Configured `max_instructions`.
        limit: u64,
    },

    /// More instances were created than allowed.
    Instances {
        /// Instances created.
        created: usize,
        /// Configured `max_instances`.
        limit: usize,
    },

    /// The call stack grew deeper than allowed.
    CallDepth {
        /// Depth of the call stack.
        depth: usize,
        /// Configured `max_call_depth`.
        limit: usize,
    },

    /// The run took too long.
    Timeout {
        /// Wall-clock time of the run.
        elapsed: Duration,
        /// Configured `timeout_ms`.
        limit: Duration,
    },
}

impl std::fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitExceeded::Instructions { executed, limit } => {
                write!(f, "executed {executed} of {limit} allowed instructions")
            }
            LimitExceeded::Instances { created, limit } => {
                write!(f, "created {created} instances, {limit} allowed")
            }
            LimitExceeded::CallDepth { depth, limit } => {
                write!(f, "call depth {depth}, {limit} allowed")
            }
            LimitExceeded::Timeout { elapsed, limit } => {
                write!(f, "ran {elapsed:?}, timeout is {limit:?}")
            }
        }
    }
}
