//! Run configuration.
//!
//! # Overview
//!
//! - [`AnalyzingConfig`] - Top-level configuration container
//! - [`AnalyzingLimits`] - Resource limits checked before every instruction
//! - [`TracingConfig`] - Event tracing options
//!
//! # Configuration Presets
//!
//! - [`AnalyzingConfig::analysis()`] - Interactive analysis, errors reported in the result
//! - [`AnalyzingConfig::strict()`] - Errors propagate, tight limits, for tests and tooling
//! - [`AnalyzingConfig::minimal()`] - Short evaluations such as constant folding
//!
//! # Example
//!
//! ```rust
//! use dotsim::analyzing::{AnalyzingConfig, AnalyzingLimits};
//!
//! let config = AnalyzingConfig {
//!     limits: AnalyzingLimits::new()
//!         .with_max_instructions(100_000)
//!         .with_timeout_ms(5_000),
//!     catch_exceptions: false,
//!     ..AnalyzingConfig::analysis()
//! };
//! assert_eq!(config.limits.max_instructions, 100_000);
//! ```

use std::path::PathBuf;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::analyzing::{MethodId, TraceCategories, TypeDescriptor};

/// Full names of the types which are simulated as direct instances by default.
pub const DEFAULT_DIRECT_TYPES: &[&str] = &[
    "System.Boolean",
    "System.Char",
    "System.SByte",
    "System.Byte",
    "System.Int16",
    "System.UInt16",
    "System.Int32",
    "System.UInt32",
    "System.Int64",
    "System.UInt64",
    "System.Single",
    "System.Double",
    "System.Decimal",
    "System.String",
    "System.IntPtr",
    "System.UIntPtr",
];

/// Configuration of an analyzing run.
///
/// # Default Configuration
///
/// - 10 million instruction limit
/// - 1 million instance limit
/// - 1000 call depth limit
/// - 60 second timeout
/// - Errors are caught and reported in the result
/// - No event tracing
#[derive(Clone, Debug)]
pub struct AnalyzingConfig {
    /// Execution limits controlling resource usage.
    pub limits: AnalyzingLimits,

    /// Whether fatal errors are stored in the result instead of being returned.
    ///
    /// When set, a failing run still yields its partial trace with
    /// [`RunOutcome::Failed`](crate::analyzing::RunOutcome::Failed).
    pub catch_exceptions: bool,

    /// Event tracing configuration.
    pub tracing: TracingConfig,

    /// Types simulated as direct (native-wrapped) instances.
    pub direct_types: FxHashSet<TypeDescriptor>,

    /// Initializer methods of shared instances, called once per run with the shared
    /// instance as only argument.
    pub shared_initializers: FxHashMap<TypeDescriptor, MethodId>,
}

/// Limits for a run.
///
/// When any limit is reached, the run stops with
/// [`RunOutcome::LimitReached`](crate::analyzing::RunOutcome::LimitReached).
///
/// # Default Values
///
/// | Limit | Default Value |
/// |-------|---------------|
/// | `max_instructions` | 10,000,000 |
/// | `max_instances` | 1,000,000 |
/// | `max_call_depth` | 1,000 |
/// | `timeout_ms` | 60,000 (1 minute) |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalyzingLimits {
    /// Maximum instructions to execute, 0 for unlimited.
    pub max_instructions: u64,

    /// Maximum number of instances created, 0 for unlimited.
    pub max_instances: usize,

    /// Maximum call stack depth, 0 for unlimited.
    pub max_call_depth: usize,

    /// Timeout in milliseconds, 0 for no timeout.
    pub timeout_ms: u64,
}

/// Event tracing configuration.
///
/// Tracing is independent of the execution trace every run builds. It streams
/// [`TraceEvent`](crate::analyzing::TraceEvent)s for debugging, either into an
/// NDJSON file or into a bounded in-memory buffer returned with the result.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Categories of events to record. Empty disables tracing.
    pub categories: TraceCategories,

    /// Maximum trace entries to keep in memory.
    ///
    /// Set to 0 for unlimited. When exceeded, oldest entries are discarded.
    /// Ignored when `output_path` is set.
    pub max_trace_entries: usize,

    /// Output file path for trace events, appended to as one JSON object per line.
    pub output_path: Option<PathBuf>,

    /// Context prefix included in each event written to a file.
    pub context_prefix: Option<String>,
}

impl Default for AnalyzingConfig {
    fn default() -> Self {
        Self {
            limits: AnalyzingLimits::default(),
            catch_exceptions: true,
            tracing: TracingConfig::default(),
            direct_types: DEFAULT_DIRECT_TYPES
                .iter()
                .map(|name| TypeDescriptor::new(name))
                .collect(),
            shared_initializers: FxHashMap::default(),
        }
    }
}

impl Default for AnalyzingLimits {
    fn default() -> Self {
        Self {
            max_instructions: 10_000_000,
            max_instances: 1_000_000,
            max_call_depth: 1000,
            timeout_ms: 60_000, // 1 minute
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            categories: TraceCategories::empty(),
            max_trace_entries: 10_000,
            output_path: None,
            context_prefix: None,
        }
    }
}

/// Preset configurations for common use cases.
impl AnalyzingConfig {
    /// Configuration for interactive analysis of user code.
    ///
    /// # Settings
    ///
    /// - **Instruction limit**: 1 million
    /// - **Timeout**: 10 seconds
    /// - **Errors**: caught and reported in the result
    #[must_use]
    pub fn analysis() -> Self {
        Self {
            limits: AnalyzingLimits {
                max_instructions: 1_000_000,
                timeout_ms: 10_000,
                ..Default::default()
            },
            catch_exceptions: true,
            ..Default::default()
        }
    }

    /// Configuration for tests and tooling where errors must surface.
    ///
    /// # Settings
    ///
    /// - **Instruction limit**: 100,000
    /// - **Call depth**: 256
    /// - **Errors**: returned to the caller
    #[must_use]
    pub fn strict() -> Self {
        Self {
            limits: AnalyzingLimits {
                max_instructions: 100_000,
                max_call_depth: 256,
                ..Default::default()
            },
            catch_exceptions: false,
            ..Default::default()
        }
    }

    /// Minimal configuration for short evaluations.
    ///
    /// # Settings
    ///
    /// - **Instruction limit**: 10,000
    /// - **Instance limit**: 10,000
    /// - **Call depth**: 16
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            limits: AnalyzingLimits {
                max_instructions: 10_000,
                max_instances: 10_000,
                max_call_depth: 16,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Sets the limits.
    #[must_use]
    pub fn with_limits(mut self, limits: AnalyzingLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the tracing configuration.
    #[must_use]
    pub fn with_tracing(mut self, tracing: TracingConfig) -> Self {
        self.tracing = tracing;
        self
    }

    /// Sets whether fatal errors are caught.
    #[must_use]
    pub fn with_catch_exceptions(mut self, catch: bool) -> Self {
        self.catch_exceptions = catch;
        self
    }

    /// Adds a type simulated as direct instance.
    #[must_use]
    pub fn with_direct_type(mut self, ty: TypeDescriptor) -> Self {
        self.direct_types.insert(ty);
        self
    }

    /// Registers the initializer of a shared instance type.
    #[must_use]
    pub fn with_shared_initializer(mut self, ty: TypeDescriptor, initializer: MethodId) -> Self {
        self.shared_initializers.insert(ty, initializer);
        self
    }

    /// Returns `true` if instances of `ty` are simulated as direct instances.
    #[must_use]
    pub fn is_direct_type(&self, ty: &TypeDescriptor) -> bool {
        self.direct_types.contains(ty)
    }
}

/// Builder methods for [`AnalyzingLimits`].
impl AnalyzingLimits {
    /// Creates new limits with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits without any bound. Use with care, runs may not terminate.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_instructions: 0,
            max_instances: 0,
            max_call_depth: 0,
            timeout_ms: 0,
        }
    }

    /// Sets the maximum instruction count.
    ///
    /// # Arguments
    ///
    /// * `max` - Maximum instructions to execute (0 for unlimited)
    #[must_use]
    pub fn with_max_instructions(mut self, max: u64) -> Self {
        self.max_instructions = max;
        self
    }

    /// Sets the maximum number of instances.
    ///
    /// # Arguments
    ///
    /// * `max` - Maximum instances created during the run (0 for unlimited)
    #[must_use]
    pub fn with_max_instances(mut self, max: usize) -> Self {
        self.max_instances = max;
        self
    }

    /// Sets the maximum call stack depth.
    ///
    /// # Arguments
    ///
    /// * `max` - Maximum nested calls (0 for unlimited)
    #[must_use]
    pub fn with_max_call_depth(mut self, max: usize) -> Self {
        self.max_call_depth = max;
        self
    }

    /// Sets the execution timeout in milliseconds.
    ///
    /// # Arguments
    ///
    /// * `ms` - Timeout in milliseconds (0 for no timeout)
    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }
}

impl TracingConfig {
    /// Traces all categories into a file.
    #[must_use]
    pub fn full_trace<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            categories: TraceCategories::all(),
            max_trace_entries: 0,
            output_path: Some(path.into()),
            context_prefix: None,
        }
    }

    /// Traces calls, dynamic calls and taint into a file, but no single instructions.
    #[must_use]
    pub fn call_trace<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            categories: TraceCategories::all() - TraceCategories::INSTRUCTIONS,
            ..Self::full_trace(path)
        }
    }

    /// Traces the given categories into memory.
    #[must_use]
    pub fn memory(categories: TraceCategories, max_trace_entries: usize) -> Self {
        Self {
            categories,
            max_trace_entries,
            output_path: None,
            context_prefix: None,
        }
    }

    /// Sets the context prefix for trace events.
    #[must_use]
    pub fn with_context(mut self, prefix: impl Into<String>) -> Self {
        self.context_prefix = Some(prefix.into());
        self
    }

    /// Checks if any tracing is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.categories.is_empty()
    }

    /// Checks if file-based tracing is configured.
    #[must_use]
    pub fn has_output_file(&self) -> bool {
        self.output_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalyzingConfig::default();

        assert_eq!(config.limits.max_instructions, 10_000_000);
        assert!(config.catch_exceptions);
        assert!(!config.tracing.is_enabled());
        assert!(config.is_direct_type(&TypeDescriptor::new("System.String")));
        assert!(!config.is_direct_type(&TypeDescriptor::new("Sample.Point")));
    }

    #[test]
    fn test_presets() {
        assert!(!AnalyzingConfig::strict().catch_exceptions);
        assert_eq!(AnalyzingConfig::minimal().limits.max_call_depth, 16);
        assert_eq!(AnalyzingConfig::analysis().limits.timeout_ms, 10_000);
    }

    #[test]
    fn test_limits_builder() {
        let limits = AnalyzingLimits::new()
            .with_max_instructions(5)
            .with_max_instances(6)
            .with_max_call_depth(7)
            .with_timeout_ms(8);

        assert_eq!(limits.max_instructions, 5);
        assert_eq!(limits.max_instances, 6);
        assert_eq!(limits.max_call_depth, 7);
        assert_eq!(limits.timeout_ms, 8);
        assert_eq!(AnalyzingLimits::unlimited().max_instructions, 0);
    }

    #[test]
    fn test_tracing_presets() {
        let calls = TracingConfig::call_trace("trace.ndjson").with_context("run-1");

        assert!(calls.is_enabled());
        assert!(calls.has_output_file());
        assert!(!calls.categories.contains(TraceCategories::INSTRUCTIONS));
        assert_eq!(calls.context_prefix.as_deref(), Some("run-1"));

        let memory = TracingConfig::memory(TraceCategories::TAINT, 10);
        assert!(!memory.has_output_file());
    }

    #[test]
    fn test_config_builders() {
        let config = AnalyzingConfig::default()
            .with_direct_type(TypeDescriptor::new("System.Text.StringBuilder"))
            .with_shared_initializer(
                TypeDescriptor::new("Program"),
                MethodId::new("Program..cctor"),
            )
            .with_catch_exceptions(false);

        assert!(config.is_direct_type(&TypeDescriptor::new("System.Text.StringBuilder")));
        assert_eq!(config.shared_initializers.len(), 1);
        assert!(!config.catch_exceptions);
    }
}
