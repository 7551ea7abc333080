//! Driving a run: configuration, the settings boundary and the result.

mod config;
#[allow(clippy::module_inception)]
mod machine;
mod result;
mod settings;

pub use config::{AnalyzingConfig, AnalyzingLimits, TracingConfig, DEFAULT_DIRECT_TYPES};
pub use machine::Machine;
pub use result::{AnalyzingResult, RunOutcome};
pub use settings::MachineSettings;
