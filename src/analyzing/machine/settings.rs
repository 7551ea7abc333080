use crate::analyzing::{AnalyzingConfig, Instance, MethodId, NativeValue, TypeDescriptor};

/// Settings boundary of a run.
///
/// Everything the interpreter needs to know about the simulated platform beyond
/// method resolution. [`AnalyzingConfig`] implements it with table-driven defaults;
/// hosts override single predicates by implementing the trait on their own type
/// and delegating [`MachineSettings::config`].
pub trait MachineSettings {
    /// Limits, error catching and tracing.
    fn config(&self) -> &AnalyzingConfig;

    /// Whether instances of `ty` are simulated as direct (native-wrapped) instances.
    fn is_direct_type(&self, ty: &TypeDescriptor) -> bool {
        self.config().is_direct_type(ty)
    }

    /// Whether a condition instance is true.
    ///
    /// By default direct instances use [`NativeValue::is_truthy`] and data
    /// instances, being non-null references, are true.
    fn is_true(&self, instance: &Instance) -> bool {
        instance.direct_value().is_none_or(NativeValue::is_truthy)
    }

    /// Initializer to call when the shared instance of `ty` is first created.
    fn shared_initializer(&self, ty: &TypeDescriptor) -> Option<MethodId> {
        self.config().shared_initializers.get(ty).cloned()
    }

    /// Payload of the canonical null instance.
    fn null_value(&self) -> NativeValue {
        NativeValue::Null
    }
}

impl MachineSettings for AnalyzingConfig {
    fn config(&self) -> &AnalyzingConfig {
        self
    }
}
