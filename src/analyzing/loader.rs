//! Resolution of methods to generators.
//!
//! The [`Loader`] is the boundary between the interpreter and whatever knows the
//! analysed code base: it maps statically known methods to generators, resolves
//! virtual calls against argument types and may replace single call sites.
//! [`MethodTable`] is a table-driven implementation for hosts that know all
//! methods up front, and for tests.

use rustc_hash::FxHashMap;

use crate::analyzing::{Generator, Instance, MethodId, TypeDescriptor};

/// Pluggable method resolution consumed by the interpreter.
///
/// Not finding a method is not an error: returning `None` makes the interpreter
/// skip the call and mark its arguments dirty.
pub trait Loader {
    /// Resolves a statically known method to its generator.
    fn static_resolve(&self, method: &MethodId) -> Option<Generator>;

    /// Resolves a virtual method against the runtime types of the call's arguments.
    ///
    /// # Arguments
    ///
    /// * `method` - The virtual method, [`MethodId::needs_dynamic_resolution`] is set
    /// * `argument_types` - Types of all arguments, the receiver first
    ///
    /// # Returns
    ///
    /// The concrete method to call, or `None` if no implementation is known.
    fn dynamic_resolve(
        &self,
        method: &MethodId,
        argument_types: &[TypeDescriptor],
    ) -> Option<MethodId>;

    /// Replaces the generator for one call site, bypassing resolution and caching.
    ///
    /// The default implementation never overrides.
    fn overriding_generator(
        &self,
        _method: &MethodId,
        _arguments: &[&Instance],
    ) -> Option<Generator> {
        None
    }
}

/// Table-driven [`Loader`].
///
/// # Example
///
/// ```rust
/// use dotsim::analyzing::{Generator, Loader, MethodId, MethodTable, TypeDescriptor};
///
/// let mut table = MethodTable::new();
/// table.add_method(MethodId::new("A.Area"), Generator::new(|e| { e.return_void(); Ok(()) }));
/// table.add_virtual("Shape.Area", TypeDescriptor::new("A"), MethodId::new("A.Area"));
///
/// let resolved = table.dynamic_resolve(
///     &MethodId::dynamic("Shape.Area"),
///     &[TypeDescriptor::new("A")],
/// );
/// assert_eq!(resolved, Some(MethodId::new("A.Area")));
/// ```
#[derive(Clone, Debug, Default)]
pub struct MethodTable {
    methods: FxHashMap<MethodId, Generator>,
    virtuals: FxHashMap<(String, TypeDescriptor), MethodId>,
    overrides: FxHashMap<MethodId, Generator>,
}

impl MethodTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the generator of a statically resolvable method.
    pub fn add_method(&mut self, method: MethodId, generator: Generator) {
        self.methods.insert(method, generator);
    }

    /// Registers the implementation of virtual method `name` for a receiver type.
    pub fn add_virtual(&mut self, name: &str, receiver: TypeDescriptor, target: MethodId) {
        self.virtuals.insert((name.to_string(), receiver), target);
    }

    /// Replaces every call site of `method` with `generator`.
    pub fn add_override(&mut self, method: MethodId, generator: Generator) {
        self.overrides.insert(method, generator);
    }

    /// Builder form of [`MethodTable::add_method`].
    #[must_use]
    pub fn with_method(mut self, method: MethodId, generator: Generator) -> Self {
        self.add_method(method, generator);
        self
    }

    /// Builder form of [`MethodTable::add_virtual`].
    #[must_use]
    pub fn with_virtual(mut self, name: &str, receiver: TypeDescriptor, target: MethodId) -> Self {
        self.add_virtual(name, receiver, target);
        self
    }

    /// Builder form of [`MethodTable::add_override`].
    #[must_use]
    pub fn with_override(mut self, method: MethodId, generator: Generator) -> Self {
        self.add_override(method, generator);
        self
    }

    /// Number of statically registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns `true` if no method is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl Loader for MethodTable {
    fn static_resolve(&self, method: &MethodId) -> Option<Generator> {
        self.methods.get(method).cloned()
    }

    fn dynamic_resolve(
        &self,
        method: &MethodId,
        argument_types: &[TypeDescriptor],
    ) -> Option<MethodId> {
        let receiver = argument_types.first()?;
        self.virtuals
            .get(&(method.name().to_string(), receiver.clone()))
            .cloned()
    }

    fn overriding_generator(
        &self,
        method: &MethodId,
        _arguments: &[&Instance],
    ) -> Option<Generator> {
        self.overrides.get(method).cloned()
    }
}
