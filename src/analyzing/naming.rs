//! Identity types used to address methods, variables and types.
//!
//! All three types are cheap to clone (they share an `Arc<str>`) and compare by
//! value, so they can be used directly as hash map keys across call frames, the
//! generator cache and the execution trace.

use std::{fmt, sync::Arc};

/// Reserved prefix of emitter-generated temporary variables.
///
/// Temporaries are an implementation detail of method-body producers. The
/// execution trace does not record scope transitions for them.
pub const TEMPORARY_PREFIX: &str = "$tmp";

/// Identifies a method that can be called by the interpreter.
///
/// A `MethodId` is a plain name plus a flag telling whether the method needs
/// dynamic (virtual) resolution against the runtime types of its arguments before
/// a generator can be looked up. Two ids are equal iff both name and flag match.
///
/// # Example
///
/// ```rust
/// use dotsim::analyzing::MethodId;
///
/// let stat = MethodId::new("Math.Add");
/// let virt = MethodId::dynamic("Shape.Area");
///
/// assert!(!stat.needs_dynamic_resolution());
/// assert!(virt.needs_dynamic_resolution());
/// assert_ne!(MethodId::new("Shape.Area"), virt);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId {
    name: Arc<str>,
    needs_dynamic_resolution: bool,
}

impl MethodId {
    /// Creates a statically resolved method id.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        MethodId {
            name: Arc::from(name.as_ref()),
            needs_dynamic_resolution: false,
        }
    }

    /// Creates a method id which is resolved against argument types at call time.
    #[must_use]
    pub fn dynamic(name: impl AsRef<str>) -> Self {
        MethodId {
            name: Arc::from(name.as_ref()),
            needs_dynamic_resolution: true,
        }
    }

    /// Returns the method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the method is virtual and must be dynamically resolved.
    #[must_use]
    pub fn needs_dynamic_resolution(&self) -> bool {
        self.needs_dynamic_resolution
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.needs_dynamic_resolution {
            write!(f, "virtual {}", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

impl fmt::Debug for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodId({self})")
    }
}

/// Name of a variable within one call frame (or of a global).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableName(Arc<str>);

impl VariableName {
    /// Creates a variable name.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        VariableName(Arc::from(name.as_ref()))
    }

    /// Returns the underlying name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Returns `true` for emitter-generated temporaries.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }
}

impl fmt::Display for VariableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for VariableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl From<&str> for VariableName {
    fn from(value: &str) -> Self {
        VariableName::new(value)
    }
}

impl From<String> for VariableName {
    fn from(value: String) -> Self {
        VariableName(Arc::from(value))
    }
}

/// Runtime type tag of an instance, identified by its full type name.
///
/// Type descriptors drive virtual dispatch: for dynamically resolved calls the
/// descriptors of all arguments are handed to the loader.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDescriptor(Arc<str>);

impl TypeDescriptor {
    /// Full name used for instances whose type could not be determined.
    pub const UNKNOWN: &'static str = "<unknown>";

    /// Full name of the canonical null instance.
    pub const NULL: &'static str = "<null>";

    /// Creates a descriptor from a full type name.
    #[must_use]
    pub fn new(full_name: impl AsRef<str>) -> Self {
        TypeDescriptor(Arc::from(full_name.as_ref()))
    }

    /// Descriptor of values with an undeterminable type.
    #[must_use]
    pub fn unknown() -> Self {
        TypeDescriptor::new(Self::UNKNOWN)
    }

    /// Descriptor of the canonical null instance.
    #[must_use]
    pub fn null() -> Self {
        TypeDescriptor::new(Self::NULL)
    }

    /// Returns the full type name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.0
    }

    /// Returns `true` for [`TypeDescriptor::unknown`].
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        &*self.0 == Self::UNKNOWN
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({})", self.0)
    }
}

impl From<&str> for TypeDescriptor {
    fn from(value: &str) -> Self {
        TypeDescriptor::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_id_equality_includes_flag() {
        assert_eq!(MethodId::new("A.B"), MethodId::new("A.B"));
        assert_ne!(MethodId::new("A.B"), MethodId::dynamic("A.B"));
        assert_eq!(MethodId::dynamic("A.B").name(), "A.B");
        assert_eq!(MethodId::dynamic("A.B").to_string(), "virtual A.B");
    }

    #[test]
    fn test_temporary_detection() {
        assert!(VariableName::new("$tmp0_call").is_temporary());
        assert!(!VariableName::new("x").is_temporary());
        assert!(!VariableName::new("tmp").is_temporary());
    }

    #[test]
    fn test_type_descriptor() {
        assert!(TypeDescriptor::unknown().is_unknown());
        assert!(!TypeDescriptor::new("System.String").is_unknown());
        assert_eq!(TypeDescriptor::from("A").full_name(), "A");
    }
}
