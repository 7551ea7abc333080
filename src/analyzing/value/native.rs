//! Native payloads of direct instances.

use std::{any::Any, fmt, sync::Arc};

use crate::analyzing::TypeDescriptor;

/// A native value wrapped by a direct [`Instance`](super::Instance).
///
/// The interpreter never inspects native values itself, apart from asking the
/// settings whether a value is "true" for conditional jumps. Native methods
/// receive and produce them to simulate framework behaviour.
///
/// Values of types the simulator has no variant for can be carried as
/// [`NativeValue::Opaque`]; the payload is compared by identity.
#[derive(Clone)]
pub enum NativeValue {
    /// The null reference
    Null,
    /// `System.Boolean`
    Bool(bool),
    /// `System.Int32`
    Int(i32),
    /// `System.Int64`
    Long(i64),
    /// `System.Double`
    Double(f64),
    /// `System.Char`
    Char(char),
    /// `System.String`
    Str(Arc<str>),
    /// Any other native object
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl NativeValue {
    /// Wraps a string.
    #[must_use]
    pub fn string(value: impl AsRef<str>) -> Self {
        NativeValue::Str(Arc::from(value.as_ref()))
    }

    /// Wraps an arbitrary native object.
    #[must_use]
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        NativeValue::Opaque(Arc::new(value))
    }

    /// Returns the type descriptor an instance wrapping this value gets by default.
    #[must_use]
    pub fn default_type(&self) -> TypeDescriptor {
        TypeDescriptor::new(self.type_name())
    }

    /// Returns the full .NET type name corresponding to this value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            NativeValue::Null => TypeDescriptor::NULL,
            NativeValue::Bool(_) => "System.Boolean",
            NativeValue::Int(_) => "System.Int32",
            NativeValue::Long(_) => "System.Int64",
            NativeValue::Double(_) => "System.Double",
            NativeValue::Char(_) => "System.Char",
            NativeValue::Str(_) => "System.String",
            NativeValue::Opaque(_) => "System.Object",
        }
    }

    /// Returns `true` for [`NativeValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Truthiness as used by the default settings for conditional jumps.
    ///
    /// Numbers are true when non-zero, references when non-null.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            NativeValue::Null => false,
            NativeValue::Bool(value) => *value,
            NativeValue::Int(value) => *value != 0,
            NativeValue::Long(value) => *value != 0,
            NativeValue::Double(value) => *value != 0.0,
            NativeValue::Char(value) => *value != '\0',
            NativeValue::Str(_) | NativeValue::Opaque(_) => true,
        }
    }

    /// Returns the boolean payload, if any.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as `i32`, if it is an `Int` or a `Char`.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            NativeValue::Int(value) => Some(*value),
            NativeValue::Char(value) => i32::try_from(u32::from(*value)).ok(),
            _ => None,
        }
    }

    /// Returns the value widened to `i64`, if it is integral.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NativeValue::Long(value) => Some(*value),
            NativeValue::Int(value) => Some(i64::from(*value)),
            NativeValue::Char(value) => Some(i64::from(u32::from(*value))),
            _ => None,
        }
    }

    /// Returns the value as `f64`, if it is numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::Double(value) => Some(*value),
            NativeValue::Int(value) => Some(f64::from(*value)),
            NativeValue::Long(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Downcasts an opaque payload.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            NativeValue::Opaque(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NativeValue::Null, NativeValue::Null) => true,
            (NativeValue::Bool(a), NativeValue::Bool(b)) => a == b,
            (NativeValue::Int(a), NativeValue::Int(b)) => a == b,
            (NativeValue::Long(a), NativeValue::Long(b)) => a == b,
            (NativeValue::Double(a), NativeValue::Double(b)) => a == b,
            (NativeValue::Char(a), NativeValue::Char(b)) => a == b,
            (NativeValue::Str(a), NativeValue::Str(b)) => a == b,
            (NativeValue::Opaque(a), NativeValue::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Null => write!(f, "null"),
            NativeValue::Bool(value) => write!(f, "{value}"),
            NativeValue::Int(value) => write!(f, "{value}"),
            NativeValue::Long(value) => write!(f, "{value}L"),
            NativeValue::Double(value) => write!(f, "{value:?}"),
            NativeValue::Char(value) => write!(f, "{value:?}"),
            NativeValue::Str(value) => write!(f, "{value:?}"),
            NativeValue::Opaque(_) => write!(f, "<opaque>"),
        }
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Str(value) => f.write_str(value),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Bool(value)
    }
}

impl From<i32> for NativeValue {
    fn from(value: i32) -> Self {
        NativeValue::Int(value)
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        NativeValue::Long(value)
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        NativeValue::Double(value)
    }
}

impl From<char> for NativeValue {
    fn from(value: char) -> Self {
        NativeValue::Char(value)
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::string(value)
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::Str(Arc::from(value))
    }
}
