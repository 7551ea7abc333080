//! Hooks handed to the editing layer.
//!
//! The interpreter never calls these hooks. It only records them in the execution
//! trace, next to the instances and calls they belong to, so that a later editing
//! pass can decide how a statement or a call argument is removed from the source.

use std::{fmt, sync::Arc};

/// Describes how a statement (or a part of it) can be removed from the source.
pub trait RemoveTransformProvider: fmt::Debug + Send + Sync {
    /// Human readable description of the removal, e.g. for an edit menu.
    fn describe(&self) -> String;
}

/// Hooks attached to a call instruction.
///
/// A call can either be removed as a whole, or single arguments can be dropped
/// if the callee declares them optional.
pub trait CallTransformProvider: fmt::Debug + Send + Sync {
    /// Removal of the complete call statement.
    fn remove(&self) -> Option<Arc<dyn RemoveTransformProvider>>;

    /// Removal of a single argument.
    ///
    /// # Arguments
    ///
    /// * `index` - Index of the argument in the call's argument list
    fn remove_argument(&self, index: usize) -> Option<Arc<dyn RemoveTransformProvider>>;

    /// Returns `true` if the argument at `index` can be dropped on its own.
    fn is_optional_argument(&self, index: usize) -> bool;
}

/// A removal which is fully described by a text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescribedRemoval(pub String);

impl DescribedRemoval {
    /// Creates a shareable removal hook.
    #[must_use]
    pub fn shared(description: impl Into<String>) -> Arc<dyn RemoveTransformProvider> {
        Arc::new(DescribedRemoval(description.into()))
    }
}

impl RemoveTransformProvider for DescribedRemoval {
    fn describe(&self) -> String {
        self.0.clone()
    }
}

/// Table-driven [`CallTransformProvider`]: removes `statement` as a whole, or drops
/// one of the listed optional arguments.
#[derive(Clone, Debug)]
pub struct CallRemoval {
    statement: String,
    optional: Vec<usize>,
}

impl CallRemoval {
    /// Creates the hook for a call statement.
    ///
    /// # Arguments
    ///
    /// * `statement` - Text of the call statement, used in descriptions
    /// * `optional` - Indexes of arguments that can be dropped individually
    #[must_use]
    pub fn new(statement: impl Into<String>, optional: &[usize]) -> Self {
        CallRemoval {
            statement: statement.into(),
            optional: optional.to_vec(),
        }
    }

    /// Wraps the hook for use in a call instruction.
    #[must_use]
    pub fn shared(self) -> Arc<dyn CallTransformProvider> {
        Arc::new(self)
    }
}

impl CallTransformProvider for CallRemoval {
    fn remove(&self) -> Option<Arc<dyn RemoveTransformProvider>> {
        Some(DescribedRemoval::shared(format!("remove {}", self.statement)))
    }

    fn remove_argument(&self, index: usize) -> Option<Arc<dyn RemoveTransformProvider>> {
        self.is_optional_argument(index).then(|| {
            DescribedRemoval::shared(format!(
                "remove argument {index} of {}",
                self.statement
            ))
        })
    }

    fn is_optional_argument(&self, index: usize) -> bool {
        self.optional.contains(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_removal() {
        let hook = CallRemoval::new("Log(a, b)", &[1]);

        assert!(!hook.is_optional_argument(0));
        assert!(hook.is_optional_argument(1));
        assert!(hook.remove_argument(0).is_none());
        assert_eq!(
            hook.remove_argument(1).map(|p| p.describe()).as_deref(),
            Some("remove argument 1 of Log(a, b)")
        );
        assert_eq!(
            hook.remove().map(|p| p.describe()).as_deref(),
            Some("remove Log(a, b)")
        );
    }
}
