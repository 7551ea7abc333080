//! Arena owning all instances of one run.
//!
//! Instances reference each other (fields, arguments) and are referenced from the
//! execution trace, so they are stored in a single arena and addressed by
//! [`InstanceRef`] handles. Handles are never reused; an instance lives until the
//! heap is dropped together with the [`AnalyzingResult`](crate::analyzing::AnalyzingResult).

use std::fmt;

use crate::{
    analyzing::{
        execution::BlockId,
        value::{Instance, InstanceKind},
        TypeDescriptor,
    },
    Error, Result,
};

/// Handle of an [`Instance`] in an [`InstanceHeap`].
///
/// Two handles are equal if they refer to the same instance. A handle that was not
/// produced by the heap it is used with is *invalid*; using it is a fatal error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceRef(u64);

impl InstanceRef {
    /// Creates a handle from a raw id.
    #[must_use]
    pub fn new(id: u64) -> Self {
        InstanceRef(id)
    }

    /// Returns the raw id of this handle.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arena of all instances created during one run.
#[derive(Clone, Debug, Default)]
pub struct InstanceHeap {
    instances: Vec<Instance>,
}

impl InstanceHeap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new instance.
    ///
    /// # Arguments
    ///
    /// * `ty` - Runtime type of the new instance
    /// * `kind` - Direct or data payload
    /// * `creation_block` - The executing block, if any
    pub fn alloc(
        &mut self,
        ty: TypeDescriptor,
        kind: InstanceKind,
        creation_block: Option<BlockId>,
    ) -> InstanceRef {
        let id = InstanceRef(self.instances.len() as u64);
        self.instances
            .push(Instance::new(id, ty, kind, creation_block));
        id
    }

    /// Returns the instance behind a handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] if the handle does not belong to this heap.
    pub fn get(&self, instance: InstanceRef) -> Result<&Instance> {
        usize::try_from(instance.0)
            .ok()
            .and_then(|index| self.instances.get(index))
            .ok_or(Error::InvalidInstance(instance))
    }

    /// Returns the instance behind a handle mutably.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] if the handle does not belong to this heap.
    pub fn get_mut(&mut self, instance: InstanceRef) -> Result<&mut Instance> {
        usize::try_from(instance.0)
            .ok()
            .and_then(|index| self.instances.get_mut(index))
            .ok_or(Error::InvalidInstance(instance))
    }

    /// Checks that a handle belongs to this heap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] if it does not.
    pub fn check(&self, instance: InstanceRef) -> Result<()> {
        self.get(instance).map(|_| ())
    }

    /// Returns `true` if the handle belongs to this heap.
    #[must_use]
    pub fn contains(&self, instance: InstanceRef) -> bool {
        self.get(instance).is_ok()
    }

    /// Marks an instance as dirty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] if the handle does not belong to this heap.
    pub fn set_dirty(&mut self, instance: InstanceRef) -> Result<()> {
        self.get_mut(instance)?.set_dirty();
        Ok(())
    }

    /// Returns whether an instance is dirty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstance`] if the handle does not belong to this heap.
    pub fn is_dirty(&self, instance: InstanceRef) -> Result<bool> {
        Ok(self.get(instance)?.is_dirty())
    }

    /// Number of instances created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` if no instance was created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Iterates over all instances in creation order.
    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.instances.iter()
    }
}

impl<'a> IntoIterator for &'a InstanceHeap {
    type Item = &'a Instance;
    type IntoIter = std::slice::Iter<'a, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
