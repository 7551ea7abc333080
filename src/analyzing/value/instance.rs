//! Identity-bearing values of the interpreter.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::analyzing::{execution::BlockId, value::InstanceRef, NativeValue, TypeDescriptor};

/// Payload of an [`Instance`].
#[derive(Clone, Debug)]
pub enum InstanceKind {
    /// Wraps a native value, e.g. a string or an integer.
    Direct(NativeValue),
    /// A simulated object consisting of named fields.
    Data(FxHashMap<String, InstanceRef>),
}

/// An edit applied to an instance by the editing layer or by a native method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edit {
    /// Short description of the edit
    pub name: String,
    /// Block in which the edit was recorded, if any
    pub block: Option<BlockId>,
}

/// An identity-bearing value flowing through the interpreter.
///
/// Instances are owned by the run's [`InstanceHeap`](super::InstanceHeap) and are
/// referenced through [`InstanceRef`] handles everywhere else: from variables,
/// fields, argument lists and the execution trace. They are never destroyed during
/// a run.
///
/// The *dirty* flag marks instances whose history includes an operation the
/// interpreter could not simulate. It is monotonic: once set it never clears.
#[derive(Clone)]
pub struct Instance {
    id: InstanceRef,
    ty: TypeDescriptor,
    kind: InstanceKind,
    dirty: bool,
    creation_block: Option<BlockId>,
    edits: Vec<Edit>,
}

impl Instance {
    pub(crate) fn new(
        id: InstanceRef,
        ty: TypeDescriptor,
        kind: InstanceKind,
        creation_block: Option<BlockId>,
    ) -> Self {
        Instance {
            id,
            ty,
            kind,
            dirty: false,
            creation_block,
            edits: Vec::new(),
        }
    }

    /// Handle of this instance.
    #[must_use]
    pub fn id(&self) -> InstanceRef {
        self.id
    }

    /// Runtime type of this instance.
    #[must_use]
    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    /// Payload of this instance.
    #[must_use]
    pub fn kind(&self) -> &InstanceKind {
        &self.kind
    }

    /// Returns `true` if this instance wraps a native value.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        matches!(self.kind, InstanceKind::Direct(_))
    }

    /// Returns the wrapped native value of a direct instance.
    #[must_use]
    pub fn direct_value(&self) -> Option<&NativeValue> {
        match &self.kind {
            InstanceKind::Direct(value) => Some(value),
            InstanceKind::Data(_) => None,
        }
    }

    /// Returns the value of a field of a data instance.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<InstanceRef> {
        match &self.kind {
            InstanceKind::Data(fields) => fields.get(name).copied(),
            InstanceKind::Direct(_) => None,
        }
    }

    /// Iterates over the fields of a data instance. Direct instances have none.
    pub fn fields(&self) -> impl Iterator<Item = (&str, InstanceRef)> {
        let fields = match &self.kind {
            InstanceKind::Data(fields) => Some(fields),
            InstanceKind::Direct(_) => None,
        };
        fields
            .into_iter()
            .flat_map(|fields| fields.iter().map(|(name, value)| (name.as_str(), *value)))
    }

    /// Returns `true` if this instance may not be trusted for further analysis.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Block that was executing when this instance was created.
    ///
    /// `None` for instances created outside of any call, e.g. entry arguments.
    #[must_use]
    pub fn creation_block(&self) -> Option<BlockId> {
        self.creation_block
    }

    /// Edits recorded on this instance, oldest first.
    #[must_use]
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub(crate) fn set_dirty(&mut self) {
        self.dirty = true;
    }

    /// Sets a field, returning `false` if this is a direct instance.
    pub(crate) fn set_field(&mut self, name: &str, value: InstanceRef) -> bool {
        match &mut self.kind {
            InstanceKind::Data(fields) => {
                fields.insert(name.to_string(), value);
                true
            }
            InstanceKind::Direct(_) => false,
        }
    }

    /// Replaces the payload, returning `false` if this is a data instance.
    pub(crate) fn set_direct_value(&mut self, value: NativeValue) -> bool {
        match &mut self.kind {
            InstanceKind::Direct(payload) => {
                *payload = value;
                true
            }
            InstanceKind::Data(_) => false,
        }
    }

    pub(crate) fn add_edit(&mut self, edit: Edit) {
        self.edits.push(edit);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Instance");
        dbg.field("id", &self.id.id()).field("type", &self.ty.full_name());
        match &self.kind {
            InstanceKind::Direct(value) => dbg.field("value", value),
            InstanceKind::Data(fields) => dbg.field("fields", &fields.len()),
        };
        dbg.field("dirty", &self.dirty).finish_non_exhaustive()
    }
}
