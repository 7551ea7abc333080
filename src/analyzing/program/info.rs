use std::{fmt, sync::Arc};

use crate::analyzing::program::RemoveTransformProvider;

struct InfoData {
    comment: Option<String>,
    remove_provider: Option<Arc<dyn RemoveTransformProvider>>,
}

/// Identity of an instruction block, usually one source statement.
///
/// Every emitted instruction is stamped with the info that was current in the
/// emitter. Infos compare by identity: two infos created with the same comment
/// are still different blocks.
#[derive(Clone)]
pub struct InstructionInfo(Arc<InfoData>);

impl InstructionInfo {
    /// Creates a new block identity without comment or removal hook.
    #[must_use]
    pub fn new() -> Self {
        InstructionInfo(Arc::new(InfoData {
            comment: None,
            remove_provider: None,
        }))
    }

    /// Creates a new block identity.
    ///
    /// # Arguments
    ///
    /// * `comment` - Optional description, e.g. the statement's source text
    /// * `remove_provider` - Optional hook removing the statement
    #[must_use]
    pub fn with(
        comment: Option<String>,
        remove_provider: Option<Arc<dyn RemoveTransformProvider>>,
    ) -> Self {
        InstructionInfo(Arc::new(InfoData {
            comment,
            remove_provider,
        }))
    }

    /// Comment of this block.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.0.comment.as_deref()
    }

    /// Hook removing the statement this block represents.
    #[must_use]
    pub fn remove_provider(&self) -> Option<&Arc<dyn RemoveTransformProvider>> {
        self.0.remove_provider.as_ref()
    }
}

impl Default for InstructionInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for InstructionInfo {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for InstructionInfo {}

impl fmt::Debug for InstructionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.comment {
            Some(comment) => write!(f, "InstructionInfo({comment:?})"),
            None => write!(f, "InstructionInfo({:p})", Arc::as_ptr(&self.0)),
        }
    }
}
