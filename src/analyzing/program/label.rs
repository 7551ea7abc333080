use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use crate::{Error, Result};

struct LabelData {
    name: String,
    owner: Arc<()>,
    offset: OnceLock<usize>,
}

/// Jump target inside one program.
///
/// A label is created unbound by an [`Emitter`](crate::analyzing::Emitter) and
/// bound exactly once to the offset of the next instruction emitted after
/// [`Emitter::set_label`](crate::analyzing::Emitter::set_label). Labels belong to
/// the emitter that created them; using them with any other emitter is an error.
#[derive(Clone)]
pub struct Label(Arc<LabelData>);

impl Label {
    pub(crate) fn new(name: impl Into<String>, owner: &Arc<()>) -> Self {
        Label(Arc::new(LabelData {
            name: name.into(),
            owner: Arc::clone(owner),
            offset: OnceLock::new(),
        }))
    }

    /// Name of this label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Offset this label is bound to.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        self.0.offset.get().copied()
    }

    /// Returns `true` once the label has been bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.0.offset.get().is_some()
    }

    /// Offset of a bound label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnboundLabel`] if the label was never bound.
    pub fn target(&self) -> Result<usize> {
        self.offset()
            .ok_or_else(|| Error::UnboundLabel(self.0.name.clone()))
    }

    pub(crate) fn is_owned_by(&self, owner: &Arc<()>) -> bool {
        Arc::ptr_eq(&self.0.owner, owner)
    }

    pub(crate) fn bind(&self, offset: usize) -> Result<()> {
        self.0
            .offset
            .set(offset)
            .map_err(|_| Error::LabelAlreadyBound(self.0.name.clone()))
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Label {}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset() {
            Some(offset) => write!(f, "{}@{offset}", self.0.name),
            None => write!(f, "{}@?", self.0.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_once() {
        let owner = Arc::new(());
        let label = Label::new("loop", &owner);

        assert!(!label.is_bound());
        assert!(matches!(label.target(), Err(Error::UnboundLabel(_))));

        label.bind(4).unwrap();
        assert_eq!(label.offset(), Some(4));
        assert!(matches!(label.bind(5), Err(Error::LabelAlreadyBound(n)) if n == "loop"));
        assert_eq!(label.target().unwrap(), 4);
    }

    #[test]
    fn test_ownership() {
        let owner = Arc::new(());
        let other = Arc::new(());
        let label = Label::new("l", &owner);

        assert!(label.is_owned_by(&owner));
        assert!(!label.is_owned_by(&other));
    }
}
