/// Operation groups: the unit of one undo or redo step.
use std::fmt;

use crate::memento::Memento;

/// Mementos that form a single logical user operation.
///
/// Members are kept in arrival order and replayed in reverse, so the last
/// memento added is the first one undone.
#[derive(Default)]
pub struct OperationGroup {
    mementos: Vec<Box<dyn Memento>>,
}

impl fmt::Debug for OperationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.mementos.iter()).finish()
    }
}

impl OperationGroup {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mementos in the group.
    pub fn len(&self) -> usize {
        self.mementos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mementos.is_empty()
    }

    /// Whether any member is at least `Minor`, i.e. the group is worth
    /// keeping on a stack.
    pub fn is_trackable(&self) -> bool {
        self.mementos
            .iter()
            .any(|m| m.significance().is_trackable())
    }

    /// Whether an existing member supersedes `candidate`.
    pub fn supersedes(&self, candidate: &dyn Memento) -> bool {
        self.mementos.iter().any(|m| m.supersedes(candidate))
    }

    /// Appends a memento in arrival order.
    pub fn push(&mut self, memento: Box<dyn Memento>) {
        self.mementos.push(memento);
    }

    /// Members in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Memento> {
        self.mementos.iter().map(|m| m.as_ref())
    }

    /// Consumes the group, yielding members most-recent first.
    pub fn into_replay_order(self) -> impl Iterator<Item = Box<dyn Memento>> {
        self.mementos.into_iter().rev()
    }

    /// Consumes the group, yielding members in arrival order.
    pub(crate) fn into_mementos(self) -> Vec<Box<dyn Memento>> {
        self.mementos
    }
}
