/// Containers behind the engine: the active group and the two stacks.
use crate::group::OperationGroup;
use crate::memento::Memento;
use crate::policy::{Booking, Placement};

/// Holds the active group, the undo and redo stacks, and the mementos
/// waiting to be released once the engine drops its lock.
#[derive(Debug, Default)]
pub(crate) struct HistoryStore {
    /// Group currently accumulating. While undoing/redoing this is the
    /// accumulator destined for the opposite stack.
    active: OperationGroup,
    /// Sealed groups, most recently completed on top.
    undo_stack: Vec<OperationGroup>,
    /// Undone groups, most recently undone on top.
    redo_stack: Vec<OperationGroup>,
    /// Maximum groups per stack (None = unbounded).
    max_operations: Option<usize>,
    /// Discarded or used-up mementos awaiting `release()`.
    released: Vec<Box<dyn Memento>>,
}

impl HistoryStore {
    pub fn new(max_operations: Option<usize>) -> Self {
        Self {
            max_operations,
            ..Self::default()
        }
    }

    pub fn active(&self) -> &OperationGroup {
        &self.active
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Whether `take_undo_target` would yield a group.
    pub fn has_undo_target(&self) -> bool {
        !self.active.is_empty() || !self.undo_stack.is_empty()
    }

    pub fn has_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Carries out a policy decision for `memento`.
    pub fn apply(&mut self, booking: Booking, memento: Box<dyn Memento>) {
        if booking.clear_redo {
            self.clear_redo();
        }
        if booking.start_new_group {
            self.seal_active();
        }
        match booking.placement {
            Placement::Append => self.active.push(memento),
            Placement::Discard(reason) => {
                tracing::trace!("Discarding {memento:?} ({reason:?})");
                self.released.push(memento);
            }
        }
    }

    /// Pushes a non-empty active group onto the undo stack.
    pub fn seal_active(&mut self) {
        if self.active.is_empty() {
            return;
        }
        let group = std::mem::take(&mut self.active);
        tracing::debug!("Sealing operation of {} mementos", group.len());
        self.push_undo(group);
    }

    /// Replaces the active group with a fresh one and returns the old one.
    pub fn take_active(&mut self) -> OperationGroup {
        std::mem::take(&mut self.active)
    }

    /// Releases every member of the active group.
    pub fn discard_active(&mut self) {
        let group = self.take_active();
        self.discard_group(group);
    }

    /// Group an undo should revert: the active group if it has members,
    /// otherwise the top of the undo stack.
    pub fn take_undo_target(&mut self) -> Option<OperationGroup> {
        if !self.active.is_empty() {
            return Some(self.take_active());
        }
        self.undo_stack.pop()
    }

    pub fn pop_redo(&mut self) -> Option<OperationGroup> {
        self.redo_stack.pop()
    }

    pub fn push_undo(&mut self, group: OperationGroup) {
        self.undo_stack.push(group);
        let evicted = evict_oldest(&mut self.undo_stack, self.max_operations);
        self.release_groups(evicted);
    }

    pub fn push_redo(&mut self, group: OperationGroup) {
        self.redo_stack.push(group);
        let evicted = evict_oldest(&mut self.redo_stack, self.max_operations);
        self.release_groups(evicted);
    }

    /// Drops the redo history.
    pub fn clear_redo(&mut self) {
        if self.redo_stack.is_empty() {
            return;
        }
        tracing::debug!("Discarding {} redoable operations", self.redo_stack.len());
        let groups = std::mem::take(&mut self.redo_stack);
        self.release_groups(groups);
    }

    /// Drops every group, active one included.
    pub fn clear(&mut self) {
        self.discard_active();
        let undo = std::mem::take(&mut self.undo_stack);
        self.release_groups(undo);
        let redo = std::mem::take(&mut self.redo_stack);
        self.release_groups(redo);
    }

    pub fn discard(&mut self, memento: Box<dyn Memento>) {
        self.released.push(memento);
    }

    pub fn discard_group(&mut self, group: OperationGroup) {
        self.released.extend(group.into_mementos());
    }

    /// Hands over the mementos awaiting release.
    pub fn take_released(&mut self) -> Vec<Box<dyn Memento>> {
        std::mem::take(&mut self.released)
    }

    fn release_groups(&mut self, groups: Vec<OperationGroup>) {
        for group in groups {
            self.discard_group(group);
        }
    }
}

/// Removes groups from the bottom of `stack` until it fits in `max`.
fn evict_oldest(stack: &mut Vec<OperationGroup>, max: Option<usize>) -> Vec<OperationGroup> {
    match max {
        Some(max) if stack.len() > max => {
            let excess = stack.len() - max;
            tracing::debug!("Evicting {excess} oldest operations");
            stack.drain(..excess).collect()
        }
        _ => Vec::new(),
    }
}
