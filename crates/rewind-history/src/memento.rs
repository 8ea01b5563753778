/// The reversible-change capability supplied by the host application.
use std::any::Any;
use std::fmt;

use anyhow::Result;

/// How much a memento matters when deciding operation boundaries.
///
/// Ordered: `Supporting < Minor < Substantial`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Significance {
    /// Bookkeeping that only makes sense next to a real change
    /// (selection, caret, scroll position).
    Supporting,
    /// A real change that never opens a new operation on its own.
    Minor,
    /// A change that starts a new operation once a boundary is pending.
    Substantial,
}

impl Significance {
    /// Whether a group containing this memento is worth keeping.
    pub fn is_trackable(self) -> bool {
        self >= Significance::Minor
    }
}

impl fmt::Display for Significance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Significance::Supporting => "supporting",
            Significance::Minor => "minor",
            Significance::Substantial => "substantial",
        };
        f.write_str(name)
    }
}

/// One reversible change.
///
/// Concrete mementos are defined by the host. The engine only ever sees them
/// as `Box<dyn Memento>` and calls into them without holding its state lock,
/// so `undo` is free to book new mementos on the same engine.
pub trait Memento: Send {
    /// Classification used for grouping. Must not change after creation.
    fn significance(&self) -> Significance;

    /// Returns `true` when `candidate` adds nothing beyond `self`, in which
    /// case the candidate is discarded instead of being added.
    ///
    /// Only ever asked about members of the group currently accumulating.
    fn supersedes(&self, _candidate: &dyn Memento) -> bool {
        false
    }

    /// Reverts the change. Mementos booked while this runs are captured by
    /// the engine's current mode.
    fn undo(&mut self) -> Result<()>;

    /// Releases any scoped resource owned by the memento.
    ///
    /// Called exactly once by the engine, after the memento was replayed,
    /// discarded, evicted, or swept by a clear.
    fn release(&mut self) {}

    /// Short label for logs.
    fn describe(&self) -> &str {
        "memento"
    }

    /// Downcasting hook so `supersedes` can inspect concrete candidates.
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn Memento {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.describe(), self.significance())
    }
}
