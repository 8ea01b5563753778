/// A tiny editable document: one integer whose edits are booked as mementos.
use std::any::Any;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use anyhow::{anyhow, Context, Result};
use rewind_history::{Memento, Significance, UndoRedoEngine};

/// Integer document wired to an undo/redo engine.
pub struct Counter {
    engine: Arc<UndoRedoEngine>,
    value: AtomicI64,
}

impl Counter {
    pub fn new(engine: Arc<UndoRedoEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            value: AtomicI64::new(0),
        })
    }

    pub fn engine(&self) -> &UndoRedoEngine {
        &self.engine
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Adds `delta` and books the change.
    ///
    /// # Errors
    ///
    /// Fails without touching the value or the history if the sum
    /// overflows, or if `delta` is `i64::MIN` (which has no inverse).
    pub fn add(self: &Arc<Self>, significance: Significance, delta: i64) -> Result<()> {
        if delta.checked_neg().is_none() {
            return Err(anyhow!("delta {delta} cannot be undone"));
        }
        self.value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(delta))
            .map_err(|v| anyhow!("adding {delta} to {v} overflows"))?;
        self.book(Change::Delta(delta), significance);
        Ok(())
    }

    /// Replaces the value and books the change.
    pub fn set(self: &Arc<Self>, significance: Significance, value: i64) {
        let previous = self.value.swap(value, Ordering::SeqCst);
        self.book(Change::Restore(previous), significance);
    }

    fn book(self: &Arc<Self>, change: Change, significance: Significance) {
        self.engine.add_memento(Box::new(CounterEdit {
            change,
            significance,
            label: change.label(),
            counter: Arc::downgrade(self),
        }));
    }
}

#[derive(Debug, Clone, Copy)]
enum Change {
    /// Undone by applying the negated delta.
    Delta(i64),
    /// Undone by restoring the stored value.
    Restore(i64),
}

impl Change {
    fn label(self) -> String {
        match self {
            Change::Delta(delta) => format!("add {delta:+}"),
            Change::Restore(previous) => format!("restore {previous}"),
        }
    }
}

struct CounterEdit {
    change: Change,
    significance: Significance,
    label: String,
    counter: Weak<Counter>,
}

impl Memento for CounterEdit {
    fn significance(&self) -> Significance {
        self.significance
    }

    /// A restore already brings the value back to where the group started,
    /// so later restores in the same group are redundant.
    fn supersedes(&self, candidate: &dyn Memento) -> bool {
        let restores = |m: &CounterEdit| matches!(m.change, Change::Restore(_));
        restores(self)
            && candidate
                .as_any()
                .downcast_ref::<CounterEdit>()
                .is_some_and(restores)
    }

    fn undo(&mut self) -> Result<()> {
        let counter = self
            .counter
            .upgrade()
            .context("counter was dropped before undo")?;
        match self.change {
            Change::Delta(delta) => {
                let inverse = delta
                    .checked_neg()
                    .with_context(|| format!("delta {delta} has no inverse"))?;
                counter.add(self.significance, inverse)?;
            }
            Change::Restore(previous) => counter.set(self.significance, previous),
        }
        Ok(())
    }

    fn describe(&self) -> &str {
        &self.label
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
