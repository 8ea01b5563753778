use std::any::Any;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use anyhow::Context;
use rewind_history::{HistoryConfig, Memento, Significance, UndoRedoEngine};

/// Counts mementos handed to the engine and released by it.
#[derive(Debug, Default)]
pub struct Stats {
    pub created: AtomicUsize,
    pub released: AtomicUsize,
}

impl Stats {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

type Job = Box<dyn FnOnce() + Send>;

/// A counter "document" whose edits are booked as mementos.
///
/// Undoing a delta applies the opposite delta, which books the inverse
/// memento, so undo and redo are symmetric.
pub struct Document {
    pub engine: Arc<UndoRedoEngine>,
    value: AtomicI64,
    stats: Arc<Stats>,
    log: Mutex<Vec<String>>,
    background: Mutex<Vec<Job>>,
}

impl Document {
    pub fn new() -> Arc<Self> {
        Self::with_config(HistoryConfig::default())
    }

    pub fn with_config(config: HistoryConfig) -> Arc<Self> {
        Arc::new(Self {
            engine: Arc::new(UndoRedoEngine::new(config)),
            value: AtomicI64::new(0),
            stats: Arc::new(Stats::default()),
            log: Mutex::new(Vec::new()),
            background: Mutex::new(Vec::new()),
        })
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }

    /// Drains the undo log.
    pub fn log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    /// Adds `delta` and books a memento labelled `label`.
    pub fn add(self: &Arc<Self>, label: &str, significance: Significance, delta: i64) {
        self.value.fetch_add(delta, Ordering::SeqCst);
        self.book(Kind::Delta(delta), label, significance);
    }

    /// Sets the value; the memento remembers the previous one and
    /// supersedes later `set` mementos in its group.
    pub fn set(self: &Arc<Self>, label: &str, significance: Significance, value: i64) {
        let previous = self.value.swap(value, Ordering::SeqCst);
        self.book(Kind::Restore(previous), label, significance);
    }

    /// Books a memento that changes nothing.
    pub fn touch(self: &Arc<Self>, label: &str, significance: Significance) {
        self.book(Kind::Delta(0), label, significance);
    }

    /// Adds `delta`; its undo is carried out later by `run_background`.
    pub fn add_deferred(self: &Arc<Self>, label: &str, significance: Significance, delta: i64) {
        self.value.fetch_add(delta, Ordering::SeqCst);
        self.book(Kind::Deferred(delta), label, significance);
    }

    /// Books a memento whose undo fails.
    pub fn add_failing(self: &Arc<Self>, label: &str, significance: Significance) {
        self.book(Kind::Failing, label, significance);
    }

    /// Runs work queued by deferred mementos, returning how many jobs ran.
    pub fn run_background(&self) -> usize {
        let jobs = std::mem::take(&mut *self.background.lock().unwrap());
        let count = jobs.len();
        for job in jobs {
            job();
        }
        count
    }

    fn book(self: &Arc<Self>, kind: Kind, label: &str, significance: Significance) {
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        self.engine.add_memento(Box::new(Edit {
            kind,
            label: label.to_string(),
            significance,
            doc: Arc::downgrade(self),
            stats: Arc::clone(&self.stats),
            released: false,
        }));
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Delta(i64),
    Restore(i64),
    Deferred(i64),
    Failing,
}

struct Edit {
    kind: Kind,
    label: String,
    significance: Significance,
    doc: Weak<Document>,
    stats: Arc<Stats>,
    released: bool,
}

impl Memento for Edit {
    fn significance(&self) -> Significance {
        self.significance
    }

    fn supersedes(&self, candidate: &dyn Memento) -> bool {
        let Some(other) = candidate.as_any().downcast_ref::<Edit>() else {
            return false;
        };
        matches!(self.kind, Kind::Restore(_)) && matches!(other.kind, Kind::Restore(_))
    }

    fn undo(&mut self) -> anyhow::Result<()> {
        let doc = self.doc.upgrade().context("document dropped")?;
        doc.log.lock().unwrap().push(format!("undo {}", self.label));
        match self.kind {
            Kind::Delta(delta) => doc.add(&self.label, self.significance, -delta),
            Kind::Restore(previous) => doc.set(&self.label, self.significance, previous),
            Kind::Deferred(delta) => {
                let label = self.label.clone();
                let significance = self.significance;
                let weak = Arc::downgrade(&doc);
                doc.background.lock().unwrap().push(Box::new(move || {
                    if let Some(doc) = weak.upgrade() {
                        doc.add_deferred(&label, significance, -delta);
                    }
                }));
            }
            Kind::Failing => anyhow::bail!("{} cannot be undone", self.label),
        }
        Ok(())
    }

    fn release(&mut self) {
        assert!(!self.released, "{} released twice", self.label);
        self.released = true;
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }

    fn describe(&self) -> &str {
        &self.label
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
