/// The public undo/redo orchestrator.
///
/// Mementos are booked through the grouping policy into the history
/// store. Undo and redo run as a two-phase bracket: `begin_*` picks a group
/// and replays it, `end_*` seals whatever the replay booked onto the
/// opposite stack. Anything booked between the two calls, including from
/// background work started by a memento, lands in the same group.
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::HistoryConfig;
use crate::error::{HistoryError, StateViolation};
use crate::group::OperationGroup;
use crate::memento::Memento;
use crate::notify::{dispatch, HistoryEvent, ListenerId, ListenerRegistry};
use crate::policy::{self, BookingContext};
use crate::store::HistoryStore;

/// Engine-wide replay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    /// Between `begin_undo` and `end_undo`.
    Undoing,
    /// Between `begin_redo` and `end_redo`.
    Redoing,
}

impl Mode {
    pub fn is_bracketed(self) -> bool {
        !matches!(self, Mode::Idle)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Idle => "idle",
            Mode::Undoing => "undo",
            Mode::Redoing => "redo",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Availability {
    undo: bool,
    redo: bool,
}

/// Everything guarded by the engine lock.
#[derive(Debug)]
struct HistoryState {
    store: HistoryStore,
    mode: Mode,
    tracking: bool,
    in_progress: bool,
    /// The next `Substantial` memento seals the active group.
    pending_new_operation: bool,
    /// The next boundary transition leaves the active group open.
    extending: bool,
    /// Set by transitions that should report `OperationEnded`.
    operation_ended: bool,
}

impl HistoryState {
    fn new(config: &HistoryConfig) -> Self {
        Self {
            store: HistoryStore::new(config.max_operations),
            mode: Mode::Idle,
            tracking: config.track_operations,
            in_progress: false,
            pending_new_operation: false,
            extending: false,
            operation_ended: false,
        }
    }

    fn availability(&self) -> Availability {
        let idle = self.mode == Mode::Idle;
        Availability {
            undo: idle && self.store.has_undo_target(),
            redo: idle && self.store.has_redo(),
        }
    }

    fn booking_context(&self) -> BookingContext {
        BookingContext {
            mode: self.mode,
            tracking: self.tracking,
            pending_new_operation: self.pending_new_operation,
            in_progress: self.in_progress,
            redo_available: self.store.has_redo(),
        }
    }

    /// Events produced since `before` was captured.
    fn events_since(&mut self, before: Availability) -> Vec<HistoryEvent> {
        let after = self.availability();
        let mut events = Vec::new();
        if before.undo != after.undo {
            events.push(HistoryEvent::UndoAvailabilityChanged(after.undo));
        }
        if before.redo != after.redo {
            events.push(HistoryEvent::RedoAvailabilityChanged(after.redo));
        }
        if std::mem::take(&mut self.operation_ended) {
            events.push(HistoryEvent::OperationEnded);
        }
        events
    }

    fn ensure_idle(&self, operation: &'static str) -> Result<(), StateViolation> {
        if self.mode.is_bracketed() {
            return Err(StateViolation::AlreadyBracketed {
                operation,
                mode: self.mode,
            });
        }
        Ok(())
    }

    /// Keeps a trackable active group as its own operation, drops it
    /// otherwise.
    fn settle_active(&mut self) {
        if self.store.active().is_trackable() {
            self.store.seal_active();
        } else {
            self.store.discard_active();
        }
    }

    fn open_bracket(&mut self, mode: Mode) {
        tracing::debug!("Opening {mode} bracket");
        self.mode = mode;
        self.extending = false;
    }

    /// Moves the accumulator onto the stack opposite to the replay and
    /// returns to `Idle`.
    fn close_bracket(&mut self) {
        let accumulator = self.store.take_active();
        let trackable = accumulator.is_trackable();
        tracing::debug!(
            "Closing {} bracket with {} mementos (trackable: {trackable})",
            self.mode,
            accumulator.len()
        );
        match (self.mode, trackable) {
            (Mode::Undoing, true) => self.store.push_redo(accumulator),
            (Mode::Redoing, true) => self.store.push_undo(accumulator),
            _ => self.store.discard_group(accumulator),
        }
        self.mode = Mode::Idle;
        self.operation_ended = true;
    }
}

/// Grouped undo/redo history.
///
/// Share it as `Arc<UndoRedoEngine>`: every method takes `&self`, and the
/// state lock is never held while a memento's `undo`/`release` or a
/// listener runs, so those may call back into the engine.
pub struct UndoRedoEngine {
    state: Mutex<HistoryState>,
    listeners: Mutex<ListenerRegistry>,
}

impl fmt::Debug for UndoRedoEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("UndoRedoEngine")
            .field("mode", &state.mode)
            .field("active_len", &state.store.active().len())
            .field("undo_depth", &state.store.undo_depth())
            .field("redo_depth", &state.store.redo_depth())
            .field("tracking", &state.tracking)
            .field("in_progress", &state.in_progress)
            .field("pending_new_operation", &state.pending_new_operation)
            .field("extending", &state.extending)
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl Default for UndoRedoEngine {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl UndoRedoEngine {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            state: Mutex::new(HistoryState::new(&config)),
            listeners: Mutex::new(ListenerRegistry::default()),
        }
    }

    /// Runs `f` under the state lock, then releases discarded mementos and
    /// notifies listeners with the lock dropped.
    fn with_state<R>(&self, f: impl FnOnce(&mut HistoryState) -> R) -> R {
        let (result, released, events) = {
            let mut state = self.state.lock();
            let before = state.availability();
            let result = f(&mut *state);
            let events = state.events_since(before);
            (result, state.store.take_released(), events)
        };
        release_all(released);
        if !events.is_empty() {
            let listeners = self.listeners.lock().snapshot();
            dispatch(&listeners, &events);
        }
        result
    }

    // ── Booking ────────────────────────────────────────────────────────

    /// Books a memento.
    ///
    /// While undoing/redoing it joins the replay accumulator. Otherwise the
    /// grouping policy decides whether it extends the active operation,
    /// starts a new one, or is discarded.
    pub fn add_memento(&self, memento: Box<dyn Memento>) {
        self.with_state(|state| {
            let booking =
                policy::decide(&state.booking_context(), state.store.active(), memento.as_ref());
            tracing::trace!("Booking {memento:?}: {booking:?}");
            if booking.start_new_group {
                state.pending_new_operation = false;
            }
            state.store.apply(booking, memento);
        });
    }

    // ── Operation boundaries ───────────────────────────────────────────

    /// Marks a boundary: the next `Substantial` memento starts a new
    /// operation. Nothing is sealed until then.
    pub fn start_new_operation(&self) {
        self.with_state(|state| {
            state.pending_new_operation = true;
            state.extending = false;
        });
    }

    /// Keeps the active operation open across the next boundary.
    ///
    /// Returns `false` (and does nothing) when there is no active operation
    /// to extend.
    pub fn extend_current_operation(&self) -> bool {
        self.with_state(|state| {
            if state.mode.is_bracketed() || state.store.active().is_empty() {
                tracing::debug!("No active operation to extend");
                return false;
            }
            state.pending_new_operation = false;
            state.extending = true;
            true
        })
    }

    pub fn operation_in_progress(&self) -> bool {
        self.state.lock().in_progress
    }

    /// Opens or closes an explicit operation.
    ///
    /// Opening seals whatever was accumulating so the new operation starts
    /// clean. Closing keeps the group if it holds a trackable change (the
    /// next `Substantial` memento then starts a new operation) and drops it
    /// otherwise. An extension suppresses both.
    pub fn set_operation_in_progress(&self, in_progress: bool) {
        self.with_state(|state| {
            if state.in_progress == in_progress {
                return;
            }
            state.in_progress = in_progress;
            if state.mode.is_bracketed() {
                // Active is the replay accumulator; leave it alone.
                return;
            }
            if state.extending {
                if !in_progress {
                    state.extending = false;
                }
                return;
            }
            if in_progress {
                state.store.seal_active();
            } else if state.store.active().is_trackable() {
                state.pending_new_operation = true;
                state.operation_ended = true;
            } else {
                state.store.discard_active();
            }
        });
    }

    pub fn track_operations(&self) -> bool {
        self.state.lock().tracking
    }

    /// Enables or disables recording of mementos outside undo/redo.
    pub fn set_track_operations(&self, tracking: bool) {
        self.with_state(|state| {
            if state.tracking != tracking {
                tracing::debug!("Operation tracking set to {tracking}");
                state.tracking = tracking;
            }
        });
    }

    // ── Undo ───────────────────────────────────────────────────────────

    /// Reverts the active operation, or the most recent sealed one.
    ///
    /// Returns `Ok(false)` without opening a bracket when there is nothing
    /// to undo. Otherwise the engine stays in `Undoing` until `end_undo`.
    ///
    /// # Errors
    ///
    /// `InvalidState` if an undo or redo is already running. `Memento` if a
    /// memento fails; the bracket is then closed as by `end_undo` and the
    /// rest of the group is released without running.
    pub fn begin_undo(&self) -> Result<bool, HistoryError> {
        let target = self.with_state(|state| -> Result<_, StateViolation> {
            state.ensure_idle("begin_undo")?;
            let Some(group) = state.store.take_undo_target() else {
                return Ok(None);
            };
            state.open_bracket(Mode::Undoing);
            Ok(Some(group))
        })?;
        match target {
            Some(group) => self.replay(group).map(|()| true),
            None => Ok(false),
        }
    }

    /// Closes the undo bracket, making the replayed changes redoable.
    ///
    /// # Errors
    ///
    /// `InvalidState` if no undo is running.
    pub fn end_undo(&self) -> Result<(), HistoryError> {
        self.end_bracket(Mode::Undoing, "end_undo")
    }

    /// `begin_undo`, followed by `end_undo` when `end_immediately` is set
    /// and a group was reverted.
    pub fn undo(&self, end_immediately: bool) -> Result<bool, HistoryError> {
        let began = self.begin_undo()?;
        if began && end_immediately {
            self.end_undo()?;
        }
        Ok(began)
    }

    // ── Redo ───────────────────────────────────────────────────────────

    /// Re-applies the most recently undone operation.
    ///
    /// Returns `Ok(false)` without opening a bracket when there is nothing
    /// to redo.
    ///
    /// # Errors
    ///
    /// `InvalidState` if an undo or redo is already running or an operation
    /// is in progress. `Memento` as for `begin_undo`.
    pub fn begin_redo(&self) -> Result<bool, HistoryError> {
        let target = self.with_state(|state| -> Result<_, StateViolation> {
            state.ensure_idle("begin_redo")?;
            if state.in_progress {
                return Err(StateViolation::OperationInProgress);
            }
            let Some(group) = state.store.pop_redo() else {
                return Ok(None);
            };
            state.settle_active();
            state.open_bracket(Mode::Redoing);
            Ok(Some(group))
        })?;
        match target {
            Some(group) => self.replay(group).map(|()| true),
            None => Ok(false),
        }
    }

    /// Closes the redo bracket, making the replayed changes undoable again.
    ///
    /// # Errors
    ///
    /// `InvalidState` if no redo is running.
    pub fn end_redo(&self) -> Result<(), HistoryError> {
        self.end_bracket(Mode::Redoing, "end_redo")
    }

    /// `begin_redo`, followed by `end_redo` when `end_immediately` is set
    /// and a group was re-applied.
    pub fn redo(&self, end_immediately: bool) -> Result<bool, HistoryError> {
        let began = self.begin_redo()?;
        if began && end_immediately {
            self.end_redo()?;
        }
        Ok(began)
    }

    fn end_bracket(&self, expected: Mode, operation: &'static str) -> Result<(), HistoryError> {
        self.with_state(|state| {
            if state.mode != expected {
                return Err(StateViolation::NoMatchingBegin { operation });
            }
            state.close_bracket();
            Ok(())
        })?;
        Ok(())
    }

    /// Runs `undo` on every member, most recent first, without the lock.
    fn replay(&self, group: OperationGroup) -> Result<(), HistoryError> {
        let mut replay = Replay::new(self, group);
        while let Some(memento) = replay.remaining.pop() {
            replay.used.push(memento);
            let Some(current) = replay.used.last_mut() else {
                break;
            };
            tracing::trace!("Replaying {current:?}");
            if let Err(err) = current.undo() {
                replay.abort(&format!("{err:#}"));
                return Err(HistoryError::Memento(err));
            }
        }
        replay.finish();
        Ok(())
    }

    /// Failure path: the bracket is closed as if `end_*` had been called so
    /// the engine is usable again, and the unexecuted mementos are dropped.
    fn abort_replay(&self, mementos: Vec<Box<dyn Memento>>, cause: &str) {
        self.with_state(|state| {
            tracing::warn!(
                "Memento failed during {} replay, dropping {} mementos: {cause}",
                state.mode,
                mementos.len()
            );
            for memento in mementos {
                state.store.discard(memento);
            }
            if state.mode.is_bracketed() {
                state.close_bracket();
            }
        });
    }

    // ── Housekeeping ───────────────────────────────────────────────────

    /// Drops every operation, active one included.
    pub fn clear_history(&self) {
        self.with_state(|state| {
            tracing::debug!(
                "Clearing history ({} undo, {} redo)",
                state.store.undo_depth(),
                state.store.redo_depth()
            );
            state.store.clear();
            state.pending_new_operation = false;
            state.extending = false;
        });
    }

    /// Whether `begin_undo` would revert something.
    pub fn undo_available(&self) -> bool {
        self.state.lock().availability().undo
    }

    /// Whether `begin_redo` would re-apply something.
    pub fn redo_available(&self) -> bool {
        self.state.lock().availability().redo
    }

    pub fn mode(&self) -> Mode {
        self.state.lock().mode
    }

    /// Sealed operations on the undo stack (the active group excluded).
    pub fn undo_depth(&self) -> usize {
        self.state.lock().store.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.state.lock().store.redo_depth()
    }

    /// Mementos in the group currently accumulating.
    pub fn active_len(&self) -> usize {
        self.state.lock().store.active().len()
    }

    // ── Notifications ──────────────────────────────────────────────────

    /// Registers a listener, invoked synchronously on the thread that
    /// caused the change.
    pub fn subscribe(
        &self,
        listener: impl Fn(&HistoryEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.lock().add(Arc::new(listener))
    }

    /// Removes a listener. Returns `false` if the token was unknown.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(id)
    }
}

impl Drop for UndoRedoEngine {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.store.clear();
        release_all(state.store.take_released());
    }
}

fn release_all(mementos: Vec<Box<dyn Memento>>) {
    for mut memento in mementos {
        memento.release();
    }
}

/// A group being replayed, split into the mementos already run and the
/// ones still to run (arrival order, so `pop` yields LIFO).
///
/// Dropping it unsettled means a memento panicked; the failure path then
/// runs during unwinding so the bracket closes and every member is
/// released.
struct Replay<'a> {
    engine: &'a UndoRedoEngine,
    used: Vec<Box<dyn Memento>>,
    remaining: Vec<Box<dyn Memento>>,
    settled: bool,
}

impl<'a> Replay<'a> {
    fn new(engine: &'a UndoRedoEngine, group: OperationGroup) -> Self {
        Self {
            engine,
            used: Vec::with_capacity(group.len()),
            remaining: group.into_mementos(),
            settled: false,
        }
    }

    /// Used mementos first, then the unexecuted ones in replay order.
    fn drain(&mut self) -> Vec<Box<dyn Memento>> {
        self.settled = true;
        let mut mementos = std::mem::take(&mut self.used);
        mementos.extend(std::mem::take(&mut self.remaining).into_iter().rev());
        mementos
    }

    fn finish(mut self) {
        let used = self.drain();
        self.engine.with_state(|state| {
            for memento in used {
                state.store.discard(memento);
            }
        });
    }

    fn abort(mut self, cause: &str) {
        let mementos = self.drain();
        self.engine.abort_replay(mementos, cause);
    }
}

impl Drop for Replay<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mementos = self.drain();
        self.engine.abort_replay(mementos, "memento panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memento::Significance;
    use std::any::Any;

    /// Logs undo and release calls into a shared journal.
    struct Entry {
        name: &'static str,
        significance: Significance,
        journal: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Memento for Entry {
        fn significance(&self) -> Significance {
            self.significance
        }

        fn undo(&mut self) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("{} refused", self.name);
            }
            self.journal.lock().push(format!("undo {}", self.name));
            Ok(())
        }

        fn release(&mut self) {
            self.journal.lock().push(format!("release {}", self.name));
        }

        fn describe(&self) -> &str {
            self.name
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Fixture {
        engine: UndoRedoEngine,
        journal: Arc<Mutex<Vec<String>>>,
        events: Arc<Mutex<Vec<HistoryEvent>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let engine = UndoRedoEngine::default();
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&events);
            engine.subscribe(move |event| sink.lock().push(*event));
            Self {
                engine,
                journal: Arc::new(Mutex::new(Vec::new())),
                events,
            }
        }

        fn entry(&self, name: &'static str, significance: Significance) -> Box<dyn Memento> {
            Box::new(Entry {
                name,
                significance,
                journal: Arc::clone(&self.journal),
                fail: false,
            })
        }

        fn failing(&self, name: &'static str) -> Box<dyn Memento> {
            Box::new(Entry {
                name,
                significance: Significance::Minor,
                journal: Arc::clone(&self.journal),
                fail: true,
            })
        }

        fn add(&self, name: &'static str, significance: Significance) {
            self.engine.add_memento(self.entry(name, significance));
        }

        fn journal(&self) -> Vec<String> {
            std::mem::take(&mut *self.journal.lock())
        }

        fn events(&self) -> Vec<HistoryEvent> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    // --- Booking ---

    #[test]
    fn test_empty_engine() {
        let fx = Fixture::new();
        assert!(!fx.engine.undo_available());
        assert!(!fx.engine.redo_available());
        assert_eq!(fx.engine.mode(), Mode::Idle);
        assert!(!fx.engine.undo(true).expect("undo"));
        assert!(!fx.engine.redo(true).expect("redo"));
        assert!(fx.events().is_empty());
    }

    #[test]
    fn test_noise_is_released_immediately() {
        let fx = Fixture::new();
        fx.add("caret", Significance::Supporting);
        assert!(!fx.engine.undo_available());
        assert_eq!(fx.journal(), ["release caret"]);
    }

    #[test]
    fn test_first_change_reports_undo_available() {
        let fx = Fixture::new();
        fx.add("a", Significance::Minor);
        assert!(fx.engine.undo_available());
        assert_eq!(fx.events(), [HistoryEvent::UndoAvailabilityChanged(true)]);

        fx.add("b", Significance::Minor);
        assert!(fx.events().is_empty());
    }

    // --- Undo / redo ---

    #[test]
    fn test_undo_runs_lifo_then_releases() {
        let fx = Fixture::new();
        fx.add("a", Significance::Substantial);
        fx.add("b", Significance::Minor);
        fx.add("c", Significance::Supporting);

        assert!(fx.engine.undo(true).expect("undo"));
        assert_eq!(
            fx.journal(),
            ["undo c", "undo b", "undo a", "release c", "release b", "release a"]
        );
        // Nothing was booked during the replay, so nothing is redoable.
        assert!(!fx.engine.undo_available());
        assert!(!fx.engine.redo_available());
    }

    #[test]
    fn test_begin_undo_twice_is_invalid() {
        let fx = Fixture::new();
        fx.add("a", Significance::Minor);
        fx.start_and_add("b");

        assert!(fx.engine.begin_undo().expect("begin"));
        assert_eq!(fx.engine.mode(), Mode::Undoing);
        let err = fx.engine.begin_undo().expect_err("second begin");
        assert!(matches!(
            err,
            HistoryError::InvalidState(StateViolation::AlreadyBracketed {
                mode: Mode::Undoing,
                ..
            })
        ));
        let err = fx.engine.begin_redo().expect_err("redo inside undo");
        assert!(err.is_invalid_state());
        fx.engine.end_undo().expect("end");
        assert_eq!(fx.engine.mode(), Mode::Idle);
    }

    #[test]
    fn test_end_without_begin_is_invalid() {
        let fx = Fixture::new();
        let err = fx.engine.end_undo().expect_err("end_undo");
        assert!(matches!(
            err,
            HistoryError::InvalidState(StateViolation::NoMatchingBegin { operation: "end_undo" })
        ));
        let err = fx.engine.end_redo().expect_err("end_redo");
        assert!(err.is_invalid_state());
    }

    #[test]
    fn test_end_redo_during_undo_is_invalid() {
        let fx = Fixture::new();
        fx.add("a", Significance::Minor);
        fx.engine.begin_undo().expect("begin");
        assert!(fx.engine.end_redo().is_err());
        assert_eq!(fx.engine.mode(), Mode::Undoing);
        fx.engine.end_undo().expect("end");
    }

    #[test]
    fn test_redo_refused_while_operation_in_progress() {
        let fx = Fixture::new();
        fx.engine.set_operation_in_progress(true);
        let err = fx.engine.begin_redo().expect_err("begin_redo");
        assert!(matches!(
            err,
            HistoryError::InvalidState(StateViolation::OperationInProgress)
        ));
        assert_eq!(fx.engine.mode(), Mode::Idle);
    }

    #[test]
    fn test_bracket_notifications() {
        let fx = Fixture::new();
        fx.add("a", Significance::Minor);
        fx.events();

        fx.engine.begin_undo().expect("begin");
        assert_eq!(fx.events(), [HistoryEvent::UndoAvailabilityChanged(false)]);
        assert!(!fx.engine.undo_available());

        fx.add("inverse", Significance::Minor);
        assert!(fx.events().is_empty());

        fx.engine.end_undo().expect("end");
        assert_eq!(
            fx.events(),
            [
                HistoryEvent::RedoAvailabilityChanged(true),
                HistoryEvent::OperationEnded
            ]
        );
        assert!(fx.engine.redo_available());
    }

    #[test]
    fn test_accumulator_without_trackable_change_is_dropped() {
        let fx = Fixture::new();
        fx.add("a", Significance::Minor);
        fx.engine.begin_undo().expect("begin");
        fx.add("caret", Significance::Supporting);
        fx.engine.end_undo().expect("end");
        assert!(!fx.engine.redo_available());
        assert!(fx.journal().contains(&"release caret".to_string()));
    }

    // --- Failure path ---

    #[test]
    fn test_failing_memento_resets_mode() {
        let fx = Fixture::new();
        fx.add("a", Significance::Minor);
        fx.engine.add_memento(fx.failing("bad"));
        fx.add("c", Significance::Minor);

        let err = fx.engine.undo(true).expect_err("undo should fail");
        assert!(matches!(err, HistoryError::Memento(_)));
        assert_eq!(fx.engine.mode(), Mode::Idle);
        // "a" never ran; everything was released exactly once.
        assert_eq!(
            fx.journal(),
            ["undo c", "release c", "release bad", "release a"]
        );
        assert!(!fx.engine.undo_available());

        // The engine is usable again.
        fx.add("d", Significance::Minor);
        assert!(fx.engine.undo(true).expect("undo"));
    }

    /// Panics inside `undo` instead of returning an error.
    struct Explosive {
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl Memento for Explosive {
        fn significance(&self) -> Significance {
            Significance::Minor
        }

        fn undo(&mut self) -> anyhow::Result<()> {
            panic!("explosive undo");
        }

        fn release(&mut self) {
            self.journal.lock().push("release boom".to_string());
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_panicking_memento_resets_mode() {
        let fx = Fixture::new();
        fx.add("a", Significance::Minor);
        fx.engine.add_memento(Box::new(Explosive {
            journal: Arc::clone(&fx.journal),
        }));
        fx.add("c", Significance::Minor);
        fx.events();

        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| fx.engine.undo(true)));
        assert!(outcome.is_err());
        assert_eq!(fx.engine.mode(), Mode::Idle);
        assert_eq!(
            fx.journal(),
            ["undo c", "release c", "release boom", "release a"]
        );
        assert!(!fx.engine.undo_available());
        assert!(!fx.engine.redo_available());
        assert!(fx.events().contains(&HistoryEvent::OperationEnded));

        fx.add("d", Significance::Minor);
        assert!(fx.engine.undo(true).expect("undo"));
    }

    // --- Boundaries ---

    #[test]
    fn test_in_progress_close_without_change_discards() {
        let fx = Fixture::new();
        fx.engine.set_operation_in_progress(true);
        fx.add("caret", Significance::Supporting);
        assert!(fx.engine.undo_available());
        fx.engine.set_operation_in_progress(false);
        assert!(!fx.engine.undo_available());
        assert_eq!(fx.journal(), ["release caret"]);
        assert!(!fx.events().contains(&HistoryEvent::OperationEnded));
    }

    #[test]
    fn test_in_progress_close_with_change_ends_operation() {
        let fx = Fixture::new();
        fx.engine.set_operation_in_progress(true);
        fx.add("typing", Significance::Minor);
        fx.engine.set_operation_in_progress(false);
        assert!(fx.events().contains(&HistoryEvent::OperationEnded));

        // The ended operation stays separate from the next substantial one.
        fx.add("paste", Significance::Substantial);
        assert_eq!(fx.engine.undo_depth(), 1);
        assert_eq!(fx.engine.active_len(), 1);
    }

    #[test]
    fn test_extend_requires_active_group() {
        let fx = Fixture::new();
        assert!(!fx.engine.extend_current_operation());
        fx.add("a", Significance::Minor);
        assert!(fx.engine.extend_current_operation());
    }

    #[test]
    fn test_extend_keeps_group_open_across_in_progress() {
        let fx = Fixture::new();
        fx.add("a", Significance::Substantial);
        assert!(fx.engine.extend_current_operation());
        fx.engine.set_operation_in_progress(true);
        fx.add("b", Significance::Minor);
        fx.engine.set_operation_in_progress(false);

        assert_eq!(fx.engine.undo_depth(), 0);
        assert_eq!(fx.engine.active_len(), 2);
        assert!(!fx.events().contains(&HistoryEvent::OperationEnded));
    }

    #[test]
    fn test_start_new_operation_cancels_extend() {
        let fx = Fixture::new();
        fx.add("a", Significance::Substantial);
        fx.engine.extend_current_operation();
        fx.engine.start_new_operation();
        fx.engine.set_operation_in_progress(true);
        assert_eq!(fx.engine.undo_depth(), 1);
        assert_eq!(fx.engine.active_len(), 0);
    }

    #[test]
    fn test_tracking_toggle() {
        let fx = Fixture::new();
        fx.engine.set_track_operations(false);
        assert!(!fx.engine.track_operations());
        fx.add("a", Significance::Substantial);
        assert!(!fx.engine.undo_available());
        assert_eq!(fx.journal(), ["release a"]);

        fx.engine.set_track_operations(true);
        fx.add("b", Significance::Substantial);
        assert!(fx.engine.undo_available());
    }

    // --- Clearing ---

    #[test]
    fn test_clear_history_releases_and_notifies() {
        let fx = Fixture::new();
        fx.add("a", Significance::Minor);
        fx.start_and_add("b");
        fx.events();

        fx.engine.clear_history();
        assert!(!fx.engine.undo_available());
        assert_eq!(fx.journal(), ["release b", "release a"]);
        assert_eq!(fx.events(), [HistoryEvent::UndoAvailabilityChanged(false)]);

        fx.engine.clear_history();
        assert!(fx.events().is_empty());
    }

    #[test]
    fn test_drop_releases_remaining() {
        let fx = Fixture::new();
        fx.add("a", Significance::Minor);
        let journal = Arc::clone(&fx.journal);
        drop(fx.engine);
        assert_eq!(*journal.lock(), ["release a"]);
    }

    #[test]
    fn test_unsubscribe_stops_events() {
        let fx = Fixture::new();
        let counter = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&counter);
        let id = fx.engine.subscribe(move |_| *sink.lock() += 1);
        fx.add("a", Significance::Minor);
        assert_eq!(*counter.lock(), 1);

        assert!(fx.engine.unsubscribe(id));
        fx.engine.clear_history();
        assert_eq!(*counter.lock(), 1);
        assert!(!fx.engine.unsubscribe(id));
    }

    #[test]
    fn test_debug_output() {
        let fx = Fixture::new();
        fx.add("a", Significance::Minor);
        let debug = format!("{:?}", fx.engine);
        assert!(debug.contains("UndoRedoEngine"));
        assert!(debug.contains("active_len: 1"));
    }

    impl Fixture {
        fn start_and_add(&self, name: &'static str) {
            self.engine.start_new_operation();
            self.add(name, Significance::Substantial);
        }
    }
}
